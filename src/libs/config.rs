//! Configuration management for gridcache.
//!
//! Settings live in a JSON file under the platform data directory and are
//! managed either programmatically or through the interactive `init`
//! wizard. The configuration is intentionally small: remote API
//! credentials, cache behaviour, display timezone and logging.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use gridcache::libs::config::Config;
//!
//! let config = Config::read()?;
//! let ttl = config.default_ttl_seconds();
//! # anyhow::Ok(())
//! ```

use crate::api::ApiConfig;
use crate::libs::data_storage::DataStorage;
use crate::libs::messages::Message;
use crate::{msg_error_anyhow, msg_print};
use anyhow::Result;
use dialoguer::{theme::ColorfulTheme, Input, MultiSelect};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Write;

/// Configuration file name used for storing application settings.
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Default record TTL when neither an argument nor a per-table row sets
/// one: 12 hours.
pub const DEFAULT_TTL_SECONDS: i64 = 12 * 60 * 60;

/// Represents a configurable module in the application.
#[derive(Debug, Clone)]
pub struct ConfigModule {
    /// Unique identifier for the module used in configuration routing
    pub key: String,
    /// Display name shown to users during interactive setup
    pub name: String,
}

/// Cache behaviour settings.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct CacheConfig {
    /// Fallback TTL in seconds for tables without their own TTL row.
    pub default_ttl_seconds: i64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl_seconds: DEFAULT_TTL_SECONDS,
        }
    }
}

/// Logging options; observability only, no functional effect.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct LogConfig {
    /// Filter directive passed to the tracing subscriber, e.g. `debug`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    /// Optional log file path; stdout/stderr when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    /// ANSI colors in log output.
    #[serde(default)]
    pub color: bool,
}

/// Top-level application configuration.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Config {
    /// Remote workspace API connection, absent until `init` runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api: Option<ApiConfig>,
    /// Cache behaviour overrides.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache: Option<CacheConfig>,
    /// Display timezone: an IANA name, a numeric offset, `utc` or `local`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    /// Logging options.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log: Option<LogConfig>,
}

impl Config {
    /// Loads the configuration, falling back to defaults when the file does
    /// not exist yet.
    pub fn read() -> Result<Self> {
        let path = DataStorage::new().get_path(CONFIG_FILE_NAME)?;
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(&path)?;
        serde_json::from_str(&contents).map_err(|_| msg_error_anyhow!(Message::ConfigParseError))
    }

    /// Persists the configuration as pretty-printed JSON.
    pub fn save(&self) -> Result<()> {
        let path = DataStorage::new().get_path(CONFIG_FILE_NAME)?;
        let mut file = File::create(&path).map_err(|_| msg_error_anyhow!(Message::ConfigSaveError))?;
        file.write_all(serde_json::to_string_pretty(self)?.as_bytes())?;
        Ok(())
    }

    /// Removes the configuration file if present.
    pub fn delete() -> Result<()> {
        let path = DataStorage::new().get_path(CONFIG_FILE_NAME)?;
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    /// The effective default TTL in seconds.
    pub fn default_ttl_seconds(&self) -> i64 {
        self.cache.as_ref().map(|c| c.default_ttl_seconds).unwrap_or(DEFAULT_TTL_SECONDS)
    }

    /// Runs the interactive configuration wizard.
    pub fn init() -> Result<Self> {
        let mut config = Self::read().unwrap_or_default();

        let modules = vec![
            ConfigModule {
                key: "api".to_string(),
                name: Message::ConfigModuleApi.to_string(),
            },
            ConfigModule {
                key: "cache".to_string(),
                name: Message::ConfigModuleCache.to_string(),
            },
        ];
        let module_names: Vec<&String> = modules.iter().map(|m| &m.name).collect();

        let selected = MultiSelect::with_theme(&ColorfulTheme::default())
            .with_prompt(Message::SelectModules.to_string())
            .items(&module_names)
            .interact()?;

        for index in selected {
            match modules[index].key.as_str() {
                "api" => config.api = Some(ApiConfig::init(&config.api)?),
                "cache" => {
                    let current = config.cache.clone().unwrap_or_default();
                    let ttl: i64 = Input::with_theme(&ColorfulTheme::default())
                        .with_prompt(Message::PromptDefaultTtl.to_string())
                        .with_initial_text(current.default_ttl_seconds.to_string())
                        .interact_text()?;
                    let timezone: String = Input::with_theme(&ColorfulTheme::default())
                        .with_prompt(Message::PromptTimezone.to_string())
                        .with_initial_text(config.timezone.clone().unwrap_or_default())
                        .allow_empty(true)
                        .interact_text()?;

                    config.cache = Some(CacheConfig { default_ttl_seconds: ttl });
                    config.timezone = if timezone.trim().is_empty() { None } else { Some(timezone) };
                }
                _ => msg_print!(Message::SelectModules),
            }
        }

        Ok(config)
    }
}

//! Cross-platform data storage path management for application files.
//!
//! Resolves where the cache store and configuration live, following each
//! platform's conventions:
//!
//! - **Windows**: `%LOCALAPPDATA%\lacodda\gridcache\`
//! - **macOS**: `~/Library/Application Support/lacodda/gridcache/`
//! - **Linux/Unix**: `~/.local/share/lacodda/gridcache/`
//!
//! ## Test mode
//!
//! When `GRIDCACHE_TEST_MODE` is set, every path is routed to a per-process
//! directory under the system temp dir. Parallel test runs then get fully
//! isolated stores and nothing touches the real user data.

use anyhow::Result;
use std::env::consts::OS;
use std::env::var;
use std::path::{Path, PathBuf};
use std::{fs, process};

// Include compile-time application metadata
include!(concat!(env!("OUT_DIR"), "/app_metadata.rs"));

/// Environment variable that routes all storage to a temp location.
pub const TEST_MODE_ENV_VAR: &str = "GRIDCACHE_TEST_MODE";

/// Cross-platform data storage path manager.
///
/// The base path is resolved once during construction and stays constant
/// for the lifetime of the instance. Directories are created lazily on
/// first file-path request.
#[derive(Clone)]
pub struct DataStorage {
    /// Base directory for all application data.
    base_path: PathBuf,
}

impl Default for DataStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl DataStorage {
    /// Creates a storage manager with the platform-appropriate base path.
    ///
    /// Test mode wins over everything: paths go to
    /// `<tmp>/gridcache-test-<pid>/` so concurrent processes cannot collide.
    pub fn new() -> Self {
        if var(TEST_MODE_ENV_VAR).is_ok() {
            return Self {
                base_path: std::env::temp_dir().join(format!("{}-test-{}", APP_METADATA_NAME, process::id())),
            };
        }

        let base_path = match OS {
            "windows" => {
                // Windows: per-user local application data
                var("LOCALAPPDATA").unwrap_or_else(|_| ".".into())
            }
            "macos" => {
                // macOS: Application Support per Apple guidelines
                var("HOME").unwrap_or_else(|_| ".".into()) + "/Library/Application Support"
            }
            _ => {
                // Linux/Unix: XDG-compliant local share directory
                var("HOME").unwrap_or_else(|_| ".".into()) + "/.local/share"
            }
        };

        let base_path = Path::new(&base_path).join(APP_METADATA_OWNER).join(APP_METADATA_NAME);
        Self { base_path }
    }

    /// Resolves a filename to a full path inside the data directory,
    /// creating parent directories as needed.
    pub fn get_path(&self, file_name: &str) -> Result<PathBuf> {
        if !self.base_path.exists() {
            fs::create_dir_all(&self.base_path)?;
        }
        Ok(self.base_path.join(file_name))
    }
}

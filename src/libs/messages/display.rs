//! Display implementation for gridcache messages.
//!
//! Converts the structured [`Message`] variants into the human-readable text
//! shown on the terminal. All wording lives here so that messages stay
//! uniform across commands and library code.

use super::types::Message;
use std::fmt;

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            // === CONFIGURATION MESSAGES ===
            Message::ConfigSaved => "Configuration saved successfully".to_string(),
            Message::ConfigParseError => "Failed to parse configuration file".to_string(),
            Message::ConfigSaveError => "Failed to save configuration".to_string(),
            Message::ConfigDeleted => "Configuration removed".to_string(),
            Message::ConfigModuleApi => "Workspace API".to_string(),
            Message::ConfigModuleCache => "Cache settings".to_string(),
            Message::SelectModules => "Select modules to configure".to_string(),
            Message::PromptApiBaseUrl => "API base URL".to_string(),
            Message::PromptApiKey => "API key".to_string(),
            Message::PromptAccountId => "Account id".to_string(),
            Message::PromptDefaultTtl => "Default cache TTL in seconds".to_string(),
            Message::PromptTimezone => "Display timezone (name, offset, utc or local)".to_string(),
            Message::InvalidTimezone(tz) => format!("Unrecognized timezone '{}'", tz),

            // === MIGRATION MESSAGES ===
            Message::MigrationsApplied(count) => format!("Applied {} schema migration step(s)", count),
            Message::RunningMigration(name) => format!("Running migration step: {}", name),
            Message::MigrationFailed(name, err) => format!("Migration step '{}' failed: {}", name, err),
            Message::DatabaseUpToDate => "Cache store schema is up to date".to_string(),

            // === CACHE MESSAGES ===
            Message::CacheTableCreated(table) => format!("Created cache table '{}'", table),
            Message::CacheTableEvolved(table, count) => format!("Added {} column(s) to cache table '{}'", count, table),
            Message::RecordsCached(count, table) => format!("Cached {} record(s) for table {}", count, table),
            Message::CacheInvalidated(scope) => format!("Invalidated cache for {}", scope),
            Message::CacheRefreshed(resource) => format!("Refreshed cache scope: {}", resource),
            Message::CacheEmpty => "Nothing cached yet".to_string(),
            Message::TableNotCached(table_id) => format!("Table {} has no local cache", table_id),
            Message::UnknownRefreshResource(resource) => {
                format!("Unknown refresh resource '{}'. Expected one of: solutions, tables, records, members, teams", resource)
            }
            Message::RefreshRequiresTable => "Refreshing records requires a table id".to_string(),
            Message::InvalidTtl(value) => format!("Invalid TTL value {}: must be a positive number of seconds", value),
            Message::UnknownTtlPreset(preset) => {
                format!("Unknown TTL preset '{}'. Expected one of: high_mutation, medium, low, very_low", preset)
            }
            Message::TtlConfigured(table_id, seconds) => format!("TTL for table {} set to {} seconds", table_id, seconds),
            Message::StatsFlushFailed(err) => format!("Failed to persist cache statistics: {}", err),

            // === FILTER MESSAGES ===
            Message::UnknownFieldSkipped(slug) => format!("Skipping filter on unknown field '{}'", slug),
            Message::FilterOperatorInvalid { field, operator, suggestion } => match suggestion {
                Some(replacement) => format!("Operator '{}' is not valid for field '{}'. Did you mean '{}'?", operator, field, replacement),
                None => format!("Operator '{}' is not valid for field '{}'", operator, field),
            },

            // === REMOTE API MESSAGES ===
            Message::ApiConfigMissing => "Workspace API is not configured. Run 'gridcache init' first".to_string(),
            Message::ApiUnexpectedStatus(status, body) => format!("Workspace API returned status {}: {}", status, body),

            // === STATUS MESSAGES ===
            Message::StatusHeader => "📦 Cache status".to_string(),
            Message::PerformanceHeader => "📈 Cache performance".to_string(),
        };

        write!(f, "{}", text)
    }
}

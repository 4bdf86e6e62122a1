//! Message type definitions for all user-facing text.
//!
//! Every string the application shows a user lives here, grouped by
//! subsystem. Keeping the text in one enum keeps wording consistent and
//! makes the call sites compile-time checked.

/// All user-facing messages of the application.
#[derive(Debug, Clone)]
pub enum Message {
    // === CONFIGURATION MESSAGES ===
    ConfigSaved,
    ConfigParseError,
    ConfigSaveError,
    ConfigDeleted,
    ConfigModuleApi,
    ConfigModuleCache,
    SelectModules,
    PromptApiBaseUrl,
    PromptApiKey,
    PromptAccountId,
    PromptDefaultTtl,
    PromptTimezone,
    InvalidTimezone(String),

    // === MIGRATION MESSAGES ===
    MigrationsApplied(usize),
    RunningMigration(String),
    MigrationFailed(String, String),
    DatabaseUpToDate,

    // === CACHE MESSAGES ===
    CacheTableCreated(String),
    CacheTableEvolved(String, usize),
    RecordsCached(usize, String),
    CacheInvalidated(String),
    CacheRefreshed(String),
    CacheEmpty,
    TableNotCached(String),
    UnknownRefreshResource(String),
    RefreshRequiresTable,
    InvalidTtl(i64),
    UnknownTtlPreset(String),
    TtlConfigured(String, i64),
    StatsFlushFailed(String),

    // === FILTER MESSAGES ===
    UnknownFieldSkipped(String),
    FilterOperatorInvalid {
        field: String,
        operator: String,
        suggestion: Option<String>,
    },

    // === REMOTE API MESSAGES ===
    ApiConfigMissing,
    ApiUnexpectedStatus(u16, String),

    // === STATUS MESSAGES ===
    StatusHeader,
    PerformanceHeader,
}

//! Core database connection management and initialization.
//!
//! Provides the foundational store access: connection setup, file
//! permissions, pragma configuration and migration orchestration. Every
//! other `db` module operates on the connection owned here.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use gridcache::db::db::Db;
//!
//! let db = Db::new()?;
//! let count: i32 = db.conn.query_row(
//!     "SELECT COUNT(*) FROM cache_table_registry",
//!     [],
//!     |row| row.get(0)
//! )?;
//! # anyhow::Ok(())
//! ```

use crate::db::migrations;
use crate::libs::data_storage::DataStorage;
use anyhow::Result;
use rusqlite::Connection;
use std::path::Path;

/// Standard filename for the SQLite store file.
pub const DB_FILE_NAME: &str = "gridcache.db";

/// Core database manager providing connection and initialization services.
///
/// Creating a `Db` guarantees the store file exists with owner-only
/// permissions, foreign keys are enforced, and all legacy-schema migration
/// steps have run. SQLite serialises writers on the connection; the engine
/// keeps exactly one connection per process, so two writers can never race
/// on the same record table.
pub struct Db {
    /// The configured SQLite connection.
    pub conn: Connection,
}

impl Db {
    /// Opens the store, restricts file permissions and applies migrations.
    ///
    /// This is the primary constructor: after it returns, the schema is
    /// current and the connection is ready for use.
    pub fn new() -> Result<Self> {
        let db_file_path = DataStorage::new().get_path(DB_FILE_NAME)?;

        let mut conn = Connection::open(&db_file_path)?;

        // The store may hold API data; keep it readable by the owner only
        restrict_permissions(&db_file_path)?;

        conn.execute("PRAGMA foreign_keys = ON", [])?;

        // Legacy-schema migration runs exactly once per open, before any
        // normal operation touches the store
        migrations::run(&mut conn)?;

        Ok(Self { conn })
    }

    /// Opens a connection without running migrations.
    ///
    /// For inspection tooling and tests that need to stage a legacy schema
    /// before exercising the migrator. Application code should use
    /// [`Db::new`].
    pub fn new_without_migrations() -> Result<Connection> {
        let db_file_path = DataStorage::new().get_path(DB_FILE_NAME)?;

        let conn = Connection::open(&db_file_path)?;
        restrict_permissions(&db_file_path)?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;

        Ok(conn)
    }
}

/// Owner-only read/write on the store file.
#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::fs;
    use std::os::unix::fs::PermissionsExt;

    let mut permissions = fs::metadata(path)?.permissions();
    permissions.set_mode(0o600);
    fs::set_permissions(path, permissions)?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<()> {
    // Windows ACLs already scope %LOCALAPPDATA% to the user
    Ok(())
}

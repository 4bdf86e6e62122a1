//! Legacy on-disk schema migration.
//!
//! Stores written by earlier releases differ in three ways: the registry
//! table carried another name, several timestamp columns were stored as
//! Unix integers, and `cached_tables`/`cached_members` had older column
//! sets. The migrator runs exactly once per open, before any normal
//! operation, and rewrites whatever it finds in place.
//!
//! Unlike version-numbered migration chains, every step here detects its
//! own applicability by inspecting the SQLite catalog, so the whole pass is
//! idempotent: opening a store twice leaves the schema byte-identical after
//! the first pass.

use crate::db::tables;
use crate::libs::messages::Message;
use crate::{msg_debug, msg_error};
use anyhow::Result;
use rusqlite::{params, Connection, Transaction};

/// Tables whose timestamp columns moved from Unix integers to ISO-8601
/// text, and which columns those are.
const TIMESTAMP_COLUMNS: [(&str, &[&str]); 5] = [
    ("cache_table_registry", &["created_at", "updated_at"]),
    ("cache_ttl_config", &["updated_at"]),
    ("cache_stats", &["last_access", "updated_at"]),
    ("api_call_log", &["called_at"]),
    ("api_stats_summary", &["updated_at"]),
];

/// Columns whose presence marks a legacy `cached_tables` layout.
const OBSOLETE_TABLE_COLUMNS: [&str; 6] = ["description", "updated", "updated_by", "deleted_date", "deleted_by", "record_count"];

/// A single self-detecting migration step.
///
/// The function returns `Ok(true)` when it changed the schema and
/// `Ok(false)` when it found nothing to do.
struct MigrationStep {
    name: &'static str,
    run: fn(&Transaction) -> Result<bool>,
}

/// Orchestrates the registered migration steps in order.
pub struct Migrator {
    steps: Vec<MigrationStep>,
}

impl Default for Migrator {
    fn default() -> Self {
        Self::new()
    }
}

impl Migrator {
    pub fn new() -> Self {
        Self {
            steps: vec![
                MigrationStep {
                    name: "rename_legacy_registry",
                    run: rename_legacy_registry,
                },
                MigrationStep {
                    name: "timestamps_to_text",
                    run: timestamps_to_text,
                },
                MigrationStep {
                    name: "rewrite_cached_tables",
                    run: rewrite_cached_tables,
                },
                MigrationStep {
                    name: "members_deleted_date",
                    run: members_deleted_date,
                },
            ],
        }
    }

    /// Runs every applicable step inside one transaction.
    pub fn run(&self, conn: &mut Connection) -> Result<()> {
        let tx = conn.transaction()?;
        let mut applied = 0usize;

        for step in &self.steps {
            match (step.run)(&tx) {
                Ok(true) => {
                    msg_debug!(Message::RunningMigration(step.name.to_string()));
                    applied += 1;
                }
                Ok(false) => {}
                Err(e) => {
                    msg_error!(Message::MigrationFailed(step.name.to_string(), e.to_string()));
                    return Err(e);
                }
            }
        }

        tx.commit()?;

        if applied > 0 {
            msg_debug!(Message::MigrationsApplied(applied));
        } else {
            msg_debug!(Message::DatabaseUpToDate);
        }
        Ok(())
    }
}

/// Runs all migration steps against the connection.
pub fn run(conn: &mut Connection) -> Result<()> {
    Migrator::new().run(conn)
}

/// Step 1: the registry used to be called `cached_table_schemas`.
///
/// If only the legacy table exists it is renamed; if both exist (an
/// interrupted earlier migration) the legacy one is dropped.
fn rename_legacy_registry(tx: &Transaction) -> Result<bool> {
    if !table_exists(tx, "cached_table_schemas")? {
        return Ok(false);
    }
    if table_exists(tx, "cache_table_registry")? {
        tx.execute("DROP TABLE cached_table_schemas", [])?;
    } else {
        tx.execute("ALTER TABLE cached_table_schemas RENAME TO cache_table_registry", [])?;
    }
    Ok(true)
}

/// Step 2: rebuild tables whose timestamp columns are still INTEGER.
fn timestamps_to_text(tx: &Transaction) -> Result<bool> {
    let mut applied = false;
    for (table, ts_columns) in TIMESTAMP_COLUMNS {
        if !table_exists(tx, table)? {
            continue;
        }
        let columns = table_columns(tx, table)?;
        let needs_rewrite = columns
            .iter()
            .any(|c| ts_columns.contains(&c.name.as_str()) && c.decl_type.to_ascii_uppercase().starts_with("INTEGER"));
        if !needs_rewrite {
            continue;
        }
        rebuild_with_text_timestamps(tx, table, ts_columns, &columns)?;
        applied = true;
    }
    Ok(applied)
}

/// Step 3: rebuild `cached_tables` from its obsolete layout.
///
/// Data in columns that survive the rewrite is preserved; obsolete columns
/// are dropped and the newer metadata columns start out NULL.
fn rewrite_cached_tables(tx: &Transaction) -> Result<bool> {
    if !table_exists(tx, "cached_tables")? {
        return Ok(false);
    }
    let old_columns = table_columns(tx, "cached_tables")?;
    if !old_columns.iter().any(|c| OBSOLETE_TABLE_COLUMNS.contains(&c.name.as_str())) {
        return Ok(false);
    }

    tx.execute(&tables::create_sql("cached_tables_migrated"), [])?;
    let new_columns = table_columns(tx, "cached_tables_migrated")?;

    let shared: Vec<String> = old_columns
        .iter()
        .filter(|old| new_columns.iter().any(|new| new.name == old.name))
        .map(|c| format!("\"{}\"", c.name))
        .collect();

    tx.execute(
        &format!(
            "INSERT INTO cached_tables_migrated ({}) SELECT {} FROM cached_tables",
            shared.join(", "),
            shared.join(", ")
        ),
        [],
    )?;
    tx.execute("DROP TABLE cached_tables", [])?;
    tx.execute("ALTER TABLE cached_tables_migrated RENAME TO cached_tables", [])?;
    tx.execute(tables::INDEX_EXPIRES, [])?;
    tx.execute(tables::INDEX_SOLUTION, [])?;
    Ok(true)
}

/// Step 4: add `deleted_date` to `cached_members` when missing.
fn members_deleted_date(tx: &Transaction) -> Result<bool> {
    if !table_exists(tx, "cached_members")? {
        return Ok(false);
    }
    let columns = table_columns(tx, "cached_members")?;
    if columns.iter().any(|c| c.name == "deleted_date") {
        return Ok(false);
    }
    tx.execute("ALTER TABLE cached_members ADD COLUMN deleted_date TEXT", [])?;
    Ok(true)
}

/// Generic rebuild: same columns, TEXT storage for the timestamp columns,
/// values converted through `datetime(col, 'unixepoch')`, indexes restored.
fn rebuild_with_text_timestamps(tx: &Transaction, table: &str, ts_columns: &[&str], columns: &[ColumnInfo]) -> Result<()> {
    let index_sqls = index_sql(tx, table)?;
    let tmp = format!("{}_migrated", table);

    let definitions: Vec<String> = columns
        .iter()
        .map(|c| {
            let decl_type = if ts_columns.contains(&c.name.as_str()) {
                "TEXT".to_string()
            } else if c.decl_type.is_empty() {
                "TEXT".to_string()
            } else {
                c.decl_type.clone()
            };
            let mut definition = format!("\"{}\" {}", c.name, decl_type);
            if c.primary_key {
                definition.push_str(" PRIMARY KEY");
            } else if c.not_null {
                definition.push_str(" NOT NULL");
            }
            if let Some(default) = &c.default_value {
                definition.push_str(&format!(" DEFAULT {}", default));
            }
            definition
        })
        .collect();

    let select_list: Vec<String> = columns
        .iter()
        .map(|c| {
            if ts_columns.contains(&c.name.as_str()) {
                // NULLs pass through datetime() unchanged
                format!("datetime(\"{}\", 'unixepoch')", c.name)
            } else {
                format!("\"{}\"", c.name)
            }
        })
        .collect();

    tx.execute(&format!("CREATE TABLE \"{}\" ({})", tmp, definitions.join(", ")), [])?;
    tx.execute(
        &format!("INSERT INTO \"{}\" SELECT {} FROM \"{}\"", tmp, select_list.join(", "), table),
        [],
    )?;
    tx.execute(&format!("DROP TABLE \"{}\"", table), [])?;
    tx.execute(&format!("ALTER TABLE \"{}\" RENAME TO \"{}\"", tmp, table), [])?;

    for sql in index_sqls {
        tx.execute(&sql, [])?;
    }
    Ok(())
}

/// One column as reported by `PRAGMA table_info`.
struct ColumnInfo {
    name: String,
    decl_type: String,
    not_null: bool,
    default_value: Option<String>,
    primary_key: bool,
}

fn table_exists(tx: &Transaction, name: &str) -> Result<bool> {
    let count: i64 = tx.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        params![name],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

fn table_columns(tx: &Transaction, table: &str) -> Result<Vec<ColumnInfo>> {
    let mut stmt = tx.prepare(&format!("PRAGMA table_info(\"{}\")", table))?;
    let rows = stmt.query_map([], |row| {
        Ok(ColumnInfo {
            name: row.get(1)?,
            decl_type: row.get(2)?,
            not_null: row.get::<_, i64>(3)? != 0,
            default_value: row.get(4)?,
            primary_key: row.get::<_, i64>(5)? != 0,
        })
    })?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

fn index_sql(tx: &Transaction, table: &str) -> Result<Vec<String>> {
    let mut stmt = tx.prepare("SELECT sql FROM sqlite_master WHERE type = 'index' AND tbl_name = ?1 AND sql IS NOT NULL")?;
    let rows = stmt.query_map(params![table], |row| row.get(0))?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

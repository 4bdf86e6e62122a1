//! Cached table metadata, including the remote field catalogs.
//!
//! One row per remote table: listing metadata plus the serialised
//! `structure` (field catalog). The catalog cached here feeds table-name
//! resolution and lets `get_table` reads skip the network while valid.
//!
//! The column set matters beyond this module: the migrator rebuilds legacy
//! `cached_tables` layouts into exactly the shape declared by
//! [`COLUMN_DEFINITIONS`].

use crate::api::TableInfo;
use crate::libs::timestamp;
use anyhow::Result;
use rusqlite::{params, Connection, Row};
use serde_json::Value;

/// Column definitions shared by the live schema and the migrator's rebuild.
pub const COLUMN_DEFINITIONS: &str = "id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    solution_id TEXT NOT NULL DEFAULT '',
    status TEXT,
    hidden INTEGER NOT NULL DEFAULT 0,
    icon TEXT,
    primary_field TEXT,
    table_order INTEGER,
    permissions TEXT,
    field_permissions TEXT,
    record_term TEXT,
    fields_count_total INTEGER,
    fields_count_linkedrecordfield INTEGER,
    structure TEXT,
    cached_at TEXT NOT NULL DEFAULT '',
    expires_at TEXT NOT NULL DEFAULT ''";

pub const INDEX_EXPIRES: &str = "CREATE INDEX IF NOT EXISTS idx_cached_tables_expires_at ON cached_tables(expires_at)";

pub const INDEX_SOLUTION: &str = "CREATE INDEX IF NOT EXISTS idx_cached_tables_solution_id ON cached_tables(solution_id)";

const INSERT_TABLE: &str = "INSERT OR REPLACE INTO cached_tables
    (id, name, solution_id, status, hidden, icon, primary_field, table_order, permissions, field_permissions,
     record_term, fields_count_total, fields_count_linkedrecordfield, structure, cached_at, expires_at)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)";

const SELECT_COLUMNS: &str = "SELECT id, name, solution_id, status, hidden, icon, primary_field, table_order,
    permissions, field_permissions, record_term, structure FROM cached_tables";

/// The live `CREATE TABLE` statement.
pub fn create_sql(table_name: &str) -> String {
    format!("CREATE TABLE IF NOT EXISTS {} ({})", table_name, COLUMN_DEFINITIONS)
}

/// Database interface for cached table metadata.
pub struct Tables<'conn> {
    conn: &'conn Connection,
}

impl<'conn> Tables<'conn> {
    pub fn new(conn: &'conn Connection) -> Result<Self> {
        conn.execute(&create_sql("cached_tables"), [])?;
        conn.execute(INDEX_EXPIRES, [])?;
        conn.execute(INDEX_SOLUTION, [])?;
        Ok(Self { conn })
    }

    /// Replaces the cached metadata for a scope: everything, or one
    /// solution's tables.
    pub fn replace_for_scope(&self, solution_id: Option<&str>, tables: &[TableInfo], cached_at: &str, expires_at: &str) -> Result<usize> {
        match solution_id {
            Some(solution) => self
                .conn
                .execute("DELETE FROM cached_tables WHERE solution_id = ?1", params![solution])?,
            None => self.conn.execute("DELETE FROM cached_tables", [])?,
        };
        for table in tables {
            self.upsert(table, cached_at, expires_at)?;
        }
        Ok(tables.len())
    }

    /// Inserts or refreshes one metadata row.
    pub fn upsert(&self, table: &TableInfo, cached_at: &str, expires_at: &str) -> Result<()> {
        let linked_count = table.structure.iter().filter(|f| f.field_type == "linkedrecordfield").count() as i64;
        self.conn.execute(
            INSERT_TABLE,
            params![
                table.id,
                table.name,
                table.solution_id,
                table.status,
                table.hidden as i64,
                table.icon,
                table.primary_field,
                table.table_order,
                table.permissions.as_ref().map(Value::to_string),
                table.field_permissions.as_ref().map(Value::to_string),
                table.record_term,
                table.structure.len() as i64,
                linked_count,
                serde_json::to_string(&table.structure)?,
                cached_at,
                expires_at,
            ],
        )?;
        Ok(())
    }

    /// Valid cached metadata, optionally limited to one solution.
    pub fn fetch_valid(&self, solution_id: Option<&str>) -> Result<Vec<TableInfo>> {
        let now = timestamp::now();
        match solution_id {
            Some(solution) => {
                let sql = format!("{} WHERE expires_at > ?1 AND solution_id = ?2 ORDER BY table_order, name", SELECT_COLUMNS);
                let mut stmt = self.conn.prepare(&sql)?;
                let rows = stmt.query_map(params![now, solution], table_from_row)?;
                Ok(rows.collect::<Result<Vec<_>, _>>()?)
            }
            None => {
                let sql = format!("{} WHERE expires_at > ?1 ORDER BY table_order, name", SELECT_COLUMNS);
                let mut stmt = self.conn.prepare(&sql)?;
                let rows = stmt.query_map(params![now], table_from_row)?;
                Ok(rows.collect::<Result<Vec<_>, _>>()?)
            }
        }
    }

    /// One metadata row regardless of validity, for name and catalog lookup.
    pub fn get(&self, table_id: &str) -> Result<Option<TableInfo>> {
        let sql = format!("{} WHERE id = ?1", SELECT_COLUMNS);
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query_map(params![table_id], table_from_row)?;
        Ok(rows.next().transpose()?)
    }

    /// Ids of every cached table in a solution, valid or not.
    ///
    /// Used by the refresh cascade, which must reach expired scopes too.
    pub fn ids_for_solution(&self, solution_id: &str) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT id FROM cached_tables WHERE solution_id = ?1")?;
        let rows = stmt.query_map(params![solution_id], |row| row.get(0))?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn invalidate_all(&self) -> Result<()> {
        self.conn.execute("UPDATE cached_tables SET expires_at = ?1", params![timestamp::EPOCH])?;
        Ok(())
    }

    pub fn invalidate_for_solution(&self, solution_id: &str) -> Result<()> {
        self.conn.execute(
            "UPDATE cached_tables SET expires_at = ?1 WHERE solution_id = ?2",
            params![timestamp::EPOCH, solution_id],
        )?;
        Ok(())
    }

    /// Expires one metadata row, used when a table's structure changed.
    pub fn invalidate_row(&self, table_id: &str) -> Result<()> {
        self.conn.execute(
            "UPDATE cached_tables SET expires_at = ?1 WHERE id = ?2",
            params![timestamp::EPOCH, table_id],
        )?;
        Ok(())
    }
}

fn table_from_row(row: &Row<'_>) -> rusqlite::Result<TableInfo> {
    let permissions: Option<String> = row.get(8)?;
    let field_permissions: Option<String> = row.get(9)?;
    let structure: Option<String> = row.get(11)?;

    Ok(TableInfo {
        id: row.get(0)?,
        name: row.get(1)?,
        solution_id: row.get(2)?,
        status: row.get(3)?,
        hidden: row.get::<_, i64>(4)? != 0,
        icon: row.get(5)?,
        primary_field: row.get(6)?,
        table_order: row.get(7)?,
        permissions: permissions.and_then(|s| serde_json::from_str(&s).ok()),
        field_permissions: field_permissions.and_then(|s| serde_json::from_str(&s).ok()),
        record_term: row.get(10)?,
        structure: structure.and_then(|s| serde_json::from_str(&s).ok()).unwrap_or_default(),
    })
}

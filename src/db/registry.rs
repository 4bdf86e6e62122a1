//! The cache table registry: source of truth for dynamic schemas.
//!
//! One row per cached remote table records which physical table mirrors it,
//! the remote field catalog it was synthesised from, and the field→columns
//! mapping. Every schema decision elsewhere (evolution diffs, query column
//! resolution, value reconstruction) reads from here.

use crate::libs::fields::RemoteField;
use crate::libs::schema::TableMapping;
use anyhow::Result;
use rusqlite::{params, Connection, Row};

/// SQL schema for the registry.
const SCHEMA_REGISTRY: &str = "CREATE TABLE IF NOT EXISTS cache_table_registry (
    table_id TEXT PRIMARY KEY,
    local_table_name TEXT NOT NULL,
    fields TEXT NOT NULL,
    field_mapping TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
)";

const INSERT_ENTRY: &str = "INSERT INTO cache_table_registry
    (table_id, local_table_name, fields, field_mapping, created_at, updated_at)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6)";

const UPDATE_ENTRY: &str = "UPDATE cache_table_registry
    SET fields = ?2, field_mapping = ?3, updated_at = ?4 WHERE table_id = ?1";

const SELECT_ENTRY: &str = "SELECT table_id, local_table_name, fields, field_mapping, created_at, updated_at
    FROM cache_table_registry";

/// One registry row, with the catalog and mapping deserialised.
#[derive(Debug, Clone)]
pub struct RegistryEntry {
    pub table_id: String,
    pub local_table_name: String,
    pub catalog: Vec<RemoteField>,
    pub mapping: TableMapping,
    pub created_at: String,
    pub updated_at: String,
}

/// Database interface for the cache table registry.
pub struct Registry<'conn> {
    conn: &'conn Connection,
}

impl<'conn> Registry<'conn> {
    pub fn new(conn: &'conn Connection) -> Result<Self> {
        conn.execute(SCHEMA_REGISTRY, [])?;
        Ok(Self { conn })
    }

    pub fn get(&self, table_id: &str) -> Result<Option<RegistryEntry>> {
        let sql = format!("{} WHERE table_id = ?1", SELECT_ENTRY);
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query_map(params![table_id], entry_from_row)?;
        Ok(rows.next().transpose()?)
    }

    pub fn all(&self) -> Result<Vec<RegistryEntry>> {
        let mut stmt = self.conn.prepare(SELECT_ENTRY)?;
        let rows = stmt.query_map([], entry_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Records a freshly synthesised table.
    pub fn insert(&self, entry: &RegistryEntry) -> Result<()> {
        self.conn.execute(
            INSERT_ENTRY,
            params![
                entry.table_id,
                entry.local_table_name,
                serde_json::to_string(&entry.catalog)?,
                serde_json::to_string(&entry.mapping)?,
                entry.created_at,
                entry.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Rewrites the catalog and mapping after schema evolution.
    pub fn update(&self, entry: &RegistryEntry) -> Result<()> {
        self.conn.execute(
            UPDATE_ENTRY,
            params![
                entry.table_id,
                serde_json::to_string(&entry.catalog)?,
                serde_json::to_string(&entry.mapping)?,
                entry.updated_at,
            ],
        )?;
        Ok(())
    }
}

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<RegistryEntry> {
    let fields: String = row.get(2)?;
    let mapping: String = row.get(3)?;
    Ok(RegistryEntry {
        table_id: row.get(0)?,
        local_table_name: row.get(1)?,
        catalog: serde_json::from_str(&fields).unwrap_or_default(),
        mapping: serde_json::from_str(&mapping).unwrap_or_default(),
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

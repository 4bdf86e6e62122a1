//! Per-table TTL configuration.
//!
//! Tables mutate at very different rates; a task board goes stale in an
//! hour while a country list is good for a month. The TTL table holds one
//! row per remote table with the chosen lifetime, an optional mutation
//! label and free-text notes. Absence means the configured default.

use crate::libs::messages::Message;
use crate::libs::timestamp;
use crate::msg_bail_anyhow;
use anyhow::Result;
use rusqlite::{params, Connection};

/// SQL schema for the TTL configuration.
const SCHEMA_TTL_CONFIG: &str = "CREATE TABLE IF NOT EXISTS cache_ttl_config (
    table_id TEXT PRIMARY KEY,
    ttl_seconds INTEGER NOT NULL,
    mutation_level TEXT,
    notes TEXT,
    updated_at TEXT NOT NULL
)";

const UPSERT_TTL: &str = "INSERT INTO cache_ttl_config (table_id, ttl_seconds, mutation_level, notes, updated_at)
    VALUES (?1, ?2, ?3, ?4, ?5)
    ON CONFLICT(table_id) DO UPDATE SET
        ttl_seconds = excluded.ttl_seconds,
        mutation_level = excluded.mutation_level,
        notes = excluded.notes,
        updated_at = excluded.updated_at";

/// Convenience aliases for common mutation rates.
pub const TTL_PRESETS: [(&str, i64); 4] = [
    ("high_mutation", 60 * 60),
    ("medium", 12 * 60 * 60),
    ("low", 7 * 24 * 60 * 60),
    ("very_low", 30 * 24 * 60 * 60),
];

/// Resolves a preset alias to seconds.
pub fn preset_seconds(name: &str) -> Option<i64> {
    TTL_PRESETS.iter().find(|(preset, _)| *preset == name).map(|(_, seconds)| *seconds)
}

/// One TTL configuration row.
#[derive(Debug, Clone)]
pub struct TtlEntry {
    pub table_id: String,
    pub ttl_seconds: i64,
    pub mutation_level: Option<String>,
    pub notes: Option<String>,
}

/// Database interface for per-table TTL settings.
pub struct Ttls<'conn> {
    conn: &'conn Connection,
}

impl<'conn> Ttls<'conn> {
    pub fn new(conn: &'conn Connection) -> Result<Self> {
        conn.execute(SCHEMA_TTL_CONFIG, [])?;
        Ok(Self { conn })
    }

    /// The configured TTL for a table, if any.
    pub fn get(&self, table_id: &str) -> Result<Option<i64>> {
        let mut stmt = self.conn.prepare("SELECT ttl_seconds FROM cache_ttl_config WHERE table_id = ?1")?;
        let mut rows = stmt.query_map(params![table_id], |row| row.get(0))?;
        Ok(rows.next().transpose()?)
    }

    pub fn entry(&self, table_id: &str) -> Result<Option<TtlEntry>> {
        let mut stmt = self
            .conn
            .prepare("SELECT table_id, ttl_seconds, mutation_level, notes FROM cache_ttl_config WHERE table_id = ?1")?;
        let mut rows = stmt.query_map(params![table_id], |row| {
            Ok(TtlEntry {
                table_id: row.get(0)?,
                ttl_seconds: row.get(1)?,
                mutation_level: row.get(2)?,
                notes: row.get(3)?,
            })
        })?;
        Ok(rows.next().transpose()?)
    }

    /// Sets or updates a table's TTL. Rejects non-positive values.
    pub fn set(&self, table_id: &str, ttl_seconds: i64, mutation_level: Option<&str>, notes: Option<&str>) -> Result<()> {
        if ttl_seconds <= 0 {
            msg_bail_anyhow!(Message::InvalidTtl(ttl_seconds));
        }
        self.conn.execute(
            UPSERT_TTL,
            params![table_id, ttl_seconds, mutation_level, notes, timestamp::now()],
        )?;
        Ok(())
    }
}

//! Cached solution list.
//!
//! Solutions sit at the top of the solution → table → records hierarchy.
//! The list is cached wholesale: a refresh replaces every row, and
//! invalidating solutions cascades down to tables and records (handled by
//! the cache layer).

use crate::api::Solution;
use crate::libs::timestamp;
use anyhow::Result;
use rusqlite::{params, Connection};

/// SQL schema for the cached solution list.
const SCHEMA_SOLUTIONS: &str = "CREATE TABLE IF NOT EXISTS cached_solutions (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    logo_icon TEXT,
    logo_color TEXT,
    hidden INTEGER NOT NULL DEFAULT 0,
    records_count INTEGER,
    cached_at TEXT NOT NULL,
    expires_at TEXT NOT NULL
)";

const INDEX_EXPIRES: &str = "CREATE INDEX IF NOT EXISTS idx_cached_solutions_expires_at ON cached_solutions(expires_at)";

const INSERT_SOLUTION: &str = "INSERT OR REPLACE INTO cached_solutions
    (id, name, logo_icon, logo_color, hidden, records_count, cached_at, expires_at)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)";

const SELECT_VALID: &str = "SELECT id, name, logo_icon, logo_color, hidden, records_count
    FROM cached_solutions WHERE expires_at > ?1 ORDER BY name";

/// Database interface for the cached solution list.
pub struct Solutions<'conn> {
    conn: &'conn Connection,
}

impl<'conn> Solutions<'conn> {
    /// Binds to the connection, creating the table on first use.
    pub fn new(conn: &'conn Connection) -> Result<Self> {
        conn.execute(SCHEMA_SOLUTIONS, [])?;
        conn.execute(INDEX_EXPIRES, [])?;
        Ok(Self { conn })
    }

    /// Replaces the whole cached list under one expiry.
    pub fn replace_all(&self, solutions: &[Solution], cached_at: &str, expires_at: &str) -> Result<usize> {
        self.conn.execute("DELETE FROM cached_solutions", [])?;
        let mut stmt = self.conn.prepare(INSERT_SOLUTION)?;
        for solution in solutions {
            stmt.execute(params![
                solution.id,
                solution.name,
                solution.logo_icon,
                solution.logo_color,
                solution.hidden as i64,
                solution.records_count,
                cached_at,
                expires_at,
            ])?;
        }
        Ok(solutions.len())
    }

    /// Returns the cached solutions that are still within TTL.
    pub fn fetch_valid(&self) -> Result<Vec<Solution>> {
        let mut stmt = self.conn.prepare(SELECT_VALID)?;
        let rows = stmt.query_map(params![timestamp::now()], |row| {
            Ok(Solution {
                id: row.get(0)?,
                name: row.get(1)?,
                logo_icon: row.get(2)?,
                logo_color: row.get(3)?,
                hidden: row.get::<_, i64>(4)? != 0,
                records_count: row.get(5)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Marks every cached row as expired.
    pub fn invalidate(&self) -> Result<()> {
        self.conn
            .execute("UPDATE cached_solutions SET expires_at = ?1", params![timestamp::EPOCH])?;
        Ok(())
    }
}

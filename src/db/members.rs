//! Cached workspace member list.

use crate::api::Member;
use crate::libs::timestamp;
use anyhow::Result;
use rusqlite::{params, Connection};

/// SQL schema for the cached member list.
///
/// `deleted_date` arrived later; the migrator backfills it on stores
/// created before the column existed.
const SCHEMA_MEMBERS: &str = "CREATE TABLE IF NOT EXISTS cached_members (
    id TEXT PRIMARY KEY,
    email TEXT,
    full_name TEXT,
    role TEXT,
    deleted_date TEXT,
    cached_at TEXT NOT NULL,
    expires_at TEXT NOT NULL
)";

const INDEX_EXPIRES: &str = "CREATE INDEX IF NOT EXISTS idx_cached_members_expires_at ON cached_members(expires_at)";

const INSERT_MEMBER: &str = "INSERT OR REPLACE INTO cached_members
    (id, email, full_name, role, deleted_date, cached_at, expires_at)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)";

const SELECT_VALID: &str = "SELECT id, email, full_name, role, deleted_date
    FROM cached_members WHERE expires_at > ?1 ORDER BY full_name";

/// Database interface for the cached member list.
pub struct Members<'conn> {
    conn: &'conn Connection,
}

impl<'conn> Members<'conn> {
    pub fn new(conn: &'conn Connection) -> Result<Self> {
        conn.execute(SCHEMA_MEMBERS, [])?;
        conn.execute(INDEX_EXPIRES, [])?;
        Ok(Self { conn })
    }

    pub fn replace_all(&self, members: &[Member], cached_at: &str, expires_at: &str) -> Result<usize> {
        self.conn.execute("DELETE FROM cached_members", [])?;
        let mut stmt = self.conn.prepare(INSERT_MEMBER)?;
        for member in members {
            stmt.execute(params![
                member.id,
                member.email,
                member.full_name,
                member.role,
                member.deleted_date,
                cached_at,
                expires_at,
            ])?;
        }
        Ok(members.len())
    }

    pub fn fetch_valid(&self) -> Result<Vec<Member>> {
        let mut stmt = self.conn.prepare(SELECT_VALID)?;
        let rows = stmt.query_map(params![timestamp::now()], |row| {
            Ok(Member {
                id: row.get(0)?,
                email: row.get(1)?,
                full_name: row.get(2)?,
                role: row.get(3)?,
                deleted_date: row.get(4)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn invalidate(&self) -> Result<()> {
        self.conn.execute("UPDATE cached_members SET expires_at = ?1", params![timestamp::EPOCH])?;
        Ok(())
    }
}

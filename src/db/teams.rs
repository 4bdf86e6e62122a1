//! Cached workspace team list.

use crate::api::Team;
use crate::libs::timestamp;
use anyhow::Result;
use rusqlite::{params, Connection};

/// SQL schema for the cached team list. Member ids are stored as a JSON
/// array.
const SCHEMA_TEAMS: &str = "CREATE TABLE IF NOT EXISTS cached_teams (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    members TEXT,
    cached_at TEXT NOT NULL,
    expires_at TEXT NOT NULL
)";

const INDEX_EXPIRES: &str = "CREATE INDEX IF NOT EXISTS idx_cached_teams_expires_at ON cached_teams(expires_at)";

const INSERT_TEAM: &str = "INSERT OR REPLACE INTO cached_teams
    (id, name, members, cached_at, expires_at) VALUES (?1, ?2, ?3, ?4, ?5)";

const SELECT_VALID: &str = "SELECT id, name, members FROM cached_teams WHERE expires_at > ?1 ORDER BY name";

/// Database interface for the cached team list.
pub struct Teams<'conn> {
    conn: &'conn Connection,
}

impl<'conn> Teams<'conn> {
    pub fn new(conn: &'conn Connection) -> Result<Self> {
        conn.execute(SCHEMA_TEAMS, [])?;
        conn.execute(INDEX_EXPIRES, [])?;
        Ok(Self { conn })
    }

    pub fn replace_all(&self, teams: &[Team], cached_at: &str, expires_at: &str) -> Result<usize> {
        self.conn.execute("DELETE FROM cached_teams", [])?;
        let mut stmt = self.conn.prepare(INSERT_TEAM)?;
        for team in teams {
            stmt.execute(params![team.id, team.name, serde_json::to_string(&team.members)?, cached_at, expires_at])?;
        }
        Ok(teams.len())
    }

    pub fn fetch_valid(&self) -> Result<Vec<Team>> {
        let mut stmt = self.conn.prepare(SELECT_VALID)?;
        let rows = stmt.query_map(params![timestamp::now()], |row| {
            let members: Option<String> = row.get(2)?;
            Ok(Team {
                id: row.get(0)?,
                name: row.get(1)?,
                members: members.and_then(|s| serde_json::from_str(&s).ok()).unwrap_or_default(),
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn invalidate(&self) -> Result<()> {
        self.conn.execute("UPDATE cached_teams SET expires_at = ?1", params![timestamp::EPOCH])?;
        Ok(())
    }
}

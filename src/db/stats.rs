//! Cache hit/miss statistics with batched persistence.
//!
//! Counters accumulate in memory and are flushed to `cache_stats` either
//! after 100 operations or after five minutes, whichever comes first; the
//! cache layer also forces a flush from `performance()` and `close()`.
//! Persisted counters only ever grow — flushes add deltas, they never
//! overwrite.
//!
//! Recording is best-effort by design: a failed flush is logged and
//! swallowed so statistics can never break a read or write path.

use crate::libs::timestamp;
use anyhow::Result;
use parking_lot::Mutex;
use rusqlite::{params, Connection};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Flush after this many tracked operations.
const FLUSH_OPS_THRESHOLD: usize = 100;

/// Flush at least this often while operations trickle in.
const FLUSH_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// SQL schema for persisted counters.
const SCHEMA_STATS: &str = "CREATE TABLE IF NOT EXISTS cache_stats (
    table_id TEXT PRIMARY KEY,
    hits INTEGER NOT NULL DEFAULT 0,
    misses INTEGER NOT NULL DEFAULT 0,
    last_access TEXT,
    updated_at TEXT NOT NULL
)";

const UPSERT_STATS: &str = "INSERT INTO cache_stats (table_id, hits, misses, last_access, updated_at)
    VALUES (?1, ?2, ?3, ?4, ?5)
    ON CONFLICT(table_id) DO UPDATE SET
        hits = hits + excluded.hits,
        misses = misses + excluded.misses,
        last_access = excluded.last_access,
        updated_at = excluded.updated_at";

/// Pending (unflushed) counters for one table.
#[derive(Debug, Clone, Default)]
pub struct PendingCounter {
    pub hits: u64,
    pub misses: u64,
    pub last_access: Option<String>,
}

/// Aggregated report over persisted counters.
#[derive(Debug, Clone, Default)]
pub struct PerformanceReport {
    pub hits: u64,
    pub misses: u64,
    pub total: u64,
    pub hit_rate_percent: f64,
    pub last_access: Option<String>,
}

struct CounterState {
    pending: HashMap<String, PendingCounter>,
    ops_since_flush: usize,
    last_flush: Instant,
}

/// In-memory hit/miss accumulator shared across worker threads.
pub struct Counters {
    state: Mutex<CounterState>,
}

impl Default for Counters {
    fn default() -> Self {
        Self::new()
    }
}

impl Counters {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(CounterState {
                pending: HashMap::new(),
                ops_since_flush: 0,
                last_flush: Instant::now(),
            }),
        }
    }

    /// Records a hit; returns true when a flush is due.
    pub fn track_hit(&self, table_id: &str) -> bool {
        self.track(table_id, true)
    }

    /// Records a miss; returns true when a flush is due.
    pub fn track_miss(&self, table_id: &str) -> bool {
        self.track(table_id, false)
    }

    fn track(&self, table_id: &str, hit: bool) -> bool {
        let mut state = self.state.lock();
        let counter = state.pending.entry(table_id.to_string()).or_default();
        if hit {
            counter.hits += 1;
        } else {
            counter.misses += 1;
        }
        counter.last_access = Some(timestamp::now());
        state.ops_since_flush += 1;

        state.ops_since_flush >= FLUSH_OPS_THRESHOLD || state.last_flush.elapsed() >= FLUSH_INTERVAL
    }

    /// Drains the pending counters and resets the flush triggers.
    pub fn take_pending(&self) -> HashMap<String, PendingCounter> {
        let mut state = self.state.lock();
        state.ops_since_flush = 0;
        state.last_flush = Instant::now();
        std::mem::take(&mut state.pending)
    }
}

/// Database interface for persisted cache statistics.
pub struct Stats<'conn> {
    conn: &'conn Connection,
}

impl<'conn> Stats<'conn> {
    pub fn new(conn: &'conn Connection) -> Result<Self> {
        conn.execute(SCHEMA_STATS, [])?;
        Ok(Self { conn })
    }

    /// Adds a batch of deltas to the persisted counters.
    pub fn record(&self, pending: &HashMap<String, PendingCounter>) -> Result<()> {
        let now = timestamp::now();
        let mut stmt = self.conn.prepare(UPSERT_STATS)?;
        for (table_id, counter) in pending {
            stmt.execute(params![
                table_id,
                counter.hits as i64,
                counter.misses as i64,
                counter.last_access,
                now,
            ])?;
        }
        Ok(())
    }

    /// Report for one table, or aggregated over every table.
    pub fn report(&self, table_id: Option<&str>) -> Result<PerformanceReport> {
        let (hits, misses, last_access): (i64, i64, Option<String>) = match table_id {
            Some(id) => {
                let mut stmt = self
                    .conn
                    .prepare("SELECT hits, misses, last_access FROM cache_stats WHERE table_id = ?1")?;
                let mut rows = stmt.query_map(params![id], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?;
                rows.next().transpose()?.unwrap_or((0, 0, None))
            }
            None => self.conn.query_row(
                "SELECT COALESCE(SUM(hits), 0), COALESCE(SUM(misses), 0), MAX(last_access) FROM cache_stats",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )?,
        };

        let hits = hits.max(0) as u64;
        let misses = misses.max(0) as u64;
        let total = hits + misses;
        let hit_rate_percent = if total == 0 { 0.0 } else { (hits as f64 / total as f64) * 100.0 };

        Ok(PerformanceReport {
            hits,
            misses,
            total,
            hit_rate_percent,
            last_access,
        })
    }
}

//! The cache engine: schema lifecycle, TTL validity and invalidation.
//!
//! `Cache` owns the single store connection and ties the subsystems
//! together: the registry and column synthesis for dynamic schemas, the
//! record store for bulk writes, the query builder for local reads, the
//! TTL table for per-table lifetimes and the counters for hit/miss
//! statistics.
//!
//! ## Invalidation cascade
//!
//! Solutions contain tables contain records, and invalidation flows down
//! that tree: refreshing `solutions` expires the solution list, every
//! table-metadata row and every record table; refreshing `tables` for one
//! solution expires that solution's metadata rows and record tables;
//! refreshing `records` expires a single record table. Members and teams
//! are independent scopes.

use crate::api::{Member, Solution, TableInfo, Team};
use crate::db::db::Db;
use crate::db::members::Members;
use crate::db::records::RecordStore;
use crate::db::registry::{Registry, RegistryEntry};
use crate::db::solutions::Solutions;
use crate::db::stats::{Counters, PerformanceReport, Stats};
use crate::db::tables::Tables;
use crate::db::teams::Teams;
use crate::db::ttl::Ttls;
use crate::libs::config::Config;
use crate::libs::fields::RemoteField;
use crate::libs::fuzzy;
use crate::libs::messages::Message;
use crate::libs::query::QueryBuilder;
use crate::libs::schema;
use crate::libs::timestamp;
use crate::{msg_bail_anyhow, msg_debug, msg_error_anyhow};
use anyhow::Result;
use chrono::{Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::collections::HashSet;

/// A cache scope addressed by `refresh`.
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshResource {
    Solutions,
    Tables { solution_id: Option<String> },
    Records { table_id: String },
    Members,
    Teams,
}

impl RefreshResource {
    /// Parses a resource keyword plus its optional target.
    pub fn parse(resource: &str, target: Option<String>) -> Result<Self> {
        match resource {
            "solutions" => Ok(Self::Solutions),
            "tables" => Ok(Self::Tables { solution_id: target }),
            "records" => match target {
                Some(table_id) => Ok(Self::Records { table_id }),
                None => Err(msg_error_anyhow!(Message::RefreshRequiresTable)),
            },
            "members" => Ok(Self::Members),
            "teams" => Ok(Self::Teams),
            other => Err(msg_error_anyhow!(Message::UnknownRefreshResource(other.to_string()))),
        }
    }
}

/// Snapshot of one cached scope for `status`.
#[derive(Debug, Clone)]
pub struct ScopeStatus {
    pub scope: String,
    pub count: i64,
    pub cached_at: Option<String>,
    pub expires_at: Option<String>,
    pub time_remaining_seconds: i64,
    pub is_valid: bool,
}

/// The record cache engine.
///
/// One value per process: it owns the store connection, the configuration
/// and the in-memory performance counters. All operations are blocking;
/// SQLite serialises the writers.
pub struct Cache {
    conn: Connection,
    config: Config,
    counters: Counters,
}

impl Cache {
    /// Opens the store, runs migrations and ensures the base schema.
    pub fn open(config: Config) -> Result<Self> {
        let db = Db::new()?;
        let conn = db.conn;

        // Fixed tables exist from the start; record tables are created on
        // first write per remote table
        Registry::new(&conn)?;
        Ttls::new(&conn)?;
        Stats::new(&conn)?;
        Solutions::new(&conn)?;
        Tables::new(&conn)?;
        Members::new(&conn)?;
        Teams::new(&conn)?;

        Ok(Self {
            conn,
            config,
            counters: Counters::new(),
        })
    }

    /// Direct connection access for tooling and tests.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    // === RECORD OPERATIONS ===

    /// Replaces a table's cached records wholesale.
    ///
    /// Creates or evolves the local table to match the catalog, deletes the
    /// existing rows and inserts the new set under one uniform expiry.
    /// TTL precedence: explicit argument, then the per-table TTL row, then
    /// the configured default.
    pub fn bulk_replace(&self, table_id: &str, catalog: &[RemoteField], records: &[Value], ttl: Option<i64>) -> Result<usize> {
        let entry = self.ensure_schema(table_id, catalog)?;
        let ttl_seconds = self.resolve_ttl(table_id, ttl)?;
        let cached_at = timestamp::now();
        let expires_at = expiry(ttl_seconds);

        let store = RecordStore::new(&self.conn);
        let count = store.replace_all(&entry.local_table_name, &entry.mapping, records, &cached_at, &expires_at)?;
        msg_debug!(Message::RecordsCached(count, table_id.to_string()));
        Ok(count)
    }

    /// Inserts or replaces a single record; the table must already be
    /// cached.
    pub fn upsert_one(&self, table_id: &str, record: &Value) -> Result<()> {
        let entry = self.require_entry(table_id)?;
        let ttl_seconds = self.resolve_ttl(table_id, None)?;
        let store = RecordStore::new(&self.conn);
        store.upsert(&entry.local_table_name, &entry.mapping, record, &timestamp::now(), &expiry(ttl_seconds))
    }

    /// Removes a single record; missing tables and rows are not errors.
    pub fn delete_one(&self, table_id: &str, record_id: &str) -> Result<()> {
        let Some(entry) = Registry::new(&self.conn)?.get(table_id)? else {
            return Ok(());
        };
        RecordStore::new(&self.conn).delete(&entry.local_table_name, record_id)
    }

    /// Reads one cached record by id, reconstructed into record shape.
    pub fn get_record(&self, table_id: &str, record_id: &str) -> Result<Option<Value>> {
        let entry = self.require_entry(table_id)?;
        RecordStore::new(&self.conn).get(&entry.local_table_name, &entry.mapping, record_id)
    }

    /// True when the table has at least one row within TTL.
    pub fn is_valid(&self, table_id: &str) -> Result<bool> {
        match Registry::new(&self.conn)?.get(table_id)? {
            Some(entry) => RecordStore::new(&self.conn).is_valid(&entry.local_table_name),
            None => Ok(false),
        }
    }

    /// Expires every row of the table; with `structure_changed`, the
    /// table's metadata row expires too so the catalog is refetched.
    pub fn invalidate(&self, table_id: &str, structure_changed: bool) -> Result<()> {
        if let Some(entry) = Registry::new(&self.conn)?.get(table_id)? {
            RecordStore::new(&self.conn).invalidate(&entry.local_table_name)?;
        }
        if structure_changed {
            Tables::new(&self.conn)?.invalidate_row(table_id)?;
        }
        msg_debug!(Message::CacheInvalidated(table_id.to_string()));
        Ok(())
    }

    /// A query builder bound to the table's local mirror.
    pub fn query(&self, table_id: &str) -> Result<QueryBuilder<'_>> {
        let entry = self.require_entry(table_id)?;
        Ok(QueryBuilder::new(&self.conn, entry.local_table_name, entry.mapping))
    }

    // === SCHEMA LIFECYCLE ===

    /// Creates the local table on first contact, or diffs the catalog and
    /// adds columns for fields that appeared since.
    ///
    /// Fields that disappeared from the catalog keep their columns: the
    /// data is historical, the cache is rebuildable, and destructive ALTERs
    /// buy nothing.
    fn ensure_schema(&self, table_id: &str, catalog: &[RemoteField]) -> Result<RegistryEntry> {
        let registry = Registry::new(&self.conn)?;
        let store = RecordStore::new(&self.conn);

        match registry.get(table_id)? {
            None => {
                let mapping = schema::synthesise(catalog);
                let name_hint = Tables::new(&self.conn)?
                    .get(table_id)?
                    .map(|t| t.name)
                    .unwrap_or_else(|| table_id.to_string());
                let local_table_name = schema::local_table_name(&name_hint, table_id);

                store.create_table(&local_table_name, &mapping)?;

                let now = timestamp::now();
                let entry = RegistryEntry {
                    table_id: table_id.to_string(),
                    local_table_name,
                    catalog: catalog.to_vec(),
                    mapping,
                    created_at: now.clone(),
                    updated_at: now,
                };
                registry.insert(&entry)?;
                msg_debug!(Message::CacheTableCreated(entry.local_table_name.clone()));
                Ok(entry)
            }
            Some(mut entry) => {
                let known: HashSet<&str> = entry.catalog.iter().map(|f| f.slug.as_str()).collect();
                let added: Vec<RemoteField> = catalog.iter().filter(|f| !known.contains(f.slug.as_str())).cloned().collect();

                if !added.is_empty() {
                    let new_entries = schema::synthesise_added(&entry.mapping, &added);
                    store.add_columns(&entry.local_table_name, &new_entries)?;
                    entry.mapping.entries.extend(new_entries);
                    entry.catalog.extend(added.iter().cloned());
                    entry.updated_at = timestamp::now();
                    registry.update(&entry)?;
                    msg_debug!(Message::CacheTableEvolved(entry.local_table_name.clone(), added.len()));
                }
                Ok(entry)
            }
        }
    }

    fn require_entry(&self, table_id: &str) -> Result<RegistryEntry> {
        match Registry::new(&self.conn)?.get(table_id)? {
            Some(entry) => Ok(entry),
            None => msg_bail_anyhow!(Message::TableNotCached(table_id.to_string())),
        }
    }

    // === ANCILLARY CACHES ===

    pub fn cache_solutions(&self, solutions: &[Solution], ttl: Option<i64>) -> Result<usize> {
        let expires_at = expiry(ttl.unwrap_or_else(|| self.config.default_ttl_seconds()));
        Solutions::new(&self.conn)?.replace_all(solutions, &timestamp::now(), &expires_at)
    }

    pub fn solutions(&self) -> Result<Vec<Solution>> {
        Solutions::new(&self.conn)?.fetch_valid()
    }

    /// Finds a cached solution by human name, case- and accent-insensitive.
    pub fn find_solution(&self, name: &str) -> Result<Option<Solution>> {
        let solutions = self.solutions()?;
        Ok(fuzzy::best_match(&solutions, name, |s| s.name.as_str()).cloned())
    }

    /// Finds a cached table by human name, optionally within one solution.
    pub fn find_table(&self, name: &str, solution_id: Option<&str>) -> Result<Option<TableInfo>> {
        let tables = self.tables(solution_id)?;
        Ok(fuzzy::best_match(&tables, name, |t| t.name.as_str()).cloned())
    }

    pub fn cache_tables(&self, solution_id: Option<&str>, tables: &[TableInfo], ttl: Option<i64>) -> Result<usize> {
        let expires_at = expiry(ttl.unwrap_or_else(|| self.config.default_ttl_seconds()));
        Tables::new(&self.conn)?.replace_for_scope(solution_id, tables, &timestamp::now(), &expires_at)
    }

    pub fn tables(&self, solution_id: Option<&str>) -> Result<Vec<TableInfo>> {
        Tables::new(&self.conn)?.fetch_valid(solution_id)
    }

    /// Caches one table's metadata without touching its siblings.
    pub fn cache_table_info(&self, table: &TableInfo, ttl: Option<i64>) -> Result<()> {
        let expires_at = expiry(ttl.unwrap_or_else(|| self.config.default_ttl_seconds()));
        Tables::new(&self.conn)?.upsert(table, &timestamp::now(), &expires_at)
    }

    /// Cached metadata for one table, valid or not.
    pub fn table_info(&self, table_id: &str) -> Result<Option<TableInfo>> {
        Tables::new(&self.conn)?.get(table_id)
    }

    pub fn cache_members(&self, members: &[Member], ttl: Option<i64>) -> Result<usize> {
        let expires_at = expiry(ttl.unwrap_or_else(|| self.config.default_ttl_seconds()));
        Members::new(&self.conn)?.replace_all(members, &timestamp::now(), &expires_at)
    }

    pub fn members(&self) -> Result<Vec<Member>> {
        Members::new(&self.conn)?.fetch_valid()
    }

    pub fn cache_teams(&self, teams: &[Team], ttl: Option<i64>) -> Result<usize> {
        let expires_at = expiry(ttl.unwrap_or_else(|| self.config.default_ttl_seconds()));
        Teams::new(&self.conn)?.replace_all(teams, &timestamp::now(), &expires_at)
    }

    pub fn teams(&self) -> Result<Vec<Team>> {
        Teams::new(&self.conn)?.fetch_valid()
    }

    // === INVALIDATION ===

    /// Resource-keyed invalidation with parent-to-child cascade.
    pub fn refresh(&self, resource: &RefreshResource) -> Result<()> {
        let store = RecordStore::new(&self.conn);
        let registry = Registry::new(&self.conn)?;
        let tables = Tables::new(&self.conn)?;

        match resource {
            RefreshResource::Solutions => {
                Solutions::new(&self.conn)?.invalidate()?;
                tables.invalidate_all()?;
                for entry in registry.all()? {
                    store.invalidate(&entry.local_table_name)?;
                }
                msg_debug!(Message::CacheRefreshed("solutions".to_string()));
            }
            RefreshResource::Tables { solution_id: Some(solution) } => {
                let ids = tables.ids_for_solution(solution)?;
                tables.invalidate_for_solution(solution)?;
                for table_id in ids {
                    if let Some(entry) = registry.get(&table_id)? {
                        store.invalidate(&entry.local_table_name)?;
                    }
                }
                msg_debug!(Message::CacheRefreshed(format!("tables ({})", solution)));
            }
            RefreshResource::Tables { solution_id: None } => {
                tables.invalidate_all()?;
                for entry in registry.all()? {
                    store.invalidate(&entry.local_table_name)?;
                }
                msg_debug!(Message::CacheRefreshed("tables".to_string()));
            }
            RefreshResource::Records { table_id } => {
                match registry.get(table_id)? {
                    Some(entry) => store.invalidate(&entry.local_table_name)?,
                    None => msg_debug!(Message::TableNotCached(table_id.clone())),
                }
                msg_debug!(Message::CacheRefreshed(format!("records ({})", table_id)));
            }
            RefreshResource::Members => {
                Members::new(&self.conn)?.invalidate()?;
                msg_debug!(Message::CacheRefreshed("members".to_string()));
            }
            RefreshResource::Teams => {
                Teams::new(&self.conn)?.invalidate()?;
                msg_debug!(Message::CacheRefreshed("teams".to_string()));
            }
        }
        Ok(())
    }

    // === STATUS ===

    /// Snapshot of every cached scope, or of one record table.
    pub fn status(&self, table_id: Option<&str>) -> Result<Vec<ScopeStatus>> {
        let registry = Registry::new(&self.conn)?;
        let mut statuses = Vec::new();

        match table_id {
            Some(id) => {
                if let Some(entry) = registry.get(id)? {
                    if let Some(status) = self.scope_status(&format!("records:{}", id), &entry.local_table_name)? {
                        statuses.push(status);
                    }
                }
            }
            None => {
                for (scope, table) in [
                    ("solutions", "cached_solutions"),
                    ("tables", "cached_tables"),
                    ("members", "cached_members"),
                    ("teams", "cached_teams"),
                ] {
                    if let Some(status) = self.scope_status(scope, table)? {
                        statuses.push(status);
                    }
                }
                for entry in registry.all()? {
                    if let Some(status) = self.scope_status(&format!("records:{}", entry.table_id), &entry.local_table_name)? {
                        statuses.push(status);
                    }
                }
            }
        }
        Ok(statuses)
    }

    /// One scope's snapshot; `None` when a stored timestamp is corrupt.
    fn scope_status(&self, scope: &str, table: &str) -> Result<Option<ScopeStatus>> {
        let count: i64 = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM \"{}\"", table), [], |row| row.get(0))?;

        if count == 0 {
            return Ok(Some(ScopeStatus {
                scope: scope.to_string(),
                count: 0,
                cached_at: None,
                expires_at: None,
                time_remaining_seconds: 0,
                is_valid: false,
            }));
        }

        let cached_at: Option<String> = self
            .conn
            .query_row(&format!("SELECT MAX(cached_at) FROM \"{}\"", table), [], |row| row.get(0))
            .optional()?
            .flatten();
        let expires_at: Option<String> = self
            .conn
            .query_row(&format!("SELECT MAX(expires_at) FROM \"{}\"", table), [], |row| row.get(0))
            .optional()?
            .flatten();

        // A corrupt expiry makes the whole entry meaningless; omit it
        let Some(expires_raw) = expires_at.clone() else {
            return Ok(None);
        };
        let Some(expires) = timestamp::parse_stored(&expires_raw) else {
            return Ok(None);
        };

        let now = Utc::now();
        let time_remaining_seconds = (expires - now).num_seconds().max(0);
        let valid_rows: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM \"{}\" WHERE expires_at > ?1", table),
            params![timestamp::now()],
            |row| row.get(0),
        )?;

        Ok(Some(ScopeStatus {
            scope: scope.to_string(),
            count,
            cached_at,
            expires_at,
            time_remaining_seconds,
            is_valid: valid_rows > 0,
        }))
    }

    // === PERFORMANCE COUNTERS ===

    /// Records a cache hit; may trigger a batched flush.
    pub fn track_hit(&self, table_id: &str) {
        if self.counters.track_hit(table_id) {
            self.flush_counters();
        }
    }

    /// Records a cache miss; may trigger a batched flush.
    pub fn track_miss(&self, table_id: &str) {
        if self.counters.track_miss(table_id) {
            self.flush_counters();
        }
    }

    /// Flushes pending counters, then reports.
    pub fn performance(&self, table_id: Option<&str>) -> Result<PerformanceReport> {
        self.flush_counters();
        Stats::new(&self.conn)?.report(table_id)
    }

    /// Best-effort flush: statistics must never break a read or write.
    fn flush_counters(&self) {
        let pending = self.counters.take_pending();
        if pending.is_empty() {
            return;
        }
        if let Err(e) = Stats::new(&self.conn).and_then(|stats| stats.record(&pending)) {
            msg_debug!(Message::StatsFlushFailed(e.to_string()));
        }
    }

    /// Flushes counters and closes the connection. The sole teardown point.
    pub fn close(self) -> Result<()> {
        self.flush_counters();
        self.conn.close().map_err(|(_, e)| e.into())
    }

    // === TTL ===

    fn resolve_ttl(&self, table_id: &str, explicit: Option<i64>) -> Result<i64> {
        if let Some(ttl) = explicit {
            if ttl <= 0 {
                msg_bail_anyhow!(Message::InvalidTtl(ttl));
            }
            return Ok(ttl);
        }
        if let Some(ttl) = Ttls::new(&self.conn)?.get(table_id)? {
            return Ok(ttl);
        }
        Ok(self.config.default_ttl_seconds())
    }
}

/// `now + ttl` in stored form.
fn expiry(ttl_seconds: i64) -> String {
    (Utc::now() + Duration::seconds(ttl_seconds))
        .format(timestamp::STORAGE_FORMAT)
        .to_string()
}

//! Database layer for gridcache.
//!
//! A complete persistence layer on SQLite: connection management and
//! legacy-schema migration, the dynamic per-table record stores, the cache
//! table registry that is the source of truth for their schemas, and the
//! fixed ancillary caches (solutions, tables, members, teams) with TTL
//! configuration and hit/miss statistics.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use gridcache::db::cache::Cache;
//! use gridcache::libs::config::Config;
//!
//! let cache = Cache::open(Config::read()?)?;
//! let valid = cache.is_valid("64e1a9")?;
//! # anyhow::Ok(())
//! ```

/// Core database connection and initialization module.
pub mod db;

/// Legacy on-disk schema migration, run once per open.
pub mod migrations;

/// The cache engine tying schema, storage, TTL and statistics together.
pub mod cache;

/// Cache table registry: dynamic schema source of truth.
pub mod registry;

/// Dynamic per-table record storage.
pub mod records;

/// Per-table TTL configuration and presets.
pub mod ttl;

/// Hit/miss statistics with batched persistence.
pub mod stats;

/// Cached solution list.
pub mod solutions;

/// Cached table metadata and field catalogs.
pub mod tables;

/// Cached workspace members.
pub mod members;

/// Cached workspace teams.
pub mod teams;

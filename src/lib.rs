//! # Gridcache - Local record cache for remote workspace tables
//!
//! A record-caching engine that mirrors remote workspace tables into a
//! local SQLite store, so reads, filters and sorts can be served locally
//! without re-hitting the remote API.
//!
//! ## Features
//!
//! - **Dynamic Schemas**: Remote field catalogs become typed, indexed
//!   local tables, evolving in place when the remote schema changes
//! - **Value Codec**: Faithful extraction and reconstruction of ≈45
//!   heterogeneous field value shapes
//! - **Filter Translation**: The remote filter DSL becomes parameterised
//!   SQL, with field-type-aware operator validation
//! - **Cache Lifecycle**: Per-table TTL, cascading invalidation across the
//!   solution → table → records hierarchy, batched hit/miss statistics
//! - **Schema Migration**: Legacy on-disk layouts are rewritten in place,
//!   idempotently, on open
//!
//! ## Usage
//!
//! ```rust,no_run
//! use gridcache::commands::Cli;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     Cli::menu().await
//! }
//! ```

pub mod api;
pub mod commands;
pub mod db;
pub mod libs;

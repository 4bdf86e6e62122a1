//! Cache invalidation command.
//!
//! Marks a cached scope as expired so the next read refetches it. Parent
//! scopes cascade: refreshing solutions also expires all table metadata and
//! every record table.
//!
//! ## Usage
//!
//! ```bash
//! gridcache refresh solutions
//! gridcache refresh tables --solution sol_x
//! gridcache refresh records --table 64e1a9
//! ```

use crate::db::cache::{Cache, RefreshResource};
use crate::libs::{config::Config, messages::Message};
use crate::msg_success;
use anyhow::Result;
use clap::Args;

/// Command-line arguments for the refresh command.
#[derive(Debug, Args)]
pub struct RefreshArgs {
    /// Scope to refresh: solutions, tables, records, members or teams
    resource: String,

    /// Limit a tables refresh to one solution
    #[arg(short, long)]
    solution: Option<String>,

    /// Record table id, required when refreshing records
    #[arg(short, long)]
    table: Option<String>,
}

/// Executes the refresh command.
pub fn cmd(args: RefreshArgs) -> Result<()> {
    let resource = RefreshResource::parse(&args.resource, args.table.or(args.solution))?;

    let cache = Cache::open(Config::read()?)?;
    cache.refresh(&resource)?;
    msg_success!(Message::CacheRefreshed(args.resource));
    cache.close()
}

//! Command-line interface commands for gridcache.
//!
//! Administrative surface over the cache engine: configuration setup,
//! remote fetches, invalidation, TTL tuning and status reporting.
//!
//! ## Usage
//!
//! ```bash
//! gridcache init                        # Configure API and cache settings
//! gridcache pull records --table 64e1a9 # Fetch and cache a table's records
//! gridcache status                      # Show cached scopes and validity
//! gridcache refresh solutions           # Invalidate with cascade
//! gridcache ttl 64e1a9 --preset low     # Tune a table's cache lifetime
//! ```

pub mod init;
pub mod pull;
pub mod refresh;
pub mod status;
pub mod ttl;

use anyhow::Result;
use clap::{Parser, Subcommand};

/// Defines the main subcommands that the application can execute.
#[derive(Debug, Subcommand)]
enum Commands {
    /// Initialize application configuration interactively
    #[command(about = "Configuration initialization")]
    Init(init::InitArgs),

    /// Fetch a scope from the remote API into the cache
    #[command(about = "Fetch remote data into the local cache")]
    Pull(pull::PullArgs),

    /// Display cache status or performance counters
    #[command(about = "Show cached scopes, expiry and hit rates")]
    Status(status::StatusArgs),

    /// Invalidate cached scopes with parent-to-child cascade
    #[command(about = "Invalidate cached data")]
    Refresh(refresh::RefreshArgs),

    /// Configure per-table cache TTL
    #[command(about = "Set or show a table's cache TTL")]
    Ttl(ttl::TtlArgs),
}

/// The main CLI structure that parses command-line arguments.
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
#[command(arg_required_else_help(true))]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    /// Parses command-line arguments and executes the corresponding command.
    pub async fn menu() -> Result<()> {
        let cli = Self::parse();

        match cli.command {
            Commands::Init(args) => init::cmd(args),
            Commands::Pull(args) => pull::cmd(args).await,
            Commands::Status(args) => status::cmd(args),
            Commands::Refresh(args) => refresh::cmd(args),
            Commands::Ttl(args) => ttl::cmd(args),
        }
    }
}

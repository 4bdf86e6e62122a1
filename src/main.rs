//! Main entry point for the gridcache application.
//!
//! Initializes tracing when debug mode is requested and delegates to the
//! CLI handler for command execution.

use anyhow::Result;
use gridcache::commands::Cli;
use std::env;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing only if debug mode is enabled
    // This prevents log output from cluttering normal CLI usage
    if env::var("GRIDCACHE_DEBUG").is_ok() || env::var("RUST_LOG").is_ok() {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "gridcache=debug".into()))
            .init();
    }

    Cli::menu().await
}

//! Application configuration initialization command.
//!
//! Interactive setup wizard for first-time use: workspace API credentials,
//! cache defaults and display timezone. With `--delete` the existing
//! configuration is removed instead.
//!
//! ## Usage
//!
//! ```bash
//! # Run interactive setup wizard
//! gridcache init
//!
//! # Reset configuration (remove existing settings)
//! gridcache init --delete
//! ```

use crate::libs::{config::Config, messages::Message};
use crate::{msg_info, msg_success};
use anyhow::Result;
use clap::Args;

/// Command-line arguments for the initialization command.
#[derive(Debug, Args)]
pub struct InitArgs {
    /// Remove existing configuration instead of creating new one
    #[arg(short, long)]
    delete: bool,
}

/// Executes the initialization command.
pub fn cmd(init_args: InitArgs) -> Result<()> {
    if init_args.delete {
        Config::delete()?;
        msg_info!(Message::ConfigDeleted);
        return Ok(());
    }

    let config = Config::init()?;
    config.save()?;
    msg_success!(Message::ConfigSaved);
    Ok(())
}

//! Per-table TTL configuration command.
//!
//! Sets how long a table's cached records stay valid, either as raw
//! seconds or through a mutation-rate preset. Without a value, the current
//! setting is shown.
//!
//! ## Usage
//!
//! ```bash
//! gridcache ttl 64e1a9 --seconds 3600
//! gridcache ttl 64e1a9 --preset low
//! gridcache ttl 64e1a9
//! ```

use crate::db::cache::Cache;
use crate::db::ttl::{preset_seconds, Ttls};
use crate::libs::{config::Config, messages::Message};
use crate::{msg_bail_anyhow, msg_info, msg_success};
use anyhow::Result;
use clap::Args;

/// Command-line arguments for the TTL command.
#[derive(Debug, Args)]
pub struct TtlArgs {
    /// Remote table id
    table_id: String,

    /// TTL in seconds
    #[arg(short, long)]
    seconds: Option<i64>,

    /// Preset alias: high_mutation, medium, low or very_low
    #[arg(short, long)]
    preset: Option<String>,

    /// Free-text note stored with the setting
    #[arg(short, long)]
    notes: Option<String>,
}

/// Executes the TTL command.
pub fn cmd(args: TtlArgs) -> Result<()> {
    let cache = Cache::open(Config::read()?)?;
    let ttls = Ttls::new(cache.conn())?;

    let (seconds, level) = match (&args.preset, args.seconds) {
        (Some(preset), _) => match preset_seconds(preset) {
            Some(seconds) => (Some(seconds), Some(preset.clone())),
            None => msg_bail_anyhow!(Message::UnknownTtlPreset(preset.clone())),
        },
        (None, Some(seconds)) => (Some(seconds), None),
        (None, None) => (None, None),
    };

    match seconds {
        Some(seconds) => {
            ttls.set(&args.table_id, seconds, level.as_deref(), args.notes.as_deref())?;
            msg_success!(Message::TtlConfigured(args.table_id.clone(), seconds));
        }
        None => match ttls.entry(&args.table_id)? {
            Some(entry) => msg_info!(Message::TtlConfigured(entry.table_id, entry.ttl_seconds)),
            None => msg_info!(Message::TableNotCached(args.table_id.clone())),
        },
    }

    cache.close()
}

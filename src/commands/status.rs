//! Cache status display command.
//!
//! Shows every cached scope (or one table) with row counts, cache and
//! expiry times, and whether the scope is still valid. With
//! `--performance` the hit/miss counters are shown instead.

use crate::db::cache::Cache;
use crate::libs::{config::Config, messages::Message, timestamp::Timestamps};
use crate::{msg_info, msg_print};
use anyhow::Result;
use clap::Args;
use prettytable::{format, row, Table};

/// Command-line arguments for the status command.
#[derive(Debug, Args)]
pub struct StatusArgs {
    /// Limit the report to one remote table id
    table_id: Option<String>,

    /// Show hit/miss counters instead of scope validity
    #[arg(short, long)]
    performance: bool,
}

/// Executes the status command.
pub fn cmd(args: StatusArgs) -> Result<()> {
    let config = Config::read()?;
    let timestamps = Timestamps::from_setting(config.timezone.as_deref())?;
    let cache = Cache::open(config)?;

    if args.performance {
        let report = cache.performance(args.table_id.as_deref())?;
        msg_print!(Message::PerformanceHeader, true);

        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_NO_LINESEP_WITH_TITLE);
        table.set_titles(row!["Hits", "Misses", "Total", "Hit rate", "Last access"]);
        table.add_row(row![
            report.hits,
            report.misses,
            report.total,
            format!("{:.1}%", report.hit_rate_percent),
            report.last_access.unwrap_or_else(|| "-".to_string()),
        ]);
        table.printstd();
        return cache.close();
    }

    let statuses = cache.status(args.table_id.as_deref())?;
    if statuses.is_empty() {
        msg_info!(Message::CacheEmpty);
        return cache.close();
    }

    msg_print!(Message::StatusHeader, true);

    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_NO_LINESEP_WITH_TITLE);
    table.set_titles(row!["Scope", "Rows", "Cached at", "Expires at", "Remaining", "Valid"]);
    for status in statuses {
        let display = |value: Option<String>| {
            value
                .and_then(|s| crate::libs::timestamp::parse_stored(&s).map(|dt| timestamps.display(dt)))
                .unwrap_or_else(|| "-".to_string())
        };
        table.add_row(row![
            status.scope,
            status.count,
            display(status.cached_at),
            display(status.expires_at),
            format_remaining(status.time_remaining_seconds),
            if status.is_valid { "yes" } else { "no" },
        ]);
    }
    table.printstd();

    cache.close()
}

/// Human form of a remaining-seconds count.
fn format_remaining(seconds: i64) -> String {
    if seconds <= 0 {
        return "expired".to_string();
    }
    if seconds < 60 {
        return format!("{}s", seconds);
    }
    if seconds < 3600 {
        return format!("{}m", seconds / 60);
    }
    if seconds < 86400 {
        return format!("{}h {}m", seconds / 3600, (seconds % 3600) / 60);
    }
    format!("{}d {}h", seconds / 86400, (seconds % 86400) / 3600)
}

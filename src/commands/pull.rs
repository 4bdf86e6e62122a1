//! Remote fetch command: populate the cache from the workspace API.
//!
//! Fetches a scope from the remote API and replaces the corresponding
//! cached rows. Pulling records also refreshes the table's metadata row so
//! the local schema tracks the remote field catalog.
//!
//! ## Usage
//!
//! ```bash
//! gridcache pull solutions
//! gridcache pull tables --solution sol_x
//! gridcache pull records --table 64e1a9 --ttl 3600
//! ```

use crate::api::{ListRecordsOptions, WorkspaceApi, WorkspaceClient};
use crate::db::cache::Cache;
use crate::libs::{config::Config, messages::Message};
use crate::{msg_bail_anyhow, msg_error_anyhow, msg_success};
use anyhow::Result;
use clap::Args;

/// Command-line arguments for the pull command.
#[derive(Debug, Args)]
pub struct PullArgs {
    /// Scope to fetch: solutions, tables, records, members or teams
    resource: String,

    /// Limit a tables pull to one solution
    #[arg(long)]
    solution: Option<String>,

    /// Record table id, required when pulling records
    #[arg(long)]
    table: Option<String>,

    /// Explicit TTL in seconds for the fetched rows
    #[arg(long)]
    ttl: Option<i64>,
}

/// Executes the pull command.
pub async fn cmd(args: PullArgs) -> Result<()> {
    let config = Config::read()?;
    let Some(api_config) = config.api.clone() else {
        msg_bail_anyhow!(Message::ApiConfigMissing);
    };
    let client = WorkspaceClient::new(&api_config)?;
    let cache = Cache::open(config)?;

    let count = match args.resource.as_str() {
        "solutions" => {
            let solutions = client.list_solutions().await?;
            cache.cache_solutions(&solutions, args.ttl)?
        }
        "tables" => {
            let tables = client.list_tables(args.solution.as_deref()).await?;
            cache.cache_tables(args.solution.as_deref(), &tables, args.ttl)?
        }
        "records" => {
            let Some(table_id) = args.table.as_deref() else {
                msg_bail_anyhow!(Message::RefreshRequiresTable);
            };
            // The catalog rides along with the metadata; cache both so the
            // local schema follows the remote one
            let info = client.get_table(table_id).await?;
            cache.cache_table_info(&info, args.ttl)?;

            let page = client.list_records(table_id, &ListRecordsOptions::default()).await?;
            cache.bulk_replace(table_id, &info.structure, &page.items, args.ttl)?
        }
        "members" => {
            let members = client.list_members().await?;
            cache.cache_members(&members, args.ttl)?
        }
        "teams" => {
            let teams = client.list_teams().await?;
            cache.cache_teams(&teams, args.ttl)?
        }
        other => return Err(msg_error_anyhow!(Message::UnknownRefreshResource(other.to_string()))),
    };

    msg_success!(Message::RecordsCached(count, args.resource));
    cache.close()
}

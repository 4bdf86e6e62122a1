//! Remote workspace API contract and client.
//!
//! The cache engine only depends on the data shapes and the
//! [`WorkspaceApi`] trait defined here; the HTTP implementation in
//! [`client`] is one collaborator fulfilling that contract. Tests provide
//! their own implementations instead of talking to the network.

use crate::libs::fields::RemoteField;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub mod client;

// Re-export the client types for easier access from other modules
pub use client::{ApiConfig, WorkspaceClient};

/// A workspace solution: the top of the solution → table → records tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Solution {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub logo_icon: Option<String>,
    #[serde(default)]
    pub logo_color: Option<String>,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub records_count: Option<i64>,
}

/// Table metadata, including the field catalog (`structure`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableInfo {
    pub id: String,
    pub name: String,
    pub solution_id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub primary_field: Option<String>,
    #[serde(default, rename = "order")]
    pub table_order: Option<i64>,
    #[serde(default)]
    pub permissions: Option<Value>,
    #[serde(default)]
    pub field_permissions: Option<Value>,
    #[serde(default)]
    pub record_term: Option<String>,
    #[serde(default)]
    pub structure: Vec<RemoteField>,
}

/// A workspace member.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Member {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub deleted_date: Option<String>,
}

/// A team grouping members.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub members: Vec<String>,
}

/// One sort instruction of the remote sort DSL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: String,
    /// `asc` or `desc`.
    pub direction: String,
}

/// Options for a record listing call.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ListRecordsOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sort: Vec<SortSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<i64>,
}

/// One page of records from a listing call.
#[derive(Debug, Clone, Deserialize)]
pub struct RecordPage {
    pub items: Vec<Value>,
    #[serde(default)]
    pub total_count: Option<i64>,
}

/// The remote API surface the cache engine consumes.
///
/// Implementations are expected to return records as raw JSON objects with
/// field values keyed by slug; the engine never interprets transport
/// details.
#[allow(async_fn_in_trait)]
pub trait WorkspaceApi {
    async fn list_solutions(&self) -> Result<Vec<Solution>>;

    async fn list_tables(&self, solution_id: Option<&str>) -> Result<Vec<TableInfo>>;

    async fn get_table(&self, table_id: &str) -> Result<TableInfo>;

    async fn list_records(&self, table_id: &str, options: &ListRecordsOptions) -> Result<RecordPage>;

    async fn get_record(&self, table_id: &str, record_id: &str) -> Result<Value>;

    async fn create_record(&self, table_id: &str, payload: &Value) -> Result<Value>;

    async fn update_record(&self, table_id: &str, record_id: &str, payload: &Value) -> Result<Value>;

    async fn delete_record(&self, table_id: &str, record_id: &str) -> Result<()>;

    async fn list_members(&self) -> Result<Vec<Member>>;

    async fn list_teams(&self) -> Result<Vec<Team>>;
}

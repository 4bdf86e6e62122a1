//! HTTP client for the remote workspace API.
//!
//! Implements the [`WorkspaceApi`] contract over REST with token
//! authentication. Rate limiting and retry policy are deliberately left to
//! the caller: the cache engine treats the client as a plain collaborator
//! and decides itself when a refetch is worth it.

use super::{ListRecordsOptions, Member, RecordPage, Solution, TableInfo, Team, WorkspaceApi};
use crate::libs::messages::Message;
use crate::msg_error_anyhow;
use anyhow::Result;
use dialoguer::{theme::ColorfulTheme, Input};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Request timeout for all remote calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Header carrying the workspace account id.
const ACCOUNT_HEADER: &str = "Account-Id";

/// Connection settings for the workspace API.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ApiConfig {
    /// Base URL of the API, e.g. `https://app.example.com/api/v1`.
    pub base_url: String,
    /// API token sent in the `Authorization` header.
    pub api_key: String,
    /// Workspace account identifier.
    pub account_id: String,
}

impl ApiConfig {
    /// Interactive prompt used by `gridcache init`.
    pub fn init(existing: &Option<ApiConfig>) -> Result<Self> {
        let current = existing.clone().unwrap_or_else(|| ApiConfig {
            base_url: String::new(),
            api_key: String::new(),
            account_id: String::new(),
        });

        let base_url: String = Input::with_theme(&ColorfulTheme::default())
            .with_prompt(Message::PromptApiBaseUrl.to_string())
            .with_initial_text(current.base_url.as_str())
            .interact_text()?;
        let api_key: String = Input::with_theme(&ColorfulTheme::default())
            .with_prompt(Message::PromptApiKey.to_string())
            .with_initial_text(current.api_key.as_str())
            .interact_text()?;
        let account_id: String = Input::with_theme(&ColorfulTheme::default())
            .with_prompt(Message::PromptAccountId.to_string())
            .with_initial_text(current.account_id.as_str())
            .interact_text()?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            account_id,
        })
    }
}

/// Reqwest-based implementation of the workspace API contract.
pub struct WorkspaceClient {
    config: ApiConfig,
    client: Client,
}

impl WorkspaceClient {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Token {}", config.api_key))?);
        headers.insert(ACCOUNT_HEADER, HeaderValue::from_str(&config.account_id)?);

        let client = Client::builder().timeout(REQUEST_TIMEOUT).default_headers(headers).build()?;
        Ok(Self {
            config: config.clone(),
            client,
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client.request(method, format!("{}/{}", self.config.base_url, path))
    }

    /// Rejects non-success responses with the status and body text.
    async fn checked(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(msg_error_anyhow!(Message::ApiUnexpectedStatus(status.as_u16(), body)))
    }
}

impl WorkspaceApi for WorkspaceClient {
    async fn list_solutions(&self) -> Result<Vec<Solution>> {
        let response = Self::checked(self.request(Method::GET, "solutions/").send().await?).await?;
        Ok(response.json().await?)
    }

    async fn list_tables(&self, solution_id: Option<&str>) -> Result<Vec<TableInfo>> {
        let mut request = self.request(Method::GET, "applications/");
        if let Some(solution) = solution_id {
            request = request.query(&[("solution", solution)]);
        }
        let response = Self::checked(request.send().await?).await?;
        Ok(response.json().await?)
    }

    async fn get_table(&self, table_id: &str) -> Result<TableInfo> {
        let response = Self::checked(self.request(Method::GET, &format!("applications/{}/", table_id)).send().await?).await?;
        Ok(response.json().await?)
    }

    async fn list_records(&self, table_id: &str, options: &ListRecordsOptions) -> Result<RecordPage> {
        let response = Self::checked(
            self.request(Method::POST, &format!("applications/{}/records/list/", table_id))
                .json(options)
                .send()
                .await?,
        )
        .await?;
        Ok(response.json().await?)
    }

    async fn get_record(&self, table_id: &str, record_id: &str) -> Result<Value> {
        let response = Self::checked(
            self.request(Method::GET, &format!("applications/{}/records/{}/", table_id, record_id))
                .send()
                .await?,
        )
        .await?;
        Ok(response.json().await?)
    }

    async fn create_record(&self, table_id: &str, payload: &Value) -> Result<Value> {
        let response = Self::checked(
            self.request(Method::POST, &format!("applications/{}/records/", table_id))
                .json(payload)
                .send()
                .await?,
        )
        .await?;
        Ok(response.json().await?)
    }

    async fn update_record(&self, table_id: &str, record_id: &str, payload: &Value) -> Result<Value> {
        let response = Self::checked(
            self.request(Method::PATCH, &format!("applications/{}/records/{}/", table_id, record_id))
                .json(payload)
                .send()
                .await?,
        )
        .await?;
        Ok(response.json().await?)
    }

    async fn delete_record(&self, table_id: &str, record_id: &str) -> Result<()> {
        Self::checked(
            self.request(Method::DELETE, &format!("applications/{}/records/{}/", table_id, record_id))
                .send()
                .await?,
        )
        .await?;
        Ok(())
    }

    async fn list_members(&self) -> Result<Vec<Member>> {
        let response = Self::checked(self.request(Method::GET, "members/").send().await?).await?;
        Ok(response.json().await?)
    }

    async fn list_teams(&self) -> Result<Vec<Team>> {
        let response = Self::checked(self.request(Method::GET, "teams/").send().await?).await?;
        Ok(response.json().await?)
    }
}

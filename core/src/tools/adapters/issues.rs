//! Issue tracker lookups backed by the YouTrack REST API.

use crate::tools::types::{ParamSpec, ParamType, Tool, ToolArgs, ToolError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;

/// Default projection for issue queries
pub const DEFAULT_ISSUE_FIELDS: &str = "id,idReadable,summary,customFields(name,value(id,login,fullName))";

/// Projection used when fetching a single issue
pub const DEFAULT_DETAIL_FIELDS: &str =
    "id,idReadable,summary,description,reporter(login,fullName),customFields(name,value(id,name,login,fullName))";

/// A single issue as returned by the tracker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueRecord {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub id_readable: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Every other field the projection asked for
    #[serde(flatten)]
    pub fields: serde_json::Map<String, Value>,
}

/// Compact search hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueSummary {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub id_readable: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub custom_fields: Vec<Value>,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum IssueTrackerError {
    #[error("{operation} failed: Token is empty or blank")]
    MissingCredential { operation: &'static str },

    #[error("{operation} failed: HTTP {status}")]
    Http { operation: &'static str, status: u16 },

    #[error("{operation} request error: {message}")]
    Transport { operation: &'static str, message: String },

    #[error("{operation} decode error: {message}")]
    Decode { operation: &'static str, message: String },
}

#[async_trait]
pub trait IssueTracker: Send + Sync {
    async fn issue(&self, issue_id: &str, fields: &str) -> Result<IssueRecord, IssueTrackerError>;

    async fn search(
        &self,
        query: &str,
        fields: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<IssueSummary>, IssueTrackerError>;
}

/// YouTrack REST client
pub struct YouTrackClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl YouTrackClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client: super::http_client(super::DEFAULT_HTTP_TIMEOUT),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    fn auth_header(&self, operation: &'static str) -> Result<String, IssueTrackerError> {
        let token = self.token.trim();
        if token.is_empty() {
            return Err(IssueTrackerError::MissingCredential { operation });
        }
        Ok(if token.starts_with("Bearer") {
            token.to_string()
        } else {
            format!("Bearer {}", token)
        })
    }

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        operation: &'static str,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, IssueTrackerError> {
        let auth = self.auth_header(operation)?;
        let resp = self
            .client
            .get(format!("{}/api/{}", self.base_url, path))
            .header("Authorization", auth)
            .header("Accept", "application/json")
            .query(query)
            .send()
            .await
            .map_err(|e| IssueTrackerError::Transport { operation, message: e.to_string() })?;

        if !resp.status().is_success() {
            return Err(IssueTrackerError::Http { operation, status: resp.status().as_u16() });
        }

        resp.json()
            .await
            .map_err(|e| IssueTrackerError::Decode { operation, message: e.to_string() })
    }
}

#[async_trait]
impl IssueTracker for YouTrackClient {
    async fn issue(&self, issue_id: &str, fields: &str) -> Result<IssueRecord, IssueTrackerError> {
        self.get(
            "get_issue_details",
            &format!("issues/{}", issue_id),
            &[("fields", fields.to_string())],
        )
        .await
    }

    async fn search(
        &self,
        query: &str,
        fields: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<IssueSummary>, IssueTrackerError> {
        self.get(
            "search_issues",
            "issues",
            &[
                ("fields", fields.to_string()),
                ("query", query.to_string()),
                ("$top", limit.to_string()),
                ("$skip", offset.to_string()),
            ],
        )
        .await
    }
}

/// The `get_issue_details` tool
pub struct IssueDetailsTool {
    tracker: Arc<dyn IssueTracker>,
}

impl IssueDetailsTool {
    pub fn new(tracker: Arc<dyn IssueTracker>) -> Self {
        Self { tracker }
    }
}

#[async_trait]
impl Tool for IssueDetailsTool {
    fn name(&self) -> &str {
        "get_issue_details"
    }

    fn description(&self) -> &str {
        "Retrieves complete details for a specified issue"
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![
            ParamSpec::required("issueId", ParamType::String, "Issue id, e.g. XYZ-4321"),
            ParamSpec::optional("fields", ParamType::String, "Fields to include in the response", json!(DEFAULT_DETAIL_FIELDS)),
        ]
    }

    async fn invoke(&self, args: ToolArgs) -> Result<String, ToolError> {
        let issue_id = args.require_str(self.name(), "issueId")?;
        let record = self
            .tracker
            .issue(issue_id, args.str_or("fields", DEFAULT_DETAIL_FIELDS))
            .await
            .map_err(|e| ToolError::execution(self.name(), e.to_string()))?;
        serde_json::to_string_pretty(&record).map_err(|e| ToolError::execution(self.name(), e.to_string()))
    }
}

/// The `search_issues` tool
pub struct SearchIssuesTool {
    tracker: Arc<dyn IssueTracker>,
}

impl SearchIssuesTool {
    pub fn new(tracker: Arc<dyn IssueTracker>) -> Self {
        Self { tracker }
    }
}

#[async_trait]
impl Tool for SearchIssuesTool {
    fn name(&self) -> &str {
        "search_issues"
    }

    fn description(&self) -> &str {
        "Searches for issues using query syntax"
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![
            ParamSpec::required("query", ParamType::String, "Query string to search for issues"),
            ParamSpec::optional("limit", ParamType::Integer, "Maximum number of results to return", json!(10)),
            ParamSpec::optional("offset", ParamType::Integer, "Number of results to skip", json!(0)),
            ParamSpec::optional("fields", ParamType::String, "Fields to include in the response", json!(DEFAULT_ISSUE_FIELDS)),
        ]
    }

    async fn invoke(&self, args: ToolArgs) -> Result<String, ToolError> {
        let query = args.require_str(self.name(), "query")?;
        let issues = self
            .tracker
            .search(
                query,
                args.str_or("fields", DEFAULT_ISSUE_FIELDS),
                args.u32_or("limit", 10),
                args.u32_or("offset", 0),
            )
            .await
            .map_err(|e| ToolError::execution(self.name(), e.to_string()))?;
        serde_json::to_string_pretty(&issues).map_err(|e| ToolError::execution(self.name(), e.to_string()))
    }
}

//! Git history (blame and log) backed by GitHub's GraphQL API.

use crate::tools::types::{ParamSpec, ParamType, Tool, ToolArgs, ToolError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;

pub const GITHUB_GRAPHQL_URL: &str = "https://api.github.com/graphql";

const BLAME_QUERY: &str = r#"
query Blame($owner: String!, $repo: String!, $ref: String!, $path: String!) {
  repository(owner: $owner, name: $repo) {
    object(expression: $ref) {
      ... on Commit {
        blame(path: $path) {
          ranges {
            startingLine
            endingLine
            commit { oid committedDate messageHeadline author { name email } }
          }
        }
      }
    }
  }
}"#;

const LOG_QUERY: &str = r#"
query CommitHistory($owner: String!, $repo: String!, $branch: String!, $first: Int!, $path: String!) {
  repository(owner: $owner, name: $repo) {
    ref(qualifiedName: $branch) {
      target {
        ... on Commit {
          history(first: $first, path: $path) {
            edges { node { oid messageHeadline committedDate author { name email } } }
          }
        }
      }
    }
  }
}"#;

/// Lines last touched by one commit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlameRange {
    pub line_start: u32,
    pub line_end: u32,
    pub commit_id: String,
    pub date: String,
    pub author_name: String,
    pub author_email: String,
    pub message_headline: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitSummary {
    pub commit_id: String,
    pub message_headline: String,
    pub date: String,
    pub author_name: String,
    pub author_email: String,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GitError {
    #[error("source control token is empty or blank")]
    MissingCredential,

    #[error("{operation} failed: HTTP {status}")]
    Http { operation: &'static str, status: u16 },

    #[error("{operation} request error: {message}")]
    Transport { operation: &'static str, message: String },

    #[error("{operation} returned errors: {message}")]
    Api { operation: &'static str, message: String },

    #[error("{0} not found")]
    NotFound(String),
}

/// Repository history lookups
#[async_trait]
pub trait GitHistory: Send + Sync {
    /// Blame ranges in file order
    async fn blame(&self, path: &str, owner: &str, repo: &str, reference: &str) -> Result<Vec<BlameRange>, GitError>;

    /// Most recent commits touching `path`, newest first
    async fn log(
        &self,
        path: &str,
        owner: &str,
        repo: &str,
        branch: &str,
        limit: u32,
    ) -> Result<Vec<CommitSummary>, GitError>;
}

/// GitHub GraphQL implementation of [`GitHistory`]
pub struct GitHubGraphQl {
    client: reqwest::Client,
    endpoint: String,
    token: String,
}

impl GitHubGraphQl {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            client: super::http_client(super::DEFAULT_HTTP_TIMEOUT),
            endpoint: GITHUB_GRAPHQL_URL.to_string(),
            token: token.into(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    async fn query(&self, operation: &'static str, query: &str, variables: Value) -> Result<Value, GitError> {
        if self.token.trim().is_empty() {
            return Err(GitError::MissingCredential);
        }

        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .header("User-Agent", "dispatch")
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await
            .map_err(|e| GitError::Transport { operation, message: e.to_string() })?;

        if !resp.status().is_success() {
            return Err(GitError::Http { operation, status: resp.status().as_u16() });
        }

        let body: Value = resp
            .json()
            .await
            .map_err(|e| GitError::Transport { operation, message: e.to_string() })?;
        if let Some(errors) = body.get("errors").filter(|e| !e.is_null()) {
            return Err(GitError::Api { operation, message: errors.to_string() });
        }
        Ok(body)
    }
}

fn str_at(value: &Value, pointer: &str) -> String {
    value.pointer(pointer).and_then(|v| v.as_str()).unwrap_or_default().to_string()
}

pub(crate) fn parse_blame(body: &Value) -> Result<Vec<BlameRange>, GitError> {
    let ranges = body
        .pointer("/data/repository/object/blame/ranges")
        .and_then(|r| r.as_array())
        .ok_or_else(|| GitError::NotFound("blame for the given path and ref".to_string()))?;

    Ok(ranges
        .iter()
        .map(|r| BlameRange {
            line_start: r.get("startingLine").and_then(|v| v.as_u64()).unwrap_or_default() as u32,
            line_end: r.get("endingLine").and_then(|v| v.as_u64()).unwrap_or_default() as u32,
            commit_id: str_at(r, "/commit/oid"),
            date: str_at(r, "/commit/committedDate"),
            author_name: str_at(r, "/commit/author/name"),
            author_email: str_at(r, "/commit/author/email"),
            message_headline: str_at(r, "/commit/messageHeadline"),
        })
        .collect())
}

pub(crate) fn parse_log(body: &Value) -> Result<Vec<CommitSummary>, GitError> {
    let edges = body
        .pointer("/data/repository/ref/target/history/edges")
        .and_then(|e| e.as_array())
        .ok_or_else(|| GitError::NotFound("history for the given path and branch".to_string()))?;

    Ok(edges
        .iter()
        .map(|e| CommitSummary {
            commit_id: str_at(e, "/node/oid"),
            message_headline: str_at(e, "/node/messageHeadline"),
            date: str_at(e, "/node/committedDate"),
            author_name: str_at(e, "/node/author/name"),
            author_email: str_at(e, "/node/author/email"),
        })
        .collect())
}

#[async_trait]
impl GitHistory for GitHubGraphQl {
    async fn blame(&self, path: &str, owner: &str, repo: &str, reference: &str) -> Result<Vec<BlameRange>, GitError> {
        let body = self
            .query(
                "git_blame",
                BLAME_QUERY,
                json!({ "owner": owner, "repo": repo, "ref": reference, "path": path }),
            )
            .await?;
        parse_blame(&body)
    }

    async fn log(
        &self,
        path: &str,
        owner: &str,
        repo: &str,
        branch: &str,
        limit: u32,
    ) -> Result<Vec<CommitSummary>, GitError> {
        let body = self
            .query(
                "git_log",
                LOG_QUERY,
                json!({ "owner": owner, "repo": repo, "branch": branch, "first": limit, "path": path }),
            )
            .await?;
        parse_log(&body)
    }
}

/// Default owner/repo/branch for git tools
#[derive(Debug, Clone)]
pub struct RepoDefaults {
    pub owner: String,
    pub repo: String,
    pub branch: String,
}

impl RepoDefaults {
    /// Parse `owner/name`; anything else falls back to using the whole string as the repo
    pub fn from_slug(slug: &str, branch: &str) -> Self {
        let (owner, repo) = slug.split_once('/').unwrap_or(("", slug));
        Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
            branch: branch.to_string(),
        }
    }
}

fn render<T: Serialize>(items: &[T]) -> String {
    serde_json::to_string_pretty(items).unwrap_or_else(|_| "[]".to_string())
}

/// The `git_blame` tool
pub struct GitBlameTool {
    backend: Arc<dyn GitHistory>,
    defaults: RepoDefaults,
}

impl GitBlameTool {
    pub fn new(backend: Arc<dyn GitHistory>, defaults: RepoDefaults) -> Self {
        Self { backend, defaults }
    }
}

#[async_trait]
impl Tool for GitBlameTool {
    fn name(&self) -> &str {
        "git_blame"
    }

    fn description(&self) -> &str {
        "Return blame information for a file on GitHub: ranges of lines and the commit (author, date, headline) that last touched them"
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![
            ParamSpec::required("path", ParamType::String, "Path to file (e.g. 'README.md')"),
            ParamSpec::optional("owner", ParamType::String, "Repository owner", json!(self.defaults.owner)),
            ParamSpec::optional("repo", ParamType::String, "Repository name", json!(self.defaults.repo)),
            ParamSpec::optional("ref", ParamType::String, "Branch, tag or commit", json!(self.defaults.branch)),
        ]
    }

    async fn invoke(&self, args: ToolArgs) -> Result<String, ToolError> {
        let path = args.require_str(self.name(), "path")?;
        let ranges = self
            .backend
            .blame(
                path,
                args.str_or("owner", &self.defaults.owner),
                args.str_or("repo", &self.defaults.repo),
                args.str_or("ref", &self.defaults.branch),
            )
            .await
            .map_err(|e| ToolError::execution(self.name(), e.to_string()))?;
        Ok(render(&ranges))
    }
}

/// The `git_log` tool
pub struct GitLogTool {
    backend: Arc<dyn GitHistory>,
    defaults: RepoDefaults,
}

impl GitLogTool {
    pub fn new(backend: Arc<dyn GitHistory>, defaults: RepoDefaults) -> Self {
        Self { backend, defaults }
    }
}

#[async_trait]
impl Tool for GitLogTool {
    fn name(&self) -> &str {
        "git_log"
    }

    fn description(&self) -> &str {
        "Return commit history for a file path. Parameter: path (required) - Path to the file to get commit history for."
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![
            ParamSpec::required("path", ParamType::String, "Path to the file to get commit history for"),
            ParamSpec::optional("owner", ParamType::String, "Repository owner", json!(self.defaults.owner)),
            ParamSpec::optional("repo", ParamType::String, "Repository name", json!(self.defaults.repo)),
            ParamSpec::optional("branch", ParamType::String, "Branch name", json!(self.defaults.branch)),
            ParamSpec::optional("first", ParamType::Integer, "Number of commits to return", json!(30)),
        ]
    }

    async fn invoke(&self, args: ToolArgs) -> Result<String, ToolError> {
        let path = args.require_str(self.name(), "path")?;
        let commits = self
            .backend
            .log(
                path,
                args.str_or("owner", &self.defaults.owner),
                args.str_or("repo", &self.defaults.repo),
                args.str_or("branch", &self.defaults.branch),
                args.u32_or("first", 30),
            )
            .await
            .map_err(|e| ToolError::execution(self.name(), e.to_string()))?;
        Ok(render(&commits))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_blame() {
        let body = json!({
            "data": { "repository": { "object": { "blame": { "ranges": [
                {
                    "startingLine": 40, "endingLine": 45,
                    "commit": {
                        "oid": "abc123", "committedDate": "2024-05-01T10:00:00Z",
                        "messageHeadline": "Fix null handling",
                        "author": { "name": "Alice", "email": "alice@example.com" }
                    }
                }
            ] } } } }
        });
        let ranges = parse_blame(&body).unwrap();
        assert_eq!(ranges.len(), 1);
        assert_eq!(ranges[0].line_start, 40);
        assert_eq!(ranges[0].author_name, "Alice");
        assert_eq!(ranges[0].message_headline, "Fix null handling");
    }

    #[test]
    fn test_parse_log_missing_ref() {
        let body = json!({ "data": { "repository": { "ref": null } } });
        assert!(matches!(parse_log(&body), Err(GitError::NotFound(_))));
    }

    #[test]
    fn test_repo_defaults_from_slug() {
        let d = RepoDefaults::from_slug("JetBrains/compose-multiplatform", "master");
        assert_eq!(d.owner, "JetBrains");
        assert_eq!(d.repo, "compose-multiplatform");
    }

    #[tokio::test]
    async fn test_blank_token_fails_before_io() {
        let git = GitHubGraphQl::new("").with_endpoint("http://127.0.0.1:9/graphql");
        let err = git.blame("a.kt", "o", "r", "master").await.unwrap_err();
        assert_eq!(err, GitError::MissingCredential);
    }

    #[test]
    fn test_negative_commit_count_rejected() {
        let git = Arc::new(GitHubGraphQl::new(""));
        let tool = GitLogTool::new(git, RepoDefaults::from_slug("o/r", "main"));
        let spec = tool.spec();

        let err = spec.validate(&json!({"path": "a.kt", "first": -5})).unwrap_err();
        assert!(matches!(err, ToolError::Validation { ref tool, .. } if tool == "git_log"));

        let args = spec.validate(&json!({"path": "a.kt", "first": 7})).unwrap();
        assert_eq!(args.u32_or("first", 30), 7);
    }
}

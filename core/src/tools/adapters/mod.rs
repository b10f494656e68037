//! Tools backed by external services. Each service sits behind a trait so the
//! session never depends on a concrete transport.

use std::time::Duration;

pub mod code_search;
pub mod git;
pub mod issues;

pub use code_search::{CodeHit, CodeSearch, HttpCodeSearch, SearchError, SearchTool};
pub use git::{BlameRange, CommitSummary, GitBlameTool, GitError, GitHistory, GitHubGraphQl, GitLogTool, RepoDefaults};
pub use issues::{IssueDetailsTool, IssueRecord, IssueSummary, IssueTracker, IssueTrackerError, SearchIssuesTool, YouTrackClient};

/// Per-request ceiling for adapter HTTP calls
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

pub(crate) fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!("failed to build HTTP client with timeout: {}", e);
            reqwest::Client::new()
        })
}

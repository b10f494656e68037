#![allow(dead_code)]

use async_trait::async_trait;
use dispatch_core::events::{EventBus, LogEvent, LogStream};
use dispatch_core::tools::adapters::{
    BlameRange, CodeHit, CodeSearch, CommitSummary, GitError, GitHistory, IssueRecord, IssueSummary, IssueTracker,
    IssueTrackerError, SearchError,
};
use dispatch_core::Backends;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Code search returning a fixed hit list
#[derive(Default)]
pub struct StubSearch {
    pub hits: Vec<CodeHit>,
    pub queries: Mutex<Vec<String>>,
}

impl StubSearch {
    pub fn with_hit(path: &str) -> Self {
        Self {
            hits: vec![CodeHit {
                path: path.to_string(),
                start_offset: 1200,
                end_offset: 1650,
                similarity: 0.87,
            }],
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl CodeSearch for StubSearch {
    async fn search(
        &self,
        query: &str,
        _repository: &str,
        max_results: usize,
        _min_score: f64,
    ) -> Result<Vec<CodeHit>, SearchError> {
        self.queries.lock().unwrap().push(query.to_string());
        Ok(self.hits.iter().take(max_results).cloned().collect())
    }
}

/// Git history where every line was last touched by one author
pub struct StubGit {
    pub author: String,
    pub delay: Duration,
    pub fail: bool,
    calls: AtomicUsize,
    pub blamed: Mutex<Vec<(String, String, String, String)>>,
}

impl StubGit {
    pub fn blaming(author: &str) -> Self {
        Self {
            author: author.to_string(),
            delay: Duration::ZERO,
            fail: false,
            calls: AtomicUsize::new(0),
            blamed: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::blaming("nobody")
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::blaming("slowpoke")
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GitHistory for StubGit {
    async fn blame(&self, path: &str, owner: &str, repo: &str, reference: &str) -> Result<Vec<BlameRange>, GitError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.blamed
            .lock()
            .unwrap()
            .push((path.to_string(), owner.to_string(), repo.to_string(), reference.to_string()));
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail {
            return Err(GitError::Http {
                operation: "git_blame",
                status: 502,
            });
        }
        Ok(vec![BlameRange {
            line_start: 40,
            line_end: 45,
            commit_id: "abc123".to_string(),
            date: "2024-05-01T10:00:00Z".to_string(),
            author_name: self.author.clone(),
            author_email: format!("{}@example.com", self.author),
            message_headline: "Handle missing payment method".to_string(),
        }])
    }

    async fn log(
        &self,
        _path: &str,
        _owner: &str,
        _repo: &str,
        _branch: &str,
        limit: u32,
    ) -> Result<Vec<CommitSummary>, GitError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let commit = CommitSummary {
            commit_id: "abc123".to_string(),
            message_headline: "Handle missing payment method".to_string(),
            date: "2024-05-01T10:00:00Z".to_string(),
            author_name: self.author.clone(),
            author_email: format!("{}@example.com", self.author),
        };
        Ok(std::iter::repeat(commit).take(limit.min(3) as usize).collect())
    }
}

/// Tracker that knows a single issue
pub struct StubIssues {
    pub issue: IssueRecord,
}

impl StubIssues {
    pub fn with_issue(id: &str, summary: &str, description: &str) -> Self {
        Self {
            issue: IssueRecord {
                id: "2-1".to_string(),
                id_readable: id.to_string(),
                summary: summary.to_string(),
                description: Some(description.to_string()),
                fields: serde_json::Map::new(),
            },
        }
    }
}

#[async_trait]
impl IssueTracker for StubIssues {
    async fn issue(&self, issue_id: &str, _fields: &str) -> Result<IssueRecord, IssueTrackerError> {
        if issue_id == self.issue.id_readable {
            Ok(self.issue.clone())
        } else {
            Err(IssueTrackerError::Http {
                operation: "get_issue_details",
                status: 404,
            })
        }
    }

    async fn search(
        &self,
        _query: &str,
        _fields: &str,
        _limit: u32,
        _offset: u32,
    ) -> Result<Vec<IssueSummary>, IssueTrackerError> {
        Ok(vec![IssueSummary {
            id: self.issue.id.clone(),
            id_readable: self.issue.id_readable.clone(),
            summary: self.issue.summary.clone(),
            custom_fields: Vec::new(),
        }])
    }
}

pub fn backends(search: Arc<StubSearch>, git: Arc<StubGit>) -> Backends {
    Backends {
        code_search: search,
        git,
        issues: Arc::new(StubIssues::with_issue("PAY-42", "NPE in PaymentProcessor", "line 42 throws")),
    }
}

pub fn setup_event_bus() -> (EventBus, LogStream) {
    let bus = EventBus::new();
    let stream = bus.subscribe();
    (bus, stream)
}

/// Drain everything already delivered to a stream
pub fn collect_events(stream: &mut LogStream) -> Vec<LogEvent> {
    let mut events = Vec::new();
    while let Some(event) = stream.try_recv() {
        events.push(event);
    }
    events
}

/// `(type, toolName)` pairs in delivery order
pub fn summarize(events: &[LogEvent]) -> Vec<(&'static str, String)> {
    events.iter().map(|e| (e.kind(), e.tool().to_string())).collect()
}

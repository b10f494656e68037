use crate::tools::types::{ParamSpec, ParamType, Tool, ToolArgs, ToolError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt::Write as _;
use std::sync::Arc;
use thiserror::Error;

/// Similarity floor passed to the search backend
pub const DEFAULT_MIN_SCORE: f64 = 0.2;

/// One code block matching a query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeHit {
    pub path: String,
    pub start_offset: u64,
    pub end_offset: u64,
    pub similarity: f64,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SearchError {
    #[error("code search token is empty or blank")]
    MissingCredential,

    #[error("code search failed: HTTP {0}")]
    Http(u16),

    #[error("code search request error: {0}")]
    Transport(String),

    #[error("code search decode error: {0}")]
    Decode(String),
}

/// Semantic code search over an indexed repository
#[async_trait]
pub trait CodeSearch: Send + Sync {
    /// Hits ordered by descending similarity
    async fn search(
        &self,
        query: &str,
        repository: &str,
        max_results: usize,
        min_score: f64,
    ) -> Result<Vec<CodeHit>, SearchError>;
}

/// HTTP client for a code-block search index
pub struct HttpCodeSearch {
    client: reqwest::Client,
    url: String,
    token: String,
}

impl HttpCodeSearch {
    pub fn new(url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client: super::http_client(super::DEFAULT_HTTP_TIMEOUT),
            url: url.into(),
            token: token.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    res: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchItem {
    source_position: SourcePosition,
    scored_text: ScoredText,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SourcePosition {
    relative_path: String,
    start_offset: u64,
    end_offset: u64,
}

#[derive(Debug, Deserialize)]
struct ScoredText {
    similarity: f64,
}

#[async_trait]
impl CodeSearch for HttpCodeSearch {
    async fn search(
        &self,
        query: &str,
        repository: &str,
        max_results: usize,
        min_score: f64,
    ) -> Result<Vec<CodeHit>, SearchError> {
        if self.token.trim().is_empty() {
            return Err(SearchError::MissingCredential);
        }

        let resp = self
            .client
            .post(&self.url)
            .bearer_auth(&self.token)
            .json(&json!({
                "indexAlias": "code-blocks",
                "text": query,
                "repository": repository,
                "maxResults": max_results,
                "minScore": min_score,
            }))
            .send()
            .await
            .map_err(|e| SearchError::Transport(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(SearchError::Http(resp.status().as_u16()));
        }

        let parsed: SearchResponse = resp.json().await.map_err(|e| SearchError::Decode(e.to_string()))?;
        Ok(parsed
            .res
            .into_iter()
            .map(|item| CodeHit {
                path: item.source_position.relative_path,
                start_offset: item.source_position.start_offset,
                end_offset: item.source_position.end_offset,
                similarity: item.scored_text.similarity,
            })
            .collect())
    }
}

/// The `search` tool: finds files related to a text query
pub struct SearchTool {
    backend: Arc<dyn CodeSearch>,
    default_repository: String,
}

impl SearchTool {
    pub fn new(backend: Arc<dyn CodeSearch>, default_repository: impl Into<String>) -> Self {
        Self {
            backend,
            default_repository: default_repository.into(),
        }
    }

    /// Numbered listing of hits, positions only
    pub fn render(query: &str, hits: &[CodeHit]) -> String {
        if hits.is_empty() {
            return format!("No results found for query: {}", query);
        }
        let mut out = String::new();
        for (i, hit) in hits.iter().enumerate() {
            let _ = writeln!(
                out,
                "{}. File={}, offset={}:{}, similarity={}\n",
                i + 1,
                hit.path,
                hit.start_offset,
                hit.end_offset,
                hit.similarity
            );
        }
        out
    }
}

#[async_trait]
impl Tool for SearchTool {
    fn name(&self) -> &str {
        "search"
    }

    fn description(&self) -> &str {
        "Searches for code snippets related to the query in the specified repository"
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![
            ParamSpec::required("text", ParamType::String, "Text, error message or identifiers to search for"),
            ParamSpec::optional(
                "repository",
                ParamType::String,
                "Repository in owner/name form",
                json!(self.default_repository),
            ),
            ParamSpec::optional("maxResults", ParamType::Integer, "Maximum number of results", json!(5)),
        ]
    }

    async fn invoke(&self, args: ToolArgs) -> Result<String, ToolError> {
        let text = args.require_str(self.name(), "text")?;
        let repository = args.str_or("repository", &self.default_repository);
        let max_results = args.u32_or("maxResults", 5) as usize;

        let hits = self
            .backend
            .search(text, repository, max_results, DEFAULT_MIN_SCORE)
            .await
            .map_err(|e| ToolError::execution(self.name(), e.to_string()))?;
        Ok(Self::render(text, &hits))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_hits() {
        let hits = vec![CodeHit {
            path: "src/PaymentProcessor.java".into(),
            start_offset: 10,
            end_offset: 80,
            similarity: 0.91,
        }];
        let out = SearchTool::render("npe", &hits);
        assert!(out.starts_with("1. File=src/PaymentProcessor.java, offset=10:80, similarity=0.91"));
        assert_eq!(SearchTool::render("npe", &[]), "No results found for query: npe");
    }

    #[tokio::test]
    async fn test_blank_token_fails_before_io() {
        let search = HttpCodeSearch::new("http://127.0.0.1:9/search", "   ");
        let err = search.search("x", "a/b", 5, DEFAULT_MIN_SCORE).await.unwrap_err();
        assert_eq!(err, SearchError::MissingCredential);
    }

    #[test]
    fn test_decode_search_response() {
        let raw = json!({
            "res": [{
                "sourcePosition": { "relativePath": "a/B.kt", "startOffset": 1, "endOffset": 2 },
                "scoredText": { "similarity": 0.5, "text": "ignored" }
            }]
        });
        let parsed: SearchResponse = serde_json::from_value(raw).unwrap();
        assert_eq!(parsed.res[0].source_position.relative_path, "a/B.kt");
    }
}

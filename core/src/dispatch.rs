use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use thiserror::Error;

/// A ticket to dispatch, as `{"description": "..."}` on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchRequest {
    pub description: String,
}

impl DispatchRequest {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
        }
    }

    /// Accept either a JSON request body or the bare ticket text
    pub fn from_input(input: &str) -> Self {
        let trimmed = input.trim();
        match serde_json::from_str::<Self>(trimmed) {
            Ok(request) => Self::new(request.description.trim()),
            Err(_) => Self::new(trimmed),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignee {
    pub login: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub reason: String,
}

/// Recommendation for a ticket; assignees are ordered best fit first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchResult {
    pub summary: String,
    #[serde(default)]
    pub assignees: Vec<Assignee>,
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("model output is not a dispatch result: {0}")]
pub struct OutputParseError(pub String);

fn fenced_block() -> Option<&'static Regex> {
    static FENCE: OnceLock<Option<Regex>> = OnceLock::new();
    FENCE
        .get_or_init(|| Regex::new(r"(?s)```(?:json)?\s*(\{.*?\})\s*```").ok())
        .as_ref()
}

impl DispatchResult {
    /// Wrap free text when the model did not produce the structure
    pub fn raw(text: impl Into<String>) -> Self {
        Self {
            summary: text.into(),
            assignees: Vec::new(),
        }
    }

    pub fn best_fit(&self) -> Option<&Assignee> {
        self.assignees.first()
    }

    pub fn encode(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }

    /// Strict decode of model output.
    ///
    /// Accepts bare JSON, a fenced ```json block, or the outermost `{...}`
    /// embedded in prose.
    pub fn parse(text: &str) -> Result<Self, OutputParseError> {
        let trimmed = text.trim();
        if let Ok(result) = serde_json::from_str::<Self>(trimmed) {
            return Ok(result);
        }

        if let Some(fence) = fenced_block() {
            for caps in fence.captures_iter(trimmed) {
                if let Some(body) = caps.get(1) {
                    if let Ok(result) = serde_json::from_str::<Self>(body.as_str()) {
                        return Ok(result);
                    }
                }
            }
        }

        if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
            if start < end {
                if let Ok(result) = serde_json::from_str::<Self>(&trimmed[start..=end]) {
                    return Ok(result);
                }
            }
        }

        let preview: String = trimmed.chars().take(80).collect();
        Err(OutputParseError(preview))
    }

    /// Lenient decode: falls back to `{summary: text, assignees: []}`
    pub fn from_model_output(text: &str) -> Self {
        match Self::parse(text) {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!("{}; returning raw text", e);
                Self::raw(text)
            }
        }
    }
}

use crate::tools::ToolSpec;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub mod chat_completions;
pub mod mock;

pub use chat_completions::ChatCompletionsClient;
pub use mock::ScriptedModel;

/// The language model behind a session. One call per loop turn.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Send the transcript and tool list, get back a tool call or a final answer
    async fn complete(&self, request: ModelRequest<'_>) -> Result<ModelResponse, AgentError>;

    /// Get model information
    fn info(&self) -> ModelInfo;
}

/// Everything the model sees on one turn
#[derive(Debug, Clone, Copy)]
pub struct ModelRequest<'a> {
    pub messages: &'a [Message],
    pub tools: &'a [ToolSpec],
}

/// What the model decided to do
#[derive(Debug, Clone, PartialEq)]
pub enum ModelResponse {
    ToolCall(ToolCallRequest),
    Final(String),
}

#[derive(Debug, Clone)]
pub struct ModelInfo {
    pub name: String,
    pub model: String,
}

/// Who sent the message
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }
}

/// A tool invocation proposed by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    pub args: Value,
}

impl ToolCallRequest {
    pub fn new(name: impl Into<String>, args: Value) -> Self {
        Self {
            id: format!("call_{}", uuid::Uuid::new_v4().simple()),
            name: name.into(),
            args,
        }
    }
}

/// A single entry of a session transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call: Option<ToolCallRequest>,
    /// For tool messages, the id of the call being answered
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self::plain(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::plain(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::plain(Role::Assistant, content)
    }

    pub fn assistant_tool_call(call: ToolCallRequest) -> Self {
        Self {
            role: Role::Assistant,
            content: String::new(),
            tool_call: Some(call),
            tool_call_id: None,
        }
    }

    pub fn tool_result(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            tool_call: None,
            tool_call_id: Some(call_id.into()),
        }
    }

    fn plain(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_call: None,
            tool_call_id: None,
        }
    }
}

/// Errors that end a session
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AgentError {
    #[error("Model transport error: {0}")]
    ModelTransport(String),

    #[error("Iteration limit of {limit} exceeded")]
    IterationLimitExceeded { limit: usize },

    #[error("Session cancelled")]
    Cancelled,

    #[error("Agent configuration error: {0}")]
    Configuration(String),
}

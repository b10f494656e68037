//! Model client for OpenAI-compatible chat completion gateways.
//!
//! Only one tool call is taken per turn; parallel tool calls are disabled in
//! the request and any extra calls in a response are ignored.

use crate::agent::{AgentError, Message, ModelClient, ModelInfo, ModelRequest, ModelResponse, Role, ToolCallRequest};
use crate::tools::ToolSpec;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

pub const DEFAULT_CHAT_COMPLETIONS_URL: &str = "https://api.openai.com/v1/chat/completions";

pub struct ChatCompletionsClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl ChatCompletionsClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self, AgentError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(AgentError::Configuration("model gateway token is missing".to_string()));
        }
        Ok(Self {
            client: reqwest::Client::new(),
            base_url: DEFAULT_CHAT_COMPLETIONS_URL.to_string(),
            api_key,
            model: model.into(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn tool_specs_for_openai(&self, tools: &[ToolSpec]) -> Vec<Value> {
        tools
            .iter()
            .map(|spec| {
                json!({
                    "type": "function",
                    "function": {
                        "name": spec.name,
                        "description": spec.description,
                        "parameters": spec.input_schema(),
                    }
                })
            })
            .collect()
    }

    fn convert_messages(&self, messages: &[Message]) -> Vec<Value> {
        messages
            .iter()
            .map(|m| match (&m.role, &m.tool_call, &m.tool_call_id) {
                (Role::Assistant, Some(call), _) => json!({
                    "role": "assistant",
                    "content": Value::Null,
                    "tool_calls": [{
                        "id": call.id,
                        "type": "function",
                        "function": {
                            "name": call.name,
                            "arguments": call.args.to_string(),
                        }
                    }]
                }),
                (Role::Tool, _, Some(id)) => json!({
                    "role": "tool",
                    "tool_call_id": id,
                    "content": m.content,
                }),
                (role, _, _) => json!({ "role": role.as_str(), "content": m.content }),
            })
            .collect()
    }

    async fn http_post(&self, body: &Value) -> Result<ChatCompletionResponse, AgentError> {
        let resp = self
            .client
            .post(&self.base_url)
            .bearer_auth(&self.api_key)
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| AgentError::ModelTransport(format!("request error: {}", e)))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(AgentError::ModelTransport(format!("{}: {}", status, text)));
        }

        resp.json()
            .await
            .map_err(|e| AgentError::ModelTransport(format!("decode error: {}", e)))
    }
}

#[async_trait]
impl ModelClient for ChatCompletionsClient {
    async fn complete(&self, request: ModelRequest<'_>) -> Result<ModelResponse, AgentError> {
        let mut body = json!({
            "model": self.model,
            "messages": self.convert_messages(request.messages),
        });
        if !request.tools.is_empty() {
            body["tools"] = Value::Array(self.tool_specs_for_openai(request.tools));
            body["tool_choice"] = json!("auto");
            body["parallel_tool_calls"] = json!(false);
        }

        let resp = self.http_post(&body).await?;
        if let Some(usage) = &resp.usage {
            debug!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "model turn complete"
            );
        }

        let Some(message) = resp.choices.into_iter().next().and_then(|c| c.message) else {
            return Err(AgentError::ModelTransport("no choices in response".to_string()));
        };

        if let Some(mut calls) = message.tool_calls.filter(|c| !c.is_empty()) {
            if calls.len() > 1 {
                warn!(count = calls.len(), "model proposed several tool calls, keeping the first");
            }
            let call = calls.remove(0);
            // malformed argument JSON is passed through as a string so schema validation rejects it
            let args = serde_json::from_str(&call.function.arguments)
                .unwrap_or(Value::String(call.function.arguments));
            return Ok(ModelResponse::ToolCall(ToolCallRequest {
                id: call.id,
                name: call.function.name,
                args,
            }));
        }

        Ok(ModelResponse::Final(message.content.unwrap_or_default()))
    }

    fn info(&self) -> ModelInfo {
        ModelInfo {
            name: "chat-completions".to_string(),
            model: self.model.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    usage: Option<TokenUsageResponse>,
    choices: Vec<Choice>,
}

#[derive(Debug, Clone, Deserialize)]
struct TokenUsageResponse {
    prompt_tokens: i64,
    completion_tokens: i64,
}

#[derive(Debug, Clone, Deserialize)]
struct Choice {
    #[serde(default)]
    message: Option<ResponseMessage>,
}

#[derive(Debug, Clone, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCall>>,
}

#[derive(Debug, Clone, Deserialize)]
struct ToolCall {
    id: String,
    function: FunctionCall,
}

#[derive(Debug, Clone, Deserialize)]
struct FunctionCall {
    name: String,
    arguments: String,
}

use super::{AgentError, Message, ModelClient, ModelInfo, ModelRequest, ModelResponse, ToolCallRequest};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

/// A request as seen by the scripted model
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub messages: Vec<Message>,
    pub tool_names: Vec<String>,
}

/// Deterministic model that replays a script of responses.
///
/// Once the script runs out the fallback response (if any) is repeated,
/// otherwise the call fails as a transport error.
pub struct ScriptedModel {
    script: Mutex<VecDeque<Result<ModelResponse, AgentError>>>,
    fallback: Option<ModelResponse>,
    delay: Duration,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: None,
            delay: Duration::ZERO,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Answers immediately with `text`
    pub fn answering(text: impl Into<String>) -> Self {
        Self::new().then_answer(text)
    }

    /// Proposes the same tool call forever
    pub fn always_calling(name: &str, args: Value) -> Self {
        Self::new().with_fallback(ModelResponse::ToolCall(ToolCallRequest::new(name, args)))
    }

    pub fn then_call(self, name: &str, args: Value) -> Self {
        self.then(Ok(ModelResponse::ToolCall(ToolCallRequest::new(name, args))))
    }

    pub fn then_answer(self, text: impl Into<String>) -> Self {
        self.then(Ok(ModelResponse::Final(text.into())))
    }

    pub fn then_fail(self, error: AgentError) -> Self {
        self.then(Err(error))
    }

    pub fn then(self, step: Result<ModelResponse, AgentError>) -> Self {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(step);
        }
        self
    }

    pub fn with_fallback(mut self, response: ModelResponse) -> Self {
        self.fallback = Some(response);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl Default for ScriptedModel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    async fn complete(&self, request: ModelRequest<'_>) -> Result<ModelResponse, AgentError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(RecordedRequest {
                messages: request.messages.to_vec(),
                tool_names: request.tools.iter().map(|t| t.name.clone()).collect(),
            });
        }

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let next = self.script.lock().ok().and_then(|mut s| s.pop_front());
        match next {
            Some(step) => step,
            None => match &self.fallback {
                Some(ModelResponse::ToolCall(call)) => {
                    Ok(ModelResponse::ToolCall(ToolCallRequest::new(call.name.clone(), call.args.clone())))
                }
                Some(response) => Ok(response.clone()),
                None => Err(AgentError::ModelTransport("script exhausted".to_string())),
            },
        }
    }

    fn info(&self) -> ModelInfo {
        ModelInfo {
            name: "Scripted Model".to_string(),
            model: "scripted".to_string(),
        }
    }
}

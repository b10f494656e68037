use crate::agent::{AgentError, Message, ModelClient, ModelRequest, ModelResponse};
use crate::events::EventSender;
use crate::tools::{ToolError, ToolExecutor, ToolRegistry};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Default ceiling on model turns per session
pub const DEFAULT_MAX_ITERATIONS: usize = 100;

/// Default timeout for a single model call
pub const DEFAULT_MODEL_TIMEOUT: Duration = Duration::from_secs(120);

/// Limits applied to one session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub max_iterations: usize,
    pub model_timeout: Duration,
    pub tool_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            model_timeout: DEFAULT_MODEL_TIMEOUT,
            tool_timeout: crate::tools::executor::DEFAULT_TOOL_TIMEOUT,
        }
    }
}

/// Where the loop currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    AwaitingModel,
    ExecutingTool,
    Done,
    Failed,
}

/// One bounded run of the model/tool loop.
///
/// The transcript starts as `[system, user]` and only grows. Each model turn
/// either finishes the run or proposes exactly one tool call, whose result
/// (or error) is appended before the model is asked again.
pub struct AgentSession {
    id: String,
    model: Arc<dyn ModelClient>,
    tools: Arc<ToolRegistry>,
    system_prompt: String,
    config: SessionConfig,
    executor: ToolExecutor,
    cancel: CancellationToken,
    transcript: Vec<Message>,
    state: SessionState,
    iterations: usize,
    tool_invocations: usize,
}

impl AgentSession {
    pub fn new(model: Arc<dyn ModelClient>, tools: Arc<ToolRegistry>, system_prompt: impl Into<String>) -> Self {
        let config = SessionConfig::default();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            model,
            tools,
            system_prompt: system_prompt.into(),
            executor: ToolExecutor::new().with_timeout(config.tool_timeout),
            config,
            cancel: CancellationToken::new(),
            transcript: Vec::new(),
            state: SessionState::AwaitingModel,
            iterations: 0,
            tool_invocations: 0,
        }
    }

    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.executor = self.executor.with_timeout(config.tool_timeout);
        self.config = config;
        self
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.config.max_iterations = max;
        self
    }

    pub fn with_event_sender(mut self, event_sender: EventSender) -> Self {
        self.executor = self.executor.with_event_sender(event_sender);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn transcript(&self) -> &[Message] {
        &self.transcript
    }

    /// Model turns taken so far
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Tool calls that actually reached a tool (validation rejects excluded)
    pub fn tool_invocations(&self) -> usize {
        self.tool_invocations
    }

    /// Run the loop to completion and return the model's final answer.
    pub async fn run(&mut self, input: &str) -> Result<String, AgentError> {
        self.transcript = vec![Message::system(self.system_prompt.clone()), Message::user(input)];
        self.state = SessionState::AwaitingModel;
        self.iterations = 0;
        self.tool_invocations = 0;

        let specs = self.tools.get_all_specs();
        info!(
            session = %self.id,
            model = %self.model.info().model,
            tools = specs.len(),
            max_iterations = self.config.max_iterations,
            "session started"
        );

        loop {
            if self.iterations >= self.config.max_iterations {
                return Err(self.fail(AgentError::IterationLimitExceeded {
                    limit: self.config.max_iterations,
                }));
            }
            if self.cancel.is_cancelled() {
                return Err(self.fail(AgentError::Cancelled));
            }
            self.iterations += 1;
            debug!(session = %self.id, iteration = self.iterations, "awaiting model");

            let response = {
                let request = ModelRequest {
                    messages: &self.transcript,
                    tools: &specs,
                };
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => Err(AgentError::Cancelled),
                    result = tokio::time::timeout(self.config.model_timeout, self.model.complete(request)) => match result {
                        Ok(response) => response,
                        Err(_) => Err(AgentError::ModelTransport(format!(
                            "model call timed out after {}ms",
                            self.config.model_timeout.as_millis()
                        ))),
                    },
                }
            };

            let call = match response {
                Ok(ModelResponse::Final(text)) => {
                    self.transcript.push(Message::assistant(text.clone()));
                    self.state = SessionState::Done;
                    info!(
                        session = %self.id,
                        iterations = self.iterations,
                        tool_invocations = self.tool_invocations,
                        "session done"
                    );
                    return Ok(text);
                }
                Ok(ModelResponse::ToolCall(call)) => call,
                Err(e) => return Err(self.fail(e)),
            };

            self.state = SessionState::ExecutingTool;
            self.transcript.push(Message::assistant_tool_call(call.clone()));
            if self.cancel.is_cancelled() {
                return Err(self.fail(AgentError::Cancelled));
            }

            let outcome = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => None,
                result = self.executor.execute(&self.tools, &call.name, &call.args) => Some(result),
            };
            let Some(outcome) = outcome else {
                return Err(self.fail(AgentError::Cancelled));
            };

            let content = match outcome {
                Ok(output) => {
                    self.tool_invocations += 1;
                    output
                }
                Err(e) => {
                    if !e.is_validation() {
                        self.tool_invocations += 1;
                    }
                    self.describe_tool_error(&e)
                }
            };
            self.transcript.push(Message::tool_result(call.id, content));
            self.state = SessionState::AwaitingModel;
        }
    }

    /// Transcript text for a failed call, phrased so the model can recover
    fn describe_tool_error(&self, e: &ToolError) -> String {
        match e {
            ToolError::UnknownTool(_) if self.tools.is_empty() => {
                format!("Error: {}. No tools are available; answer directly.", e)
            }
            ToolError::UnknownTool(_) => {
                format!("Error: {}. Available tools: {}", e, self.tools.names().join(", "))
            }
            ToolError::Validation { .. } => {
                format!("Error: {}. Fix the arguments and try again.", e)
            }
            _ => format!("Error: {}", e),
        }
    }

    fn fail(&mut self, e: AgentError) -> AgentError {
        self.state = SessionState::Failed;
        error!(session = %self.id, iterations = self.iterations, "session failed: {}", e);
        e
    }
}

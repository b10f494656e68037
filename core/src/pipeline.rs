use crate::agent::{AgentError, ModelClient};
use crate::events::EventSender;
use crate::session::{AgentSession, SessionConfig};
use crate::tools::ToolRegistry;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// One step of a pipeline: a model, a prompt and the tools it may use
#[derive(Clone)]
pub struct Stage {
    pub name: String,
    pub system_prompt: String,
    pub tools: Arc<ToolRegistry>,
    pub model: Arc<dyn ModelClient>,
    pub config: SessionConfig,
}

impl Stage {
    pub fn new(
        name: impl Into<String>,
        model: Arc<dyn ModelClient>,
        tools: Arc<ToolRegistry>,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            system_prompt: system_prompt.into(),
            tools,
            model,
            config: SessionConfig::default(),
        }
    }

    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.config.max_iterations = max;
        self
    }

    fn session(&self) -> AgentSession {
        AgentSession::new(self.model.clone(), self.tools.clone(), self.system_prompt.clone())
            .with_config(self.config.clone())
    }
}

/// Stages run strictly in order; each stage's final answer is the next
/// stage's only input. The first failure stops the chain.
#[derive(Clone, Default)]
pub struct Pipeline {
    stages: Vec<Stage>,
    event_sender: Option<EventSender>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(mut self, stage: Stage) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn with_event_sender(mut self, event_sender: EventSender) -> Self {
        self.event_sender = Some(event_sender);
        self
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub async fn run(&self, input: &str) -> Result<String, AgentError> {
        self.run_with_cancel(input, CancellationToken::new()).await
    }

    pub async fn run_with_cancel(&self, input: &str, cancel: CancellationToken) -> Result<String, AgentError> {
        let mut current = input.to_string();
        for (i, stage) in self.stages.iter().enumerate() {
            info!(stage = %stage.name, index = i, "pipeline stage started");
            let mut session = stage.session().with_cancellation(cancel.clone());
            if let Some(sender) = &self.event_sender {
                session = session.with_event_sender(sender.clone());
            }

            current = match session.run(&current).await {
                Ok(output) => output,
                Err(e) => {
                    error!(stage = %stage.name, "pipeline stage failed: {}", e);
                    return Err(e);
                }
            };
        }
        Ok(current)
    }
}

use crate::agent::{AgentError, ChatCompletionsClient, ModelClient};
use crate::config::Config;
use crate::dispatch::DispatchResult;
use crate::events::{EventBus, LogStream};
use crate::pipeline::{Pipeline, Stage};
use crate::session::SessionConfig;
use crate::tools::adapters::{
    CodeSearch, GitBlameTool, GitHistory, GitHubGraphQl, GitLogTool, HttpCodeSearch, IssueDetailsTool,
    IssueTracker, RepoDefaults, SearchIssuesTool, SearchTool, YouTrackClient,
};
use crate::tools::{RegistryError, Tool, ToolRegistry};
use anyhow::Context;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub const ANALYZE_PROMPT: &str = include_str!("prompts/analyze.md");
pub const FORMAT_PROMPT: &str = include_str!("prompts/format.md");

/// External services the analysis tools talk to
#[derive(Clone)]
pub struct Backends {
    pub code_search: Arc<dyn CodeSearch>,
    pub git: Arc<dyn GitHistory>,
    pub issues: Arc<dyn IssueTracker>,
}

impl Backends {
    /// HTTP-backed services built from configuration
    pub fn from_config(config: &Config) -> Self {
        Self {
            code_search: Arc::new(HttpCodeSearch::new(&config.code_search_url, &config.code_search_token)),
            git: Arc::new(GitHubGraphQl::new(&config.github_token)),
            issues: Arc::new(YouTrackClient::new(&config.youtrack_url, &config.youtrack_token)),
        }
    }
}

/// Registry holding the five analysis tools
pub fn analysis_tools(backends: &Backends, config: &Config) -> Result<ToolRegistry, RegistryError> {
    let defaults = RepoDefaults::from_slug(&config.repository, &config.branch);
    let tools: Vec<Arc<dyn Tool>> = vec![
        Arc::new(SearchTool::new(backends.code_search.clone(), &config.repository)),
        Arc::new(GitBlameTool::new(backends.git.clone(), defaults.clone())),
        Arc::new(GitLogTool::new(backends.git.clone(), defaults)),
        Arc::new(IssueDetailsTool::new(backends.issues.clone())),
        Arc::new(SearchIssuesTool::new(backends.issues.clone())),
    ];
    ToolRegistry::from_tools(tools)
}

/// Recommends assignees for a ticket: an analysis stage that may call
/// tools, followed by a tool-less stage that formats the result as JSON.
pub struct TicketDispatcher {
    bus: EventBus,
    pipeline: Pipeline,
}

impl TicketDispatcher {
    /// Build against live services
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let model = ChatCompletionsClient::new(&config.model_token, &config.model)
            .context("failed to create model client")?
            .with_base_url(&config.model_url);
        let model: Arc<dyn ModelClient> = Arc::new(model);
        let dispatcher = Self::with_models(model.clone(), model, Backends::from_config(config), config)?;
        Ok(dispatcher)
    }

    /// One model shared by both stages
    pub fn new(model: Arc<dyn ModelClient>, backends: Backends, config: &Config) -> Result<Self, AgentError> {
        Self::with_models(model.clone(), model, backends, config)
    }

    pub fn with_models(
        analyze_model: Arc<dyn ModelClient>,
        format_model: Arc<dyn ModelClient>,
        backends: Backends,
        config: &Config,
    ) -> Result<Self, AgentError> {
        let tools = analysis_tools(&backends, config).map_err(|e| AgentError::Configuration(e.to_string()))?;
        let bus = EventBus::with_capacity(config.event_buffer);

        let analyze = Stage::new("analyze", analyze_model, Arc::new(tools), ANALYZE_PROMPT).with_config(SessionConfig {
            max_iterations: config.max_iterations,
            model_timeout: config.model_timeout,
            tool_timeout: config.tool_timeout,
        });
        let format = Stage::new("format", format_model, Arc::new(ToolRegistry::empty()), FORMAT_PROMPT).with_config(
            SessionConfig {
                max_iterations: config.format_max_iterations,
                model_timeout: config.model_timeout,
                tool_timeout: config.tool_timeout,
            },
        );

        let pipeline = Pipeline::new().stage(analyze).stage(format).with_event_sender(bus.sender());
        Ok(Self { bus, pipeline })
    }

    pub fn events(&self) -> &EventBus {
        &self.bus
    }

    /// Live tool-activity feed; only events published after this call are seen
    pub fn subscribe(&self) -> LogStream {
        self.bus.subscribe()
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub async fn dispatch(&self, description: &str) -> Result<DispatchResult, AgentError> {
        self.dispatch_with_cancel(description, CancellationToken::new()).await
    }

    pub async fn dispatch_with_cancel(
        &self,
        description: &str,
        cancel: CancellationToken,
    ) -> Result<DispatchResult, AgentError> {
        let raw = self.dispatch_raw_with_cancel(description, cancel).await?;
        Ok(DispatchResult::from_model_output(&raw))
    }

    /// Final stage output without parsing
    pub async fn dispatch_raw(&self, description: &str) -> Result<String, AgentError> {
        self.dispatch_raw_with_cancel(description, CancellationToken::new()).await
    }

    pub async fn dispatch_raw_with_cancel(&self, description: &str, cancel: CancellationToken) -> Result<String, AgentError> {
        info!(chars = description.len(), "dispatching ticket");
        self.pipeline.run_with_cancel(description, cancel).await
    }
}

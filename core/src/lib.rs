pub mod agent;
pub mod config;
pub mod dispatch;
pub mod dispatcher;
pub mod events;
pub mod pipeline;
pub mod session;
pub mod tools;

// Re-export main types for convenience
pub use agent::{AgentError, ChatCompletionsClient, Message, ModelClient, ModelResponse, Role, ScriptedModel};
pub use config::{Config, ConfigError};
pub use dispatch::{Assignee, DispatchRequest, DispatchResult, OutputParseError};
pub use dispatcher::{Backends, TicketDispatcher};
pub use events::{EventBus, EventSender, LogEvent, LogStream};
pub use pipeline::{Pipeline, Stage};
pub use session::{AgentSession, SessionConfig, SessionState};
pub use tools::{Tool, ToolError, ToolExecutor, ToolRegistry};

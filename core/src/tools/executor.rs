use crate::events::{EventSender, LogEvent};
use crate::tools::registry::ToolRegistry;
use crate::tools::types::ToolError;
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Default per-call timeout
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(30);

/// Default cap on tool output kept in the transcript (256KB)
pub const DEFAULT_MAX_OUTPUT_SIZE: usize = 256 * 1024;

/// Runs single tool calls against a registry: timeout, output cap and
/// CALL/OK/ERROR events.
#[derive(Debug, Clone)]
pub struct ToolExecutor {
    event_sender: Option<EventSender>,
    timeout: Duration,
    max_output_size: usize,
}

impl ToolExecutor {
    pub fn new() -> Self {
        Self {
            event_sender: None,
            timeout: DEFAULT_TOOL_TIMEOUT,
            max_output_size: DEFAULT_MAX_OUTPUT_SIZE,
        }
    }

    pub fn with_event_sender(mut self, event_sender: EventSender) -> Self {
        self.event_sender = Some(event_sender);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_output_size(mut self, size: usize) -> Self {
        self.max_output_size = size;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn emit(&self, event: LogEvent) {
        if let Some(sender) = &self.event_sender {
            sender.send(event);
        }
    }

    /// Execute one tool call. Malformed calls never reach the tool.
    pub async fn execute(&self, registry: &ToolRegistry, name: &str, args: &Value) -> Result<String, ToolError> {
        let validated = match registry.validate_args(name, args) {
            Ok(validated) => validated,
            Err(e) => {
                warn!(tool = %name, "rejected tool call: {}", e);
                self.emit(LogEvent::validation_error(name, e.detail()));
                return Err(e);
            }
        };

        info!(tool = %name, args = %validated.to_json(), "tool called");
        self.emit(LogEvent::call(name, validated.to_json()));

        let start = Instant::now();
        let outcome = match registry.spawn(name, args) {
            Ok(mut handle) => match tokio::time::timeout(self.timeout, &mut handle).await {
                Ok(joined) => ToolRegistry::join(name, joined),
                Err(_) => {
                    // stop the adapter task
                    handle.abort();
                    Err(ToolError::Timeout {
                        tool: name.to_string(),
                        timeout_ms: self.timeout.as_millis() as u64,
                    })
                }
            },
            Err(e) => Err(e),
        };
        let duration_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(output) => {
                let output = self.truncate_output(output);
                debug!(tool = %name, duration_ms, bytes = output.len(), "tool completed");
                self.emit(LogEvent::result(name, output.clone()));
                Ok(output)
            }
            Err(e) => {
                warn!(tool = %name, duration_ms, "tool failed: {}", e);
                self.emit(LogEvent::error(name, e.detail()));
                Err(e)
            }
        }
    }

    fn truncate_output(&self, output: String) -> String {
        if output.len() <= self.max_output_size {
            return output;
        }
        let mut cut = self.max_output_size;
        while !output.is_char_boundary(cut) {
            cut -= 1;
        }
        format!(
            "{}\n\n[Output truncated: {} bytes total, showing first {} bytes]",
            &output[..cut],
            output.len(),
            cut
        )
    }
}

impl Default for ToolExecutor {
    fn default() -> Self {
        Self::new()
    }
}


// Test utilities
use crate::events::{EventBus, EventSender, LogEvent, LogStream};
use crate::tools::types::*;
use async_trait::async_trait;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Echoes `text`, repeated `times` times, and counts invocations
#[derive(Default)]
pub struct EchoTool {
    calls: AtomicUsize,
}

impl EchoTool {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Echo the input text"
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![
            ParamSpec::required("text", ParamType::String, "Text to echo"),
            ParamSpec::optional("times", ParamType::Integer, "Repetitions", json!(1)),
        ]
    }

    async fn invoke(&self, args: ToolArgs) -> Result<String, ToolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let text = args.require_str(self.name(), "text")?;
        Ok(text.repeat(args.u32_or("times", 1) as usize))
    }
}

/// Always fails with an execution error
pub struct FailingTool;

#[async_trait]
impl Tool for FailingTool {
    fn name(&self) -> &str {
        "broken"
    }

    fn description(&self) -> &str {
        "Always fails"
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        Vec::new()
    }

    async fn invoke(&self, _args: ToolArgs) -> Result<String, ToolError> {
        Err(ToolError::execution(self.name(), "backend unavailable"))
    }
}

pub struct PanickingTool;

#[async_trait]
impl Tool for PanickingTool {
    fn name(&self) -> &str {
        "panics"
    }

    fn description(&self) -> &str {
        "Panics when invoked"
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        Vec::new()
    }

    async fn invoke(&self, _args: ToolArgs) -> Result<String, ToolError> {
        panic!("adapter bug");
    }
}

/// Sleeps before answering
pub struct SlowTool(pub Duration);

#[async_trait]
impl Tool for SlowTool {
    fn name(&self) -> &str {
        "slow"
    }

    fn description(&self) -> &str {
        "Takes a while"
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        Vec::new()
    }

    async fn invoke(&self, _args: ToolArgs) -> Result<String, ToolError> {
        tokio::time::sleep(self.0).await;
        Ok("finally".to_string())
    }
}

/// Sleeps, then records that it finished
pub struct CountingSlowTool {
    pub delay: Duration,
    finished: AtomicUsize,
}

impl CountingSlowTool {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            finished: AtomicUsize::new(0),
        }
    }

    pub fn finished(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Tool for CountingSlowTool {
    fn name(&self) -> &str {
        "counting_slow"
    }

    fn description(&self) -> &str {
        "Sleeps and counts completions"
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        Vec::new()
    }

    async fn invoke(&self, _args: ToolArgs) -> Result<String, ToolError> {
        tokio::time::sleep(self.delay).await;
        self.finished.fetch_add(1, Ordering::SeqCst);
        Ok("done".to_string())
    }
}

/// Test helper to setup an event bus for testing
pub fn setup_event_bus() -> (EventBus, EventSender, LogStream) {
    let bus = EventBus::new();
    let sender = bus.sender();
    let stream = bus.subscribe();
    (bus, sender, stream)
}

/// Drain everything already delivered to a stream
pub fn collect_events(stream: &mut LogStream) -> Vec<LogEvent> {
    let mut events = Vec::new();
    while let Some(event) = stream.try_recv() {
        events.push(event);
    }
    events
}

pub fn kinds(events: &[LogEvent]) -> Vec<&'static str> {
    events.iter().map(|e| e.kind()).collect()
}

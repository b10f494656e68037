use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::Stream;
use tracing::debug;

/// Default per-subscriber buffer size
pub const DEFAULT_EVENT_CAPACITY: usize = 100;

/// Tool lifecycle events, encoded on the wire as `{type, toolName, timestamp, ...}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum LogEvent {
    #[serde(rename = "CALL")]
    Call {
        #[serde(rename = "toolName")]
        tool: String,
        timestamp: u64,
        args: String,
    },
    #[serde(rename = "OK")]
    Result {
        #[serde(rename = "toolName")]
        tool: String,
        timestamp: u64,
        result: String,
    },
    #[serde(rename = "ERROR")]
    Error {
        #[serde(rename = "toolName")]
        tool: String,
        timestamp: u64,
        error: String,
    },
}

impl LogEvent {
    pub fn call(tool: impl Into<String>, args: impl Into<String>) -> Self {
        LogEvent::Call {
            tool: tool.into(),
            timestamp: next_timestamp(),
            args: args.into(),
        }
    }

    pub fn result(tool: impl Into<String>, result: impl Into<String>) -> Self {
        LogEvent::Result {
            tool: tool.into(),
            timestamp: next_timestamp(),
            result: result.into(),
        }
    }

    pub fn error(tool: impl Into<String>, error: impl Into<String>) -> Self {
        LogEvent::Error {
            tool: tool.into(),
            timestamp: next_timestamp(),
            error: error.into(),
        }
    }

    /// Validation failures travel as ERROR events with a recognisable prefix
    pub fn validation_error(tool: impl Into<String>, detail: impl std::fmt::Display) -> Self {
        Self::error(tool, format!("Validation error: {}", detail))
    }

    pub fn tool(&self) -> &str {
        match self {
            LogEvent::Call { tool, .. } | LogEvent::Result { tool, .. } | LogEvent::Error { tool, .. } => tool,
        }
    }

    pub fn timestamp(&self) -> u64 {
        match self {
            LogEvent::Call { timestamp, .. }
            | LogEvent::Result { timestamp, .. }
            | LogEvent::Error { timestamp, .. } => *timestamp,
        }
    }

    /// Wire tag: CALL, OK or ERROR
    pub fn kind(&self) -> &'static str {
        match self {
            LogEvent::Call { .. } => "CALL",
            LogEvent::Result { .. } => "OK",
            LogEvent::Error { .. } => "ERROR",
        }
    }

    pub fn is_validation_error(&self) -> bool {
        matches!(self, LogEvent::Error { error, .. } if error.starts_with("Validation error"))
    }

    /// Encode as a single JSON line for the live log stream
    pub fn encode(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn decode(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

/// Epoch milliseconds, never going backwards within the process
fn next_timestamp() -> u64 {
    static LAST: AtomicU64 = AtomicU64::new(0);

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default();
    let prev = LAST.fetch_max(now, Ordering::Relaxed);
    prev.max(now)
}

struct BusInner {
    subscribers: Mutex<Vec<mpsc::Sender<LogEvent>>>,
    capacity: usize,
    dropped: AtomicU64,
}

/// Best-effort fan-out of [`LogEvent`]s to any number of observers.
///
/// Every subscriber owns a bounded buffer. Publishing never waits: when a
/// subscriber's buffer is full the new event is dropped for that subscriber
/// only. Subscribers see events published after they subscribed, nothing older.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    /// Create a new event bus
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_EVENT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(BusInner {
                subscribers: Mutex::new(Vec::new()),
                capacity: capacity.max(1),
                dropped: AtomicU64::new(0),
            }),
        }
    }

    /// Get a sender handle for the event bus
    pub fn sender(&self) -> EventSender {
        EventSender {
            inner: self.inner.clone(),
        }
    }

    /// Publish directly on the bus. Never blocks.
    pub fn publish(&self, event: LogEvent) {
        self.sender().send(event);
    }

    /// Attach a new observer
    pub fn subscribe(&self) -> LogStream {
        let (tx, rx) = mpsc::channel(self.inner.capacity);
        if let Ok(mut subscribers) = self.inner.subscribers.lock() {
            subscribers.push(tx);
        }
        LogStream {
            inner: ReceiverStream::new(rx),
        }
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner
            .subscribers
            .lock()
            .map(|s| s.iter().filter(|tx| !tx.is_closed()).count())
            .unwrap_or(0)
    }

    /// Number of deliveries skipped because a subscriber was full
    pub fn dropped_count(&self) -> u64 {
        self.inner.dropped.load(Ordering::Relaxed)
    }

    /// End every open subscription
    pub fn close(&self) {
        if let Ok(mut subscribers) = self.inner.subscribers.lock() {
            subscribers.clear();
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("capacity", &self.inner.capacity)
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// Handle for publishing events to the bus
#[derive(Clone)]
pub struct EventSender {
    inner: Arc<BusInner>,
}

impl EventSender {
    /// Publish an event. Never blocks.
    pub fn send(&self, event: LogEvent) {
        let Ok(mut subscribers) = self.inner.subscribers.lock() else {
            return;
        };
        subscribers.retain(|tx| match tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.inner.dropped.fetch_add(1, Ordering::Relaxed);
                debug!(tool = event.tool(), "log subscriber full, dropping event");
                true
            }
            Err(TrySendError::Closed(_)) => false,
        });
    }

    pub fn send_call(&self, tool: &str, args: impl Into<String>) {
        self.send(LogEvent::call(tool, args));
    }

    pub fn send_result(&self, tool: &str, result: impl Into<String>) {
        self.send(LogEvent::result(tool, result));
    }

    pub fn send_error(&self, tool: &str, error: impl Into<String>) {
        self.send(LogEvent::error(tool, error));
    }
}

impl std::fmt::Debug for EventSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSender").finish_non_exhaustive()
    }
}

/// One observer's view of the bus. Ends when the bus closes.
pub struct LogStream {
    inner: ReceiverStream<LogEvent>,
}

impl LogStream {
    pub async fn recv(&mut self) -> Option<LogEvent> {
        self.inner.as_mut().recv().await
    }

    /// Take whatever is already buffered without waiting
    pub fn try_recv(&mut self) -> Option<LogEvent> {
        self.inner.as_mut().try_recv().ok()
    }
}

impl Stream for LogStream {
    type Item = LogEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_stream::StreamExt;

    #[tokio::test]
    async fn test_event_bus() {
        let bus = EventBus::new();
        let sender = bus.sender();
        let mut stream = bus.subscribe();

        sender.send_call("search", r#"{"text":"NullPointerException"}"#);

        let event = stream.recv().await.unwrap();
        match event {
            LogEvent::Call { tool, args, .. } => {
                assert_eq!(tool, "search");
                assert!(args.contains("NullPointerException"));
            }
            _ => panic!("Expected Call event"),
        }
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_noop() {
        let bus = EventBus::new();
        bus.publish(LogEvent::result("git_log", "[]"));
        assert_eq!(bus.subscriber_count(), 0);
        assert_eq!(bus.dropped_count(), 0);
    }

    #[tokio::test]
    async fn test_overflow_drops_newest_and_never_blocks() {
        let bus = EventBus::with_capacity(4);
        let sender = bus.sender();
        let mut stream = bus.subscribe();

        for i in 0..10 {
            sender.send_result("search", format!("{}", i));
        }

        let mut received = Vec::new();
        while let Some(event) = stream.try_recv() {
            received.push(event);
        }
        assert_eq!(received.len(), 4);
        // oldest survive, newest were dropped
        assert!(matches!(&received[0], LogEvent::Result { result, .. } if result == "0"));
        assert!(matches!(&received[3], LogEvent::Result { result, .. } if result == "3"));
        assert_eq!(bus.dropped_count(), 6);
    }

    #[tokio::test]
    async fn test_no_replay_for_late_subscriber() {
        let bus = EventBus::new();
        let sender = bus.sender();
        sender.send_error("git_blame", "boom");

        let mut late = bus.subscribe();
        assert!(late.try_recv().is_none());

        sender.send_error("git_blame", "second");
        let event = late.recv().await.unwrap();
        assert!(matches!(event, LogEvent::Error { ref error, .. } if error == "second"));
    }

    #[tokio::test]
    async fn test_subscribers_are_independent() {
        let bus = EventBus::with_capacity(2);
        let sender = bus.sender();
        let mut fast = bus.subscribe();
        let mut slow = bus.subscribe();

        sender.send_call("search", "{}");
        assert!(fast.try_recv().is_some());
        sender.send_call("search", "{}");
        sender.send_call("search", "{}");

        assert!(fast.try_recv().is_some());
        assert!(fast.try_recv().is_some());

        let mut slow_count = 0;
        while slow.try_recv().is_some() {
            slow_count += 1;
        }
        assert_eq!(slow_count, 2);
    }

    #[tokio::test]
    async fn test_stream_ends_on_close() {
        let bus = EventBus::new();
        let mut stream = bus.subscribe();
        bus.sender().send_call("search", "{}");
        bus.close();

        assert!(stream.next().await.is_some());
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_dropped_subscriber_is_pruned() {
        let bus = EventBus::new();
        let stream = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);
        drop(stream);
        bus.sender().send_call("search", "{}");
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_wire_encoding() {
        let event = LogEvent::Call {
            tool: "git_blame".into(),
            timestamp: 42,
            args: "{\"path\":\"a.kt\"}".into(),
        };
        let encoded = event.encode();
        let value: serde_json::Value = serde_json::from_str(&encoded).unwrap();
        assert_eq!(value["type"], "CALL");
        assert_eq!(value["toolName"], "git_blame");
        assert_eq!(value["timestamp"], 42);
        assert_eq!(LogEvent::decode(&encoded).unwrap(), event);

        let ok = LogEvent::Result { tool: "search".into(), timestamp: 1, result: "x".into() };
        assert!(ok.encode().contains("\"type\":\"OK\""));
        let err = LogEvent::validation_error("search", "Missing required field: text");
        assert_eq!(err.kind(), "ERROR");
        assert!(err.is_validation_error());
    }

    #[test]
    fn test_timestamps_non_decreasing() {
        let mut last = 0;
        for _ in 0..100 {
            let ts = LogEvent::call("search", "{}").timestamp();
            assert!(ts >= last);
            last = ts;
        }
    }
}

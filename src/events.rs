//! Progress events streamed from the pipeline to its caller.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Kind of progress event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    Info,
    Action,
    Observation,
    Response,
    Error,
    Memory,
    Start,
    Done,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EventKind::Info => "INFO",
            EventKind::Action => "ACTION",
            EventKind::Observation => "OBSERVATION",
            EventKind::Response => "RESPONSE",
            EventKind::Error => "ERROR",
            EventKind::Memory => "MEMORY",
            EventKind::Start => "START",
            EventKind::Done => "DONE",
        };
        f.write_str(name)
    }
}

/// One progress report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Stage or agent that produced the event.
    pub source: String,
    pub kind: EventKind,
    pub message: String,
}

impl std::fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}: {}", self.source, self.kind, self.message)
    }
}

/// Fire-and-forget event sink.
///
/// Emitting never blocks and never fails; events also go to the tracing log.
#[derive(Debug, Clone, Default)]
pub struct ProgressSink {
    tx: Option<mpsc::UnboundedSender<ProgressEvent>>,
}

impl ProgressSink {
    /// Sink that only logs.
    pub fn silent() -> Self {
        Self { tx: None }
    }

    /// Create a sink and the receiver its events arrive on.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    pub fn emit(&self, source: &str, kind: EventKind, message: impl Into<String>) {
        let event = ProgressEvent {
            source: source.to_string(),
            kind,
            message: message.into(),
        };

        match kind {
            EventKind::Error => warn!(source = %event.source, "{}", event.message),
            _ => info!(source = %event.source, kind = %kind, "{}", event.message),
        }

        if let Some(tx) = &self.tx {
            // Receiver gone means nobody is listening any more.
            let _ = tx.send(event);
        }
    }
}

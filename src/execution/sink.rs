//! Event sinks - where a run's events go
//!
//! A sink is bound to one consumer (a websocket session, the terminal, a
//! test). Emission is synchronous and must never block the run; ordering of
//! emitted events is preserved by every sink in this module.

use crate::core::{RunEvent, Severity};
use tokio::sync::mpsc;
use tracing::debug;

/// Destination for run events
///
/// This trait is object-safe and is shared as `Arc<dyn EventSink>` between
/// the orchestrator and the output-draining tasks of a script.
pub trait EventSink: Send + Sync {
    /// Called for every event, in emission order
    fn emit(&self, event: RunEvent);

    /// Emit a log event
    fn log(&self, message: &str, severity: Severity) {
        self.emit(RunEvent::log(message, severity));
    }

    /// Emit a progress event
    fn progress(&self, percent: u8) {
        self.emit(RunEvent::progress(percent));
    }
}

/// Sink that forwards events into an unbounded channel
///
/// The receiving side is drained by a single writer, which keeps emission
/// order intact.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<RunEvent>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::UnboundedSender<RunEvent>) -> Self {
        Self { tx }
    }

    /// Create a sink together with its receiving end
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<RunEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: RunEvent) {
        if self.tx.send(event).is_err() {
            debug!("Event receiver dropped, discarding event");
        }
    }
}

/// Sink that discards everything
#[derive(Debug, Clone, Default)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn emit(&self, _event: RunEvent) {}
}

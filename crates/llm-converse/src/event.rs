//! Observer channel for conversation progress.
//!
//! The loop and the adapters report what they are doing through an
//! [`EventSink`]. Events are delivered synchronously, in the order they
//! happen: streamed text arrives in network order, and tool events follow
//! the order in which the model issued the calls.
//!
//! Any `Fn(&ConverseEvent)` closure is a sink:
//!
//! ```rust
//! use std::sync::{Arc, Mutex};
//! use llm_converse::event::{ConverseEvent, EventSink};
//!
//! let seen = Arc::new(Mutex::new(Vec::new()));
//! let sink = {
//!     let seen = Arc::clone(&seen);
//!     move |event: &ConverseEvent| seen.lock().unwrap().push(event.clone())
//! };
//! sink.emit(&ConverseEvent::TextDelta("hi".into()));
//! assert_eq!(seen.lock().unwrap().len(), 1);
//! ```

use std::time::Duration;

use tokio::sync::mpsc;

/// Something observable that happened during a conversation.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum ConverseEvent {
    /// A request/response round-trip is about to start.
    IterationStart {
        /// 1-based iteration number.
        iteration: u32,
        /// History length sent with this request.
        message_count: usize,
    },
    /// A fragment of visible model output.
    TextDelta(String),
    /// A fragment of side-channel reasoning ("thinking") output.
    ReasoningDelta(String),
    /// A tool is about to be invoked.
    ToolCallStart {
        /// Correlation id of the call.
        id: String,
        /// Tool name.
        name: String,
        /// Raw argument string.
        arguments: String,
    },
    /// A tool call produced its (canonicalized, truncated) result.
    ToolCallEnd {
        /// Correlation id of the call.
        id: String,
        /// Tool name.
        name: String,
        /// Result text appended to the conversation.
        result: String,
        /// Wall-clock time spent in the tool.
        duration: Duration,
    },
    /// A tool call failed recoverably (unknown tool, bad arguments,
    /// tool error). The failure is also reported to the model.
    ToolError {
        /// Tool name as requested by the model.
        name: String,
        /// Failure description.
        message: String,
    },
    /// The conversation finished successfully.
    Done {
        /// Round-trips performed.
        iterations: u32,
    },
}

/// Receives [`ConverseEvent`]s.
///
/// Implementations must be cheap: `emit` runs inline on the loop's task.
pub trait EventSink: Send + Sync {
    /// Handles one event.
    fn emit(&self, event: &ConverseEvent);
}

/// The unit sink discards everything.
impl EventSink for () {
    fn emit(&self, _event: &ConverseEvent) {}
}

impl<F> EventSink for F
where
    F: Fn(&ConverseEvent) + Send + Sync,
{
    fn emit(&self, event: &ConverseEvent) {
        self(event);
    }
}

/// Forwards events to `tracing` at debug level (tool errors at warn).
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &ConverseEvent) {
        match event {
            ConverseEvent::IterationStart {
                iteration,
                message_count,
            } => tracing::debug!(iteration, message_count, "iteration start"),
            ConverseEvent::TextDelta(text) => tracing::trace!(len = text.len(), "text delta"),
            ConverseEvent::ReasoningDelta(text) => {
                tracing::trace!(len = text.len(), "reasoning delta");
            }
            ConverseEvent::ToolCallStart { id, name, .. } => {
                tracing::debug!(call_id = %id, tool = %name, "tool call start");
            }
            ConverseEvent::ToolCallEnd {
                id, name, duration, ..
            } => tracing::debug!(call_id = %id, tool = %name, ?duration, "tool call end"),
            ConverseEvent::ToolError { name, message } => {
                tracing::warn!(tool = %name, error = %message, "tool call failed");
            }
            ConverseEvent::Done { iterations } => tracing::debug!(iterations, "conversation done"),
        }
    }
}

/// Sends events into an unbounded tokio channel.
///
/// Useful for driving a UI from another task. Events are dropped silently
/// once the receiver is gone.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<ConverseEvent>,
}

impl ChannelSink {
    /// Creates a sink and the receiver that observes it.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ConverseEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: &ConverseEvent) {
        let _ = self.tx.send(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    #[test]
    fn test_closure_sink_preserves_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = {
            let seen = Arc::clone(&seen);
            move |event: &ConverseEvent| seen.lock().unwrap().push(event.clone())
        };
        sink.emit(&ConverseEvent::TextDelta("a".into()));
        sink.emit(&ConverseEvent::TextDelta("b".into()));

        let seen = seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![
                ConverseEvent::TextDelta("a".into()),
                ConverseEvent::TextDelta("b".into()),
            ]
        );
    }

    #[test]
    fn test_unit_sink_is_noop() {
        ().emit(&ConverseEvent::Done { iterations: 1 });
    }

    #[tokio::test]
    async fn test_channel_sink_delivers() {
        let (sink, mut rx) = ChannelSink::new();
        sink.emit(&ConverseEvent::ReasoningDelta("hmm".into()));
        assert_eq!(
            rx.recv().await,
            Some(ConverseEvent::ReasoningDelta("hmm".into()))
        );
    }

    #[test]
    fn test_channel_sink_ignores_closed_receiver() {
        let (sink, rx) = ChannelSink::new();
        drop(rx);
        sink.emit(&ConverseEvent::Done { iterations: 3 });
    }
}

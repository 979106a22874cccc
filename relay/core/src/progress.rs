//! Progress Channel
//!
//! Carries intermediate agent activity from the task that runs the agent to
//! the orchestrator that streams it to the client.
//!
//! # Architecture
//!
//! ```text
//! agent task ──emit()──┐
//! agent task ──emit()──┼──► unbounded FIFO ──► ProgressChannel::poll / drain_all
//! runner     ──emit()──┘                       (single consumer)
//! ```
//!
//! Producers hold cloneable [`ProgressSender`] handles. Pushing never blocks
//! and never fails: once the consumer is gone, events are discarded.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;

use crate::events::StreamEvent;

/// Prefix marking a progress message as agent reasoning
pub const THINKING_MARKER: &str = "💭 AI思考过程：";

/// How the orchestrator should surface a progress event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressKind {
    /// Reasoning text (starts with [`THINKING_MARKER`])
    Thinking,
    /// Anything else
    Progress,
}

/// One message emitted while a request is being processed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    text: String,
}

impl ProgressEvent {
    /// Wrap an emitted message
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// Build a reasoning message carrying the marker
    pub fn thinking(reasoning: &str) -> Self {
        Self::new(format!("{THINKING_MARKER}\n{reasoning}"))
    }

    /// The raw text as emitted
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Kind derived from the marker prefix
    #[must_use]
    pub fn kind(&self) -> ProgressKind {
        if self.text.trim_start().starts_with(THINKING_MARKER) {
            ProgressKind::Thinking
        } else {
            ProgressKind::Progress
        }
    }

    /// Convert to the stream event the client receives.
    ///
    /// Thinking messages lose the marker and the whitespace after it.
    #[must_use]
    pub fn into_stream_event(self) -> StreamEvent {
        match self.kind() {
            ProgressKind::Thinking => {
                let body = self
                    .text
                    .trim_start()
                    .trim_start_matches(THINKING_MARKER)
                    .trim_start();
                StreamEvent::thinking(body)
            }
            ProgressKind::Progress => StreamEvent::progress(self.text),
        }
    }
}

/// Producer handle for a [`ProgressChannel`]
#[derive(Debug, Clone)]
pub struct ProgressSender {
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl ProgressSender {
    /// Push an event; silently dropped when the consumer is gone
    pub fn push(&self, event: ProgressEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("Progress consumer gone, event discarded");
        }
    }

    /// Push a text message
    pub fn emit(&self, text: impl Into<String>) {
        self.push(ProgressEvent::new(text));
    }

    /// Whether the consumer has been dropped
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Result of a single [`ProgressChannel::poll`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollResult {
    /// An event arrived within the timeout
    Event(ProgressEvent),
    /// Nothing arrived yet
    Pending,
}

/// Per-request FIFO of progress events with a single consumer
#[derive(Debug)]
pub struct ProgressChannel {
    tx: mpsc::UnboundedSender<ProgressEvent>,
    rx: mpsc::UnboundedReceiver<ProgressEvent>,
}

impl Default for ProgressChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressChannel {
    /// Create an empty channel
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { tx, rx }
    }

    /// A producer handle for this channel
    #[must_use]
    pub fn sender(&self) -> ProgressSender {
        ProgressSender {
            tx: self.tx.clone(),
        }
    }

    /// Push an event from the consumer side
    pub fn push(&self, event: ProgressEvent) {
        // The channel holds its own receiver, so this cannot fail.
        let _ = self.tx.send(event);
    }

    /// Wait up to `timeout` for the next event.
    ///
    /// `recv` is cancel-safe: an event that arrives after the timeout fires
    /// stays queued for the next call.
    pub async fn poll(&mut self, timeout: Duration) -> PollResult {
        match tokio::time::timeout(timeout, self.rx.recv()).await {
            Ok(Some(event)) => PollResult::Event(event),
            // The channel keeps a sender alive, so `None` cannot happen in
            // practice; treat it like an empty poll.
            Ok(None) | Err(_) => PollResult::Pending,
        }
    }

    /// Remove and return every queued event without waiting
    pub fn drain_all(&mut self) -> Vec<ProgressEvent> {
        let mut events = Vec::new();
        loop {
            match self.rx.try_recv() {
                Ok(event) => events.push(event),
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_kind_from_marker() {
        assert_eq!(ProgressEvent::new("step 1").kind(), ProgressKind::Progress);
        assert_eq!(
            ProgressEvent::new("💭 AI思考过程：\nplan").kind(),
            ProgressKind::Thinking
        );
        assert_eq!(
            ProgressEvent::new("  💭 AI思考过程：x").kind(),
            ProgressKind::Thinking
        );
        assert_eq!(
            ProgressEvent::new("note 💭 AI思考过程：").kind(),
            ProgressKind::Progress
        );
    }

    #[test]
    fn test_thinking_marker_stripped() {
        let event = ProgressEvent::thinking("compare both clips").into_stream_event();
        assert_eq!(event, StreamEvent::thinking("compare both clips"));

        let event = ProgressEvent::new("step 1").into_stream_event();
        assert_eq!(event, StreamEvent::progress("step 1"));
    }

    #[test]
    fn test_drain_preserves_order() {
        let mut channel = ProgressChannel::new();
        let sender = channel.sender();
        sender.emit("a");
        channel.push(ProgressEvent::new("b"));
        sender.clone().emit("c");

        let drained: Vec<_> = channel
            .drain_all()
            .into_iter()
            .map(|e| e.text().to_string())
            .collect();
        assert_eq!(drained, vec!["a", "b", "c"]);
        assert!(channel.drain_all().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_times_out_then_delivers() {
        let mut channel = ProgressChannel::new();
        assert_eq!(
            channel.poll(Duration::from_millis(100)).await,
            PollResult::Pending
        );

        let sender = channel.sender();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(150)).await;
            sender.emit("late");
        });

        // First poll expires before the send, second one picks it up.
        assert_eq!(
            channel.poll(Duration::from_millis(100)).await,
            PollResult::Pending
        );
        assert_eq!(
            channel.poll(Duration::from_millis(100)).await,
            PollResult::Event(ProgressEvent::new("late"))
        );
    }

    #[tokio::test]
    async fn test_push_after_consumer_dropped_is_silent() {
        let channel = ProgressChannel::new();
        let sender = channel.sender();
        drop(channel);
        assert!(sender.is_closed());
        sender.emit("nobody listens");
    }
}

//! Stream Orchestrator
//!
//! Drives one request from `Start` to `End`:
//!
//! ```text
//! Starting ──► Streaming ──► Draining ──► Classifying ──► Emitting ──► Closed
//!                                │
//!                                └── task failed ──► Error ──► Closed
//! ```
//!
//! - **Starting**: emit `Start`, spawn the agent task
//! - **Streaming**: poll the progress channel while the task runs; every
//!   dequeued event is written before the next poll
//! - **Draining**: flush events that raced with task completion
//! - **Classifying**: split the answer into reasoning and final answer
//! - **Emitting**: `ResponseStart`, paced chunks, `ResponseEnd`
//! - **Closed**: `End`; the channel and task handle are released
//!
//! A failed write means the client is gone. Emission stops, the task handle
//! is dropped and the agent finishes in the background under the runner's
//! timeout. Any other fault ends the stream with `Error` then `End`.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::encoder::StreamEncoder;
use crate::agent::AgentRequest;
use crate::classifier::{
    split_sentences, SeparatedResponse, TextClassifier, DEFAULT_SENTENCE_DELIMITER,
};
use crate::events::StreamEvent;
use crate::progress::{PollResult, ProgressChannel};
use crate::tasks::{TaskRunner, TaskStatus};
use crate::transport::{FrameSink, TransportError};

/// Message carried by the `Start` event
pub const DEFAULT_START_MESSAGE: &str = "🚀 开始处理您的请求...";

/// Prefix of every `Error` event message
pub const ERROR_PREFIX: &str = "处理失败: ";

/// Pipeline timing and text settings
#[derive(Debug, Clone, PartialEq)]
pub struct StreamConfig {
    /// How long one progress poll waits
    pub poll_interval: Duration,
    /// Pause before each answer chunk
    pub chunk_delay: Duration,
    /// Character the final answer is split on
    pub sentence_delimiter: char,
    /// Message carried by `Start`
    pub start_message: String,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            chunk_delay: Duration::from_millis(300),
            sentence_delimiter: DEFAULT_SENTENCE_DELIMITER,
            start_message: DEFAULT_START_MESSAGE.to_string(),
        }
    }
}

/// Where a request currently is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrchestratorState {
    /// Emitting `Start` and spawning the task
    Starting,
    /// Forwarding progress while the task runs
    Streaming,
    /// Flushing progress queued after completion
    Draining,
    /// Separating reasoning from the answer
    Classifying,
    /// Writing the answer
    Emitting,
    /// `End` written or being written
    Closed,
}

impl fmt::Display for OrchestratorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Starting => "starting",
            Self::Streaming => "streaming",
            Self::Draining => "draining",
            Self::Classifying => "classifying",
            Self::Emitting => "emitting",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// How a stream finished
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamOutcome {
    /// The full answer was delivered
    Completed {
        /// Classified answer
        separated: SeparatedResponse,
        /// Number of `ResponseChunk` events written
        chunks: usize,
    },
    /// The stream ended with an `Error` event
    Failed {
        /// Message sent in the `Error` event
        message: String,
    },
    /// The client went away; emission stopped in `state`
    Disconnected {
        /// State in which the write failed
        state: OrchestratorState,
    },
}

impl StreamOutcome {
    /// Task status to record for this outcome
    #[must_use]
    pub fn status(&self) -> TaskStatus {
        match self {
            Self::Completed { .. } => TaskStatus::Done,
            Self::Failed { .. } => TaskStatus::Failed,
            Self::Disconnected { .. } => TaskStatus::Cancelled,
        }
    }
}

/// Runs the streaming state machine for individual requests
#[derive(Clone)]
pub struct StreamOrchestrator {
    runner: TaskRunner,
    classifier: TextClassifier,
    config: StreamConfig,
}

impl StreamOrchestrator {
    /// Create an orchestrator
    #[must_use]
    pub fn new(runner: TaskRunner, classifier: TextClassifier, config: StreamConfig) -> Self {
        Self {
            runner,
            classifier,
            config,
        }
    }

    /// Pipeline settings
    #[must_use]
    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// The runner used for agent tasks
    #[must_use]
    pub fn runner(&self) -> &TaskRunner {
        &self.runner
    }

    /// The classifier applied to answers
    #[must_use]
    pub fn classifier(&self) -> &TextClassifier {
        &self.classifier
    }

    /// Stream one request into `sink`.
    ///
    /// Never fails: every problem is either reported in-band or, when the
    /// client is gone, reflected in the returned outcome.
    pub async fn run<S: FrameSink>(&self, request: AgentRequest, sink: S) -> StreamOutcome {
        let request_id = request.request_id.clone();
        let mut encoder = StreamEncoder::new(sink, self.config.chunk_delay);
        let mut state = OrchestratorState::Starting;

        let outcome = match self.drive(request, &mut encoder, &mut state).await {
            Ok(outcome) => outcome,
            Err(e) if e.is_disconnect() => {
                tracing::info!(
                    request_id = %request_id,
                    state = %state,
                    "Client disconnected, abandoning stream"
                );
                StreamOutcome::Disconnected { state }
            }
            Err(e) => {
                tracing::error!(
                    request_id = %request_id,
                    state = %state,
                    error = %e,
                    "Stream fault"
                );
                self.close_with_error(&mut encoder, &e.to_string()).await
            }
        };

        tracing::debug!(
            request_id = %request_id,
            frames = encoder.frames_written(),
            status = outcome.status().label(),
            "Stream finished"
        );
        outcome
    }

    async fn drive<S: FrameSink>(
        &self,
        request: AgentRequest,
        encoder: &mut StreamEncoder<S>,
        state: &mut OrchestratorState,
    ) -> Result<StreamOutcome, TransportError> {
        let request_id = request.request_id.clone();

        encoder
            .emit(StreamEvent::start(self.config.start_message.as_str()))
            .await?;
        let mut channel = ProgressChannel::new();
        let task = self.runner.spawn(request, channel.sender());

        transition(&request_id, state, OrchestratorState::Streaming);
        while !task.is_finished() {
            if let PollResult::Event(event) = channel.poll(self.config.poll_interval).await {
                encoder.emit(event.into_stream_event()).await?;
            }
        }

        transition(&request_id, state, OrchestratorState::Draining);
        loop {
            let pending = channel.drain_all();
            if pending.is_empty() {
                break;
            }
            for event in pending {
                encoder.emit(event.into_stream_event()).await?;
            }
        }
        drop(channel);

        let raw = match task.join().await {
            Ok(raw) => raw,
            Err(failure) => {
                let message = failure.to_string();
                return Ok(self.close_with_error(encoder, &message).await);
            }
        };
        encoder.emit(StreamEvent::ThinkingEnd).await?;

        transition(&request_id, state, OrchestratorState::Classifying);
        let separated = self.classifier.separate(&raw);
        if !separated.reasoning.is_empty() {
            tracing::debug!(
                request_id = %request_id,
                reasoning_len = separated.reasoning.len(),
                "Separated reasoning from answer"
            );
        }

        transition(&request_id, state, OrchestratorState::Emitting);
        encoder.emit(StreamEvent::ResponseStart).await?;
        let mut segments = split_sentences(&separated.final_answer, self.config.sentence_delimiter);
        if segments.is_empty() {
            segments.push(separated.final_answer.clone());
        }
        let chunks = segments.len();
        for segment in segments {
            encoder.emit_chunk(segment).await?;
        }
        encoder.emit(StreamEvent::ResponseEnd).await?;

        transition(&request_id, state, OrchestratorState::Closed);
        encoder.emit(StreamEvent::End).await?;

        Ok(StreamOutcome::Completed { separated, chunks })
    }

    /// Write `Error` then `End`, ignoring write failures
    async fn close_with_error<S: FrameSink>(
        &self,
        encoder: &mut StreamEncoder<S>,
        description: &str,
    ) -> StreamOutcome {
        let message = format!("{ERROR_PREFIX}{description}");
        if !encoder.is_closed() {
            if let Err(e) = encoder.emit(StreamEvent::error(message.as_str())).await {
                tracing::debug!(error = %e, "Could not deliver error event");
            } else if let Err(e) = encoder.emit(StreamEvent::End).await {
                tracing::debug!(error = %e, "Could not deliver end event");
            }
        }
        StreamOutcome::Failed { message }
    }
}

fn transition(
    request_id: &crate::tasks::RequestId,
    state: &mut OrchestratorState,
    next: OrchestratorState,
) {
    tracing::trace!(request_id = %request_id, from = %state, to = %next, "Stream state");
    *state = next;
}

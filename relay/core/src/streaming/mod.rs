//! Streaming Pipeline
//!
//! Turns one request into an ordered stream of [`StreamEvent`]s while the
//! agent is still working.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                      StreamOrchestrator                          │
//! │                                                                  │
//! │   TaskRunner (spawned) ──emit()──► ProgressChannel               │
//! │         │                               │                        │
//! │         │ TaskResult               poll / drain_all              │
//! │         ▼                               ▼                        │
//! │   TextClassifier ──────────────► StreamEncoder ──► FrameSink     │
//! │   (reasoning / answer)           (one frame per event)           │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Features
//!
//! - **Live progress**: agent emits reach the client as they happen
//! - **Paced answer**: the final answer is delivered sentence by sentence
//! - **Disconnect tolerant**: a vanished client stops emission without
//!   cancelling the agent
//!
//! # Example
//!
//! ```ignore
//! use relay_core::streaming::{StreamConfig, StreamOrchestrator};
//!
//! let orchestrator = StreamOrchestrator::new(runner, classifier, StreamConfig::default());
//! let outcome = orchestrator.run(AgentRequest::new("ping"), sink).await;
//! ```
//!
//! [`StreamEvent`]: crate::events::StreamEvent

mod encoder;
mod orchestrator;

pub use encoder::StreamEncoder;
pub use orchestrator::{
    OrchestratorState, StreamConfig, StreamOrchestrator, StreamOutcome, DEFAULT_START_MESSAGE,
    ERROR_PREFIX,
};

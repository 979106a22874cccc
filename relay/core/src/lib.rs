//! Relay Core - Streaming Request Processing for agent-relay
//!
//! This crate runs a long-running, tool-using agent for one request while
//! streaming its intermediate activity to the caller, then delivers the
//! final answer in paced chunks. It has no HTTP dependencies; the daemon
//! crate wires it to a web server.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                         relay-daemon                             │
//! │            POST /api/process-stream ──► ChannelSink              │
//! └───────────────────────────────┬──────────────────────────────────┘
//!                                 │ AgentRequest
//! ┌───────────────────────────────┼──────────────────────────────────┐
//! │                          RELAY CORE                              │
//! │  ┌────────────────────────────┴───────────────────────────────┐  │
//! │  │                   StreamOrchestrator                       │  │
//! │  │  ┌────────────┐  ┌─────────────────┐  ┌────────────────┐   │  │
//! │  │  │ TaskRunner │─►│ ProgressChannel │─►│ StreamEncoder  │   │  │
//! │  │  │  (Agent)   │  └─────────────────┘  │ (SSE frames)   │   │  │
//! │  │  └─────┬──────┘                       └───────▲────────┘   │  │
//! │  │        └────────► TextClassifier ─────────────┘            │  │
//! │  └────────────────────────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use relay_core::{load_config, ChatCompletionsAgent, AgentRequest};
//! use relay_core::transport::channel_sink;
//!
//! let config = load_config()?;
//! let agent = Arc::new(ChatCompletionsAgent::from_config(&config.agent)?);
//! let orchestrator = config.build_orchestrator(agent);
//!
//! let (sink, body) = channel_sink(32);
//! tokio::spawn(async move {
//!     orchestrator.run(AgentRequest::new("ping"), sink).await;
//! });
//! // hand `body` to the HTTP response
//! ```
//!
//! # Module Overview
//!
//! - [`agent`]: Agent trait, OpenAI-compatible agent, prompts, tool catalog
//! - [`classifier`]: Reasoning/answer separation and sentence splitting
//! - [`config`]: Layered TOML/env/CLI configuration
//! - [`events`]: Client-facing stream events and ordering validation
//! - [`progress`]: Per-request progress channel
//! - [`security`]: Input limits and validation
//! - [`storage`]: Upload/output file store
//! - [`streaming`]: The orchestrator state machine and encoder
//! - [`tasks`]: Spawned agent tasks and their results
//! - [`transport`]: SSE framing and frame sinks

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod agent;
pub mod classifier;
pub mod config;
pub mod events;
pub mod progress;
pub mod security;
pub mod storage;
pub mod streaming;
pub mod tasks;
pub mod transport;

// Re-exports for convenience
pub use agent::{
    Agent, AgentConfig, AgentError, AgentRequest, ChatCompletionsAgent, SelectedFile, ToolCatalog,
};
pub use classifier::{
    separate, split_sentences, ClassifierConfig, SeparatedResponse, TextClassifier,
};
pub use events::{validate_sequence, EventKind, SequenceError, StreamEvent};
pub use progress::{PollResult, ProgressChannel, ProgressEvent, ProgressKind, ProgressSender};
pub use security::{InputValidator, RelayLimits, ValidationResult};
pub use storage::{
    FileArea, FileStore, StorageConfig, StorageError, StoredFile, UploadWriter,
};
pub use streaming::{OrchestratorState, StreamConfig, StreamOrchestrator, StreamOutcome};
pub use tasks::{RequestId, TaskFailure, TaskHandle, TaskResult, TaskRunner, TaskStatus};
pub use transport::{FrameSink, TransportError};

// Config exports
pub use config::{
    default_config_path, load_config, load_config_from_path, ConfigError, ConfigOverrides,
    ConfigSource, RelayConfig, RelayToml,
};

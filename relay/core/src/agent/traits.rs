//! Agent Trait Definitions
//!
//! Defines the common interface every agent implementation provides.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::progress::ProgressSender;
use crate::tasks::RequestId;

/// Default OpenAI-compatible endpoint
pub const DEFAULT_BASE_URL: &str = "https://integrate.api.nvidia.com/v1";

/// Default model name
pub const DEFAULT_MODEL: &str = "nvidia/llama-3.1-nemotron-ultra-253b-v1";

/// Errors an agent invocation can produce
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// The HTTP request could not be sent or read
    #[error("request to {endpoint} failed: {source}")]
    Request {
        /// Endpoint that was called
        endpoint: String,
        /// Underlying client error
        #[source]
        source: reqwest::Error,
    },

    /// The backend answered with a non-success status
    #[error("agent returned {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body (truncated)
        body: String,
    },

    /// The backend answered with something we could not interpret
    #[error("invalid agent response: {0}")]
    InvalidResponse(String),

    /// The agent is not configured correctly
    #[error("agent misconfigured: {0}")]
    Config(String),

    /// The agent reported a failure of its own
    #[error("{0}")]
    Failed(String),
}

/// A request handed to an agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRequest {
    /// Request identifier (for logging)
    pub request_id: RequestId,
    /// User message, including any selected-file block
    pub message: String,
    /// System prompt override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
}

impl AgentRequest {
    /// Create a request with a fresh ID
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            request_id: RequestId::new(),
            message: message.into(),
            system: None,
        }
    }

    /// Use an existing request ID
    #[must_use]
    pub fn with_request_id(mut self, request_id: RequestId) -> Self {
        self.request_id = request_id;
        self
    }

    /// Set the system prompt
    #[must_use]
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }
}

/// Connection settings for an OpenAI-compatible agent
#[derive(Debug, Clone, PartialEq)]
pub struct AgentConfig {
    /// Base URL, without the `/chat/completions` suffix
    pub base_url: String,
    /// Bearer token; `None` sends no Authorization header
    pub api_key: Option<String>,
    /// Model name
    pub model: String,
    /// Default system prompt
    pub system_prompt: Option<String>,
    /// Sampling temperature
    pub temperature: f32,
    /// Completion token limit
    pub max_tokens: u32,
    /// HTTP timeout for one call
    pub request_timeout: Duration,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            system_prompt: None,
            temperature: 0.6,
            max_tokens: 4096,
            request_timeout: Duration::from_secs(120),
        }
    }
}

/// Trait for agents that turn a user message into a final answer
///
/// Implementations may report intermediate activity any number of times
/// through `emit`. Messages prefixed with
/// [`THINKING_MARKER`](crate::progress::THINKING_MARKER) are shown as
/// reasoning.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Get the agent name (for logging/display)
    fn name(&self) -> &str;

    /// Check if the agent is reachable
    async fn health_check(&self) -> bool {
        true
    }

    /// Run the request to completion and return the raw response text
    async fn invoke(
        &self,
        request: &AgentRequest,
        emit: &ProgressSender,
    ) -> Result<String, AgentError>;
}

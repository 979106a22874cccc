//! Task Runner
//!
//! Runs the agent call for one request as its own tokio task.
//!
//! # Design Philosophy
//!
//! The task talks back to the orchestrator only through the progress
//! channel and its join handle. Whatever happens inside the agent (error,
//! timeout, panic) comes out as a [`TaskFailure`]; nothing propagates past
//! this boundary.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::{JoinError, JoinHandle};

use crate::agent::{Agent, AgentRequest};
use crate::progress::ProgressSender;

/// Announcement used by deployments that enable one
pub const DEFAULT_ANNOUNCE: &str = "🔍 正在分析您的请求...";

/// Default ceiling on one agent invocation
pub const DEFAULT_TASK_TIMEOUT: Duration = Duration::from_secs(300);

/// Request identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub String);

impl RequestId {
    /// Generate a new unique request ID
    #[must_use]
    pub fn new() -> Self {
        Self(format!("req_{}", uuid::Uuid::new_v4().simple()))
    }

    /// Get the string value
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Why a task produced no answer
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TaskFailure {
    /// The agent reported an error
    #[error("{0}")]
    Agent(String),
    /// The agent did not finish in time
    #[error("agent did not respond within {}s", .0.as_secs())]
    TimedOut(Duration),
    /// The task died before producing a result
    #[error("agent task aborted: {0}")]
    Aborted(String),
}

/// Outcome of one agent task
pub type TaskResult = Result<String, TaskFailure>;

/// Lifecycle of a request's task
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Task is actively running
    Running,
    /// Task completed successfully
    Done,
    /// Task failed
    Failed,
    /// The client went away before the answer was delivered
    Cancelled,
}

impl TaskStatus {
    /// Human-readable label
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Running => "Running",
            Self::Done => "Done",
            Self::Failed => "Failed",
            Self::Cancelled => "Cancelled",
        }
    }

    /// Whether this status is final
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

/// Runs agent invocations with an announcement and a timeout
#[derive(Clone)]
pub struct TaskRunner {
    agent: Arc<dyn Agent>,
    timeout: Option<Duration>,
    announce: Option<String>,
}

impl TaskRunner {
    /// Create a runner for `agent` with the default timeout and no announcement
    pub fn new(agent: Arc<dyn Agent>) -> Self {
        Self {
            agent,
            timeout: Some(DEFAULT_TASK_TIMEOUT),
            announce: None,
        }
    }

    /// Set the timeout; `None` waits indefinitely
    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the message emitted when a task starts; empty disables it
    #[must_use]
    pub fn with_announce(mut self, announce: impl Into<String>) -> Self {
        let announce = announce.into();
        self.announce = (!announce.is_empty()).then_some(announce);
        self
    }

    /// The agent this runner delegates to
    #[must_use]
    pub fn agent(&self) -> &Arc<dyn Agent> {
        &self.agent
    }

    /// Run the request to completion on the current task
    pub async fn run(&self, request: AgentRequest, emit: ProgressSender) -> TaskResult {
        if let Some(announce) = &self.announce {
            emit.emit(announce.as_str());
        }

        let invocation = self.agent.invoke(&request, &emit);
        let result = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, invocation).await {
                Ok(result) => result,
                Err(_) => {
                    tracing::warn!(
                        request_id = %request.request_id,
                        agent = self.agent.name(),
                        timeout_secs = limit.as_secs(),
                        "Agent timed out"
                    );
                    return Err(TaskFailure::TimedOut(limit));
                }
            },
            None => invocation.await,
        };

        result.map_err(|e| {
            tracing::warn!(
                request_id = %request.request_id,
                agent = self.agent.name(),
                error = %e,
                "Agent failed"
            );
            TaskFailure::Agent(e.to_string())
        })
    }

    /// Run the request on a new tokio task
    #[must_use]
    pub fn spawn(&self, request: AgentRequest, emit: ProgressSender) -> TaskHandle {
        let runner = self.clone();
        let request_id = request.request_id.clone();
        let handle = tokio::spawn(async move { runner.run(request, emit).await });
        TaskHandle { request_id, handle }
    }
}

/// Handle to a spawned agent task
///
/// Dropping the handle detaches the task: it keeps running (bounded by the
/// runner timeout) and its result is discarded.
#[derive(Debug)]
pub struct TaskHandle {
    request_id: RequestId,
    handle: JoinHandle<TaskResult>,
}

impl TaskHandle {
    /// Request this task belongs to
    #[must_use]
    pub fn request_id(&self) -> &RequestId {
        &self.request_id
    }

    /// Whether the task has produced its result
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the result
    pub async fn join(self) -> TaskResult {
        self.handle.await.unwrap_or_else(|e| Err(join_failure(e)))
    }
}

fn join_failure(err: JoinError) -> TaskFailure {
    if err.is_cancelled() {
        return TaskFailure::Aborted("cancelled".to_string());
    }
    let payload = err.into_panic();
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "panicked".to_string());
    TaskFailure::Aborted(message)
}

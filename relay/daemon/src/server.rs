//! Daemon Server Implementation
//!
//! This module provides the HTTP server for the relay daemon:
//! - Builds the shared [`AppState`] (pipeline, file store, validator)
//! - Tracks in-flight requests in a [`RequestRegistry`]
//! - Assembles the router with CORS and tracing layers
//! - Serves until the shutdown signal fires
//!
//! # Request Flow
//!
//! ```text
//!   POST /api/process-stream
//!            │ validate, attach selected files
//!            ▼
//!      ┌───────────┐  spawn   ┌────────────────────┐
//!      │  handler  │ ───────► │ StreamOrchestrator │
//!      └─────┬─────┘          └─────────┬──────────┘
//!            │ Body::from_stream        │ ChannelSink
//!            ▼                          ▼
//!       HTTP client  ◄──── SSE frames (mpsc)
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use axum::Router;
use dashmap::DashMap;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use relay_core::agent::default_catalog;
use relay_core::{
    FileStore, InputValidator, RelayConfig, RequestId, StreamOrchestrator, TaskStatus, ToolCatalog,
};

use crate::routes;

/// Frames buffered between the orchestrator and a slow client
pub const STREAM_BUFFER_FRAMES: usize = 64;

/// Room for multipart boundaries and headers on top of the file itself
pub const UPLOAD_ENVELOPE_BYTES: u64 = 64 * 1024;

/// Bookkeeping for one in-flight request
#[derive(Debug, Clone, Copy)]
pub struct ActiveRequest {
    /// Current status
    pub status: TaskStatus,
    /// When the request was accepted
    pub started: Instant,
}

/// Registry of requests whose stream has not finished yet
#[derive(Debug, Default)]
pub struct RequestRegistry {
    requests: DashMap<RequestId, ActiveRequest>,
}

impl RequestRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a newly accepted request
    pub fn begin(&self, request_id: RequestId) {
        self.requests.insert(
            request_id,
            ActiveRequest {
                status: TaskStatus::Running,
                started: Instant::now(),
            },
        );
    }

    /// Record the final status and forget the request
    pub fn finish(&self, request_id: &RequestId, status: TaskStatus) {
        if let Some((_, entry)) = self.requests.remove(request_id) {
            info!(
                request_id = %request_id,
                status = status.label(),
                elapsed_ms = entry.started.elapsed().as_millis(),
                active_requests = self.requests.len(),
                "Request finished"
            );
        }
    }

    /// Copy of every in-flight request
    pub fn snapshot(&self) -> Vec<(RequestId, ActiveRequest)> {
        self.requests
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect()
    }

    /// Number of requests in flight
    pub fn active(&self) -> usize {
        self.requests.len()
    }
}

/// State shared by every handler
pub struct AppState {
    /// Streaming pipeline
    pub orchestrator: StreamOrchestrator,
    /// Upload/output files
    pub store: FileStore,
    /// Message and file name checks
    pub validator: InputValidator,
    /// Tools advertised to clients
    pub catalog: ToolCatalog,
    /// In-flight requests
    pub requests: RequestRegistry,
}

impl AppState {
    /// Assemble state from its parts
    pub fn new(orchestrator: StreamOrchestrator, store: FileStore, config: &RelayConfig) -> Self {
        Self {
            orchestrator,
            store,
            validator: InputValidator::new(config.limits.clone()),
            catalog: default_catalog(),
            requests: RequestRegistry::new(),
        }
    }
}

/// Build the router with all routes and layers
pub fn router(state: Arc<AppState>) -> Router {
    // Uploads are streamed to disk; the store enforces the per-file cap.
    let upload_limit = state
        .store
        .max_upload_bytes()
        .saturating_add(UPLOAD_ENVELOPE_BYTES);
    let upload_limit = usize::try_from(upload_limit).unwrap_or(usize::MAX);

    Router::new()
        .route("/api/process-stream", post(routes::process_stream))
        .route("/api/process", post(routes::process))
        .route("/api/tools", get(routes::tools))
        .route("/api/files", get(routes::list_files))
        .route(
            "/api/upload",
            post(routes::upload).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/api/download/{area}/{filename}", get(routes::download))
        .route("/api/files/{area}/{filename}", delete(routes::delete_file))
        .route("/health", get(routes::health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve `state` on `listener` until `shutdown` resolves
pub async fn serve(
    listener: TcpListener,
    state: Arc<AppState>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let addr = listener
        .local_addr()
        .context("Failed to read listener address")?;
    info!(addr = %addr, "Listening for requests");

    axum::serve(listener, router(Arc::clone(&state)))
        .with_graceful_shutdown(shutdown)
        .await
        .context("HTTP server failed")?;

    debug!(
        active_requests = state.requests.active(),
        "Server loop finished"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_lifecycle() {
        let registry = RequestRegistry::new();
        let id = RequestId::new();
        registry.begin(id.clone());
        assert_eq!(registry.active(), 1);
        let snapshot = registry.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].0, id);
        assert_eq!(snapshot[0].1.status, TaskStatus::Running);

        registry.finish(&id, TaskStatus::Done);
        assert_eq!(registry.active(), 0);
        assert!(registry.snapshot().is_empty());
    }

    #[test]
    fn test_finish_unknown_request_is_noop() {
        let registry = RequestRegistry::new();
        registry.finish(&RequestId::new(), TaskStatus::Failed);
        assert_eq!(registry.active(), 0);
    }
}

//! Route handlers
//!
//! `process_stream` is the main entry point; everything else is file
//! management and introspection for the web client.

use std::fmt::Write;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::multipart::Field;
use axum::extract::{Multipart, Path, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::Instrument;

use relay_core::agent::attach_selected_files;
use relay_core::streaming::ERROR_PREFIX;
use relay_core::transport::channel_sink;
use relay_core::{
    AgentRequest, FileArea, ProgressChannel, SelectedFile, StoredFile, UploadWriter,
};

use crate::error::ApiError;
use crate::server::{AppState, STREAM_BUFFER_FRAMES};

/// Body of `/api/process` and `/api/process-stream`
#[derive(Debug, Deserialize)]
pub struct ProcessRequest {
    /// What the user typed
    pub message: String,
    /// Files the user selected in the client
    #[serde(default)]
    pub files: Vec<SelectedFile>,
}

/// Reply of `/api/process`
#[derive(Debug, Serialize)]
pub struct ProcessResponse {
    /// Final answer
    pub response: String,
    /// Reasoning separated from the answer
    pub reasoning: String,
    /// Always true; failures use an error status
    pub success: bool,
}

/// Reply of `/api/upload`
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    /// Stored name
    pub filename: String,
    /// Absolute path on the server
    pub file_path: String,
    /// Bytes written
    pub size: u64,
    /// Always true
    pub success: bool,
}

/// Reply of `/api/files`
#[derive(Debug, Serialize)]
pub struct FileListing {
    /// Contents of the upload area
    pub uploaded_files: Vec<StoredFile>,
    /// Contents of the output area
    pub output_files: Vec<StoredFile>,
}

impl AppState {
    /// Validate a process request and build the agent request
    fn prepare(&self, body: &ProcessRequest) -> Result<AgentRequest, ApiError> {
        ApiError::check(self.validator.validate_message(&body.message))?;

        let max_files = self.validator.limits().max_selected_files;
        if body.files.len() > max_files {
            return Err(ApiError::BadRequest(format!(
                "Too many selected files: {} (max: {max_files})",
                body.files.len()
            )));
        }

        Ok(AgentRequest::new(attach_selected_files(
            &body.message,
            &body.files,
        )))
    }
}

/// `POST /api/process-stream`
pub async fn process_stream(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ProcessRequest>,
) -> Result<Response, ApiError> {
    let request = state.prepare(&body)?;
    let request_id = request.request_id.clone();
    let (sink, frames) = channel_sink(STREAM_BUFFER_FRAMES);

    state.requests.begin(request_id.clone());
    let span = tracing::info_span!("request", request_id = %request_id);
    let task_state = Arc::clone(&state);
    tokio::spawn(
        async move {
            let outcome = task_state.orchestrator.run(request, sink).await;
            task_state.requests.finish(&request_id, outcome.status());
        }
        .instrument(span),
    );

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::CONNECTION, "keep-alive")
        .header("x-accel-buffering", "no")
        .body(Body::from_stream(frames))
        .map_err(|e| ApiError::Internal(e.to_string()))
}

/// `POST /api/process`
pub async fn process(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ProcessRequest>,
) -> Result<Json<ProcessResponse>, ApiError> {
    let request = state.prepare(&body)?;
    let request_id = request.request_id.clone();

    // Nobody listens for progress here; the channel only keeps the agent's
    // emits from failing.
    let mut channel = ProgressChannel::new();
    let result = state
        .orchestrator
        .runner()
        .run(request, channel.sender())
        .instrument(tracing::info_span!("request", request_id = %request_id))
        .await;
    tracing::debug!(
        request_id = %request_id,
        discarded = channel.drain_all().len(),
        "Dropped progress for non-streaming request"
    );

    let raw = result.map_err(|failure| ApiError::Internal(format!("{ERROR_PREFIX}{failure}")))?;
    let separated = state.orchestrator.classifier().separate(&raw);
    Ok(Json(ProcessResponse {
        response: separated.final_answer,
        reasoning: separated.reasoning,
        success: true,
    }))
}

/// `GET /api/tools`
pub async fn tools(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(json!({
        "tools": state.catalog.listing(),
        "help": state.catalog.help_text(),
    }))
}

/// `GET /api/files`
pub async fn list_files(State(state): State<Arc<AppState>>) -> Result<Json<FileListing>, ApiError> {
    Ok(Json(FileListing {
        uploaded_files: state.store.list(FileArea::Upload).await?,
        output_files: state.store.list(FileArea::Output).await?,
    }))
}

/// `POST /api/upload`
pub async fn upload(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    while let Some(mut field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field
            .file_name()
            .map(ToString::to_string)
            .ok_or_else(|| ApiError::BadRequest("Upload has no file name".to_string()))?;

        let mut upload = state.store.begin_upload(&filename).await?;
        if let Err(e) = copy_field(&mut field, &mut upload).await {
            upload.discard().await;
            return Err(e);
        }
        let stored = upload.finish().await?;
        return Ok(Json(UploadResponse {
            filename: stored.name,
            file_path: stored.path,
            size: stored.size,
            success: true,
        }));
    }

    Err(ApiError::BadRequest("Missing multipart field 'file'".to_string()))
}

/// Stream one multipart field to disk without buffering it
async fn copy_field(field: &mut Field<'_>, upload: &mut UploadWriter) -> Result<(), ApiError> {
    while let Some(chunk) = field.chunk().await? {
        upload.write_chunk(&chunk).await?;
    }
    Ok(())
}

/// `GET /api/download/{area}/{filename}`
pub async fn download(
    State(state): State<Arc<AppState>>,
    Path((area, filename)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let area: FileArea = area.parse()?;
    let contents = state.store.read(area, &filename).await?;

    let disposition = HeaderValue::from_str(&content_disposition(&filename))
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok((
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/octet-stream"),
            ),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        contents,
    )
        .into_response())
}

/// `DELETE /api/files/{area}/{filename}`
pub async fn delete_file(
    State(state): State<Arc<AppState>>,
    Path((area, filename)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let area: FileArea = area.parse()?;
    state.store.delete(area, &filename).await?;
    Ok(Json(json!({
        "message": format!("文件 {filename} 已删除"),
        "success": true,
    })))
}

/// `GET /health`
pub async fn health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let agent = state.orchestrator.runner().agent();
    let reachable = agent.health_check().await;
    let requests: Vec<_> = state
        .requests
        .snapshot()
        .into_iter()
        .map(|(id, entry)| {
            let elapsed_ms =
                u64::try_from(entry.started.elapsed().as_millis()).unwrap_or(u64::MAX);
            json!({
                "request_id": id.as_str(),
                "status": entry.status,
                "elapsed_ms": elapsed_ms,
            })
        })
        .collect();
    Json(json!({
        "status": if reachable { "ok" } else { "degraded" },
        "agent": agent.name(),
        "active_requests": requests.len(),
        "requests": requests,
    }))
}

/// `attachment` disposition with an RFC 5987 encoded name
fn content_disposition(filename: &str) -> String {
    let mut encoded = String::with_capacity(filename.len());
    for byte in filename.bytes() {
        if byte.is_ascii_alphanumeric() || b"-._~".contains(&byte) {
            encoded.push(char::from(byte));
        } else {
            let _ = write!(encoded, "%{byte:02X}");
        }
    }
    format!("attachment; filename*=UTF-8''{encoded}")
}

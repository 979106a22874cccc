//! HTTP error responses
//!
//! Every rejected request gets `{"detail": "<message>"}` with a status code
//! matching the failure. Errors only occur before a stream is opened; once
//! an SSE response has started, failures travel in-band as `error` events.

use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use relay_core::{StorageError, ValidationResult};

/// Request-level failure
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Malformed or rejected input
    #[error("{0}")]
    BadRequest(String),
    /// No such file
    #[error("{0}")]
    NotFound(String),
    /// Upload over the size limit
    #[error("{0}")]
    PayloadTooLarge(String),
    /// Request flood
    #[error("{0}")]
    RateLimited(String),
    /// Anything the client cannot fix
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    /// HTTP status for this error
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Turn a validation verdict into `Ok(())` or the matching error
    pub fn check(result: ValidationResult) -> Result<(), Self> {
        match result {
            ValidationResult::Valid => Ok(()),
            ValidationResult::Invalid(msg) => Err(Self::BadRequest(msg)),
            ValidationResult::RateLimited(msg) => Err(Self::RateLimited(msg)),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = %status, error = %self, "Request failed");
        } else {
            tracing::debug!(status = %status, error = %self, "Request rejected");
        }
        (status, Json(serde_json::json!({ "detail": self.to_string() }))).into_response()
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::InvalidName(_)
            | StorageError::UnsupportedExtension { .. }
            | StorageError::UnknownArea(_) => Self::BadRequest(err.to_string()),
            StorageError::TooLarge { .. } => Self::PayloadTooLarge(err.to_string()),
            StorageError::NotFound(_) => Self::NotFound(err.to_string()),
            StorageError::Io { .. } => Self::Internal(err.to_string()),
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        let status = err.status();
        if status == StatusCode::PAYLOAD_TOO_LARGE {
            Self::PayloadTooLarge(err.body_text())
        } else {
            Self::BadRequest(err.body_text())
        }
    }
}

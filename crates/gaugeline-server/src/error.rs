//! API error types with HTTP status code mapping.
//!
//! [`ApiError`] is the unified error type for all endpoints. It implements
//! `axum::response::IntoResponse` to produce structured JSON error responses
//! with appropriate HTTP status codes. Backend failures never leak their
//! detail to the client; it goes to the log instead.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use gaugeline_core::CoreError;
use gaugeline_storage::{OpError, StorageError};

/// Structured error detail in API responses.
#[derive(Debug, Clone, Serialize)]
pub struct ApiErrorDetail {
    /// Machine-readable error code (e.g., "NOT_FOUND", "BAD_REQUEST").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

/// API errors with HTTP status code mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Unknown metric (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Malformed value or failed integrity check (400).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Metric kind the server does not handle (501).
    #[error("not implemented: {0}")]
    NotImplemented(String),

    /// Storage backend failure (500).
    #[error("internal error: {0}")]
    InternalError(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotImplemented(_) => StatusCode::NOT_IMPLEMENTED,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (code, message) = match self {
            ApiError::NotFound(msg) => ("NOT_FOUND", msg),
            ApiError::BadRequest(msg) => ("BAD_REQUEST", msg),
            ApiError::NotImplemented(msg) => ("NOT_IMPLEMENTED", msg),
            ApiError::InternalError(msg) => ("INTERNAL_ERROR", msg),
        };

        let body = serde_json::json!({
            "success": false,
            "error": ApiErrorDetail {
                code: code.to_string(),
                message,
            },
        });

        (status, axum::Json(body)).into_response()
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match &err {
            CoreError::UnsupportedKind { .. } => ApiError::NotImplemented(err.to_string()),
            CoreError::Malformed { .. } | CoreError::IntegrityMismatch { .. } => {
                ApiError::BadRequest(err.to_string())
            }
        }
    }
}

impl From<OpError> for ApiError {
    fn from(err: OpError) -> Self {
        match &err.source {
            StorageError::NotFound { .. } => ApiError::NotFound(err.source.to_string()),
            StorageError::IntegrityMismatch { .. } | StorageError::Malformed { .. } => {
                ApiError::BadRequest(err.source.to_string())
            }
            StorageError::BackendUnavailable { .. } => {
                tracing::error!(error = %err, "storage backend failure");
                ApiError::InternalError("storage backend unavailable".to_string())
            }
            // The service never issues create-only writes on behalf of a
            // client, so reaching this is a server bug.
            StorageError::AlreadyExists { .. } => {
                tracing::error!(error = %err, "unexpected create conflict");
                ApiError::InternalError("storage write conflict".to_string())
            }
        }
    }
}

//! Storage error types for gaugeline-storage.
//!
//! [`StorageError`] is the closed set of outcomes every backend maps its
//! failures onto. [`OpError`] wraps one with the name of the operation and
//! the time it failed, which is what the server hands to its transport layer.

use std::time::{SystemTime, UNIX_EPOCH};

use gaugeline_core::CoreError;
use thiserror::Error;

/// Errors produced by storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// No metric with the given id exists.
    #[error("metric not found: '{id}'")]
    NotFound { id: String },

    /// A create-only insert hit an existing id.
    #[error("metric already exists: '{id}'")]
    AlreadyExists { id: String },

    /// An integrity tag failed verification.
    #[error("integrity mismatch for metric '{id}'")]
    IntegrityMismatch { id: String },

    /// The metric, snapshot line, or stored row is not a valid metric.
    #[error("malformed metric: {reason}")]
    Malformed { reason: String },

    /// The backing file or database could not be reached or written.
    #[error("backend unavailable: {reason}")]
    BackendUnavailable { reason: String },
}

impl StorageError {
    pub fn not_found(id: impl Into<String>) -> Self {
        StorageError::NotFound { id: id.into() }
    }

    pub fn malformed(reason: impl Into<String>) -> Self {
        StorageError::Malformed {
            reason: reason.into(),
        }
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        StorageError::BackendUnavailable {
            reason: reason.into(),
        }
    }
}

impl From<CoreError> for StorageError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::IntegrityMismatch { id } => StorageError::IntegrityMismatch { id },
            other => StorageError::malformed(other.to_string()),
        }
    }
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(code, _)
                if code.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                StorageError::malformed(err.to_string())
            }
            _ => StorageError::unavailable(err.to_string()),
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::unavailable(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::malformed(err.to_string())
    }
}

/// A [`StorageError`] annotated with the failing operation and its time.
#[derive(Debug, Error)]
#[error("{op} failed at {millis}ms: {source}", millis = unix_millis(.at))]
pub struct OpError {
    pub op: &'static str,
    pub at: SystemTime,
    #[source]
    pub source: StorageError,
}

impl OpError {
    pub fn new(op: &'static str, source: StorageError) -> Self {
        OpError {
            op,
            at: SystemTime::now(),
            source,
        }
    }
}

fn unix_millis(at: &SystemTime) -> u128 {
    at.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
}

/// Attaches an operation name to a storage result.
pub trait OpResultExt<T> {
    fn op(self, name: &'static str) -> Result<T, OpError>;
}

impl<T> OpResultExt<T> for Result<T, StorageError> {
    fn op(self, name: &'static str) -> Result<T, OpError> {
        self.map_err(|e| OpError::new(name, e))
    }
}

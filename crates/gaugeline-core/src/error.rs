//! Core error types for gaugeline-core.
//!
//! Uses `thiserror` for structured, matchable error variants covering the
//! ways a metric can be rejected before it ever reaches storage.

use thiserror::Error;

/// Errors produced while building, decoding, or verifying a metric.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The metric literal or JSON payload could not be interpreted.
    #[error("malformed metric: {reason}")]
    Malformed { reason: String },

    /// The `type` field named a kind other than `gauge` or `counter`.
    #[error("unsupported metric kind: '{kind}'")]
    UnsupportedKind { kind: String },

    /// The integrity tag is missing or does not match the keyed digest.
    #[error("integrity mismatch for metric '{id}'")]
    IntegrityMismatch { id: String },
}

impl CoreError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        CoreError::Malformed {
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::malformed(err.to_string())
    }
}

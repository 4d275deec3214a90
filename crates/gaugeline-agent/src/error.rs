//! Agent error types.

use gaugeline_core::CoreError;
use gaugeline_storage::StorageError;
use thiserror::Error;

/// Failure to deliver one payload to the server.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection, timeout, or protocol failure before a status arrived.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("server rejected delivery ({status}): {body}")]
    Status { status: u16, body: String },
}

/// Errors surfaced by a poll or report cycle.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("local storage: {0}")]
    Storage(#[from] StorageError),

    #[error("encoding: {0}")]
    Encode(#[from] CoreError),

    #[error("delivery: {0}")]
    Transport(#[from] TransportError),

    /// Per-metric mode: some deliveries in the cycle failed.
    #[error("{failed} of {total} deliveries failed")]
    Partial { failed: usize, total: usize },

    #[error("delivery task: {0}")]
    Join(#[from] tokio::task::JoinError),
}

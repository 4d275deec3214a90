//! Response bodies that are not a bare metric.

use serde::Serialize;

/// Response for `POST /updates/`.
#[derive(Debug, Clone, Serialize)]
pub struct BatchUpdateResponse {
    pub success: bool,
    pub updated: usize,
}

/// Response for `GET /ping`.
#[derive(Debug, Clone, Serialize)]
pub struct PingResponse {
    pub success: bool,
    pub backend: &'static str,
}

//! Update handlers: path-encoded, single JSON, and JSON batch.
//!
//! Bodies are taken as raw bytes so decode failures map to 400 instead of
//! the extractor's default rejection.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;

use gaugeline_core::MetricPayload;

use crate::error::ApiError;
use crate::schema::BatchUpdateResponse;
use crate::state::AppState;

/// Header carrying the integrity tag of a single JSON update.
pub const HASH_HEADER: &str = "Hash";

/// Applies one update encoded in the path; responds with the stored value.
///
/// `POST /update/{kind}/{name}/{value}`
pub async fn update_plain(
    State(state): State<AppState>,
    Path((kind, name, value)): Path<(String, String, String)>,
) -> Result<String, ApiError> {
    let stored = state
        .call(move |svc| svc.update_scalar(&kind, &name, &value))
        .await?;
    tracing::debug!(id = %stored.id, kind = %stored.kind(), "path update applied");
    Ok(stored.value.to_plain_string())
}

/// Applies one JSON update, optionally tagged via body or `Hash` header.
///
/// `POST /update/`
pub async fn update_json(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<MetricPayload>, ApiError> {
    let payload = MetricPayload::from_json(&body)?;
    let header_tag = headers
        .get(HASH_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string());
    let stored = state
        .call(move |svc| svc.update_json(payload, header_tag.as_deref()))
        .await?;
    tracing::debug!(id = %stored.id, kind = %stored.kind, "json update applied");
    Ok(Json(stored))
}

/// Applies a JSON array of updates atomically.
///
/// `POST /updates/`
pub async fn update_batch(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<BatchUpdateResponse>, ApiError> {
    let payloads = MetricPayload::batch_from_json(&body)?;
    let updated = state.call(move |svc| svc.update_batch(payloads)).await?;
    tracing::debug!(updated, "batch update applied");
    Ok(Json(BatchUpdateResponse {
        success: true,
        updated,
    }))
}

//! Point queries.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::Json;

use gaugeline_core::MetricPayload;

use crate::error::ApiError;
use crate::state::AppState;

/// Returns one metric's value as plain text (`37.500`, `2`).
///
/// `GET /value/{kind}/{name}`
pub async fn get_plain(
    State(state): State<AppState>,
    Path((kind, name)): Path<(String, String)>,
) -> Result<String, ApiError> {
    let metric = state.call(move |svc| svc.value(&kind, &name)).await?;
    Ok(metric.value.to_plain_string())
}

/// Answers a JSON `{"id","type"}` query with the full metric.
///
/// `POST /value/`
pub async fn query_json(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<MetricPayload>, ApiError> {
    let query = MetricPayload::from_json(&body)?;
    let answer = state.call(move |svc| svc.query(&query)).await?;
    Ok(Json(answer))
}

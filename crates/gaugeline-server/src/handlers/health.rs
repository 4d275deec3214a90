//! Liveness probe.

use axum::extract::State;
use axum::Json;

use crate::error::ApiError;
use crate::schema::PingResponse;
use crate::state::AppState;

/// Checks that the storage backend answers within a bounded time.
///
/// `GET /ping`
pub async fn ping(State(state): State<AppState>) -> Result<Json<PingResponse>, ApiError> {
    let backend = state
        .call(|svc| {
            svc.ping()?;
            Ok(svc.store().backend_name())
        })
        .await?;
    Ok(Json(PingResponse {
        success: true,
        backend,
    }))
}

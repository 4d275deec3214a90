//! Router assembly for the gaugeline HTTP API.
//!
//! [`build_router`] wires all handler functions to their routes with
//! CORS and tracing middleware layers.

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Builds the complete axum router with all API routes.
///
/// Routes use axum 0.8 `/{param}` path syntax. The trailing-slash routes
/// (`/update/`, `/updates/`, `/value/`) are distinct paths from their
/// parameterised siblings.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Listings
        .route("/", get(handlers::listing::list_all))
        .route("/value/{kind}", get(handlers::listing::list_kind))
        // Point queries
        .route("/value/{kind}/{name}", get(handlers::value::get_plain))
        .route("/value/", post(handlers::value::query_json))
        // Updates
        .route(
            "/update/{kind}/{name}/{value}",
            post(handlers::update::update_plain),
        )
        .route("/update/", post(handlers::update::update_json))
        .route("/updates/", post(handlers::update::update_batch))
        // Health
        .route("/ping", get(handlers::health::ping))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

//! Application state shared by all handlers.
//!
//! [`AppState`] holds the [`MetricService`] behind an `Arc`. Unlike a single
//! connection, every storage backend locks internally, so no outer mutex is
//! needed. Service calls can block (a SQLite statement, a snapshot fsync), so
//! handlers go through [`AppState::call`], which runs them on tokio's blocking
//! pool.

use std::sync::Arc;

use gaugeline_core::SigningKey;
use gaugeline_storage::{open_store, MemoryStore, MetricStore, OpResultExt, StorageError};

use crate::config::ServerConfig;
use crate::error::ApiError;
use crate::service::MetricService;

/// Shared application state for the HTTP server.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<MetricService>,
}

impl AppState {
    pub fn new(service: MetricService) -> Self {
        AppState {
            service: Arc::new(service),
        }
    }

    /// Runs `f` against the service on the blocking pool.
    pub async fn call<T, F>(&self, f: F) -> Result<T, ApiError>
    where
        F: FnOnce(&MetricService) -> Result<T, ApiError> + Send + 'static,
        T: Send + 'static,
    {
        let service = Arc::clone(&self.service);
        tokio::task::spawn_blocking(move || f(&service))
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "storage task failed");
                ApiError::InternalError("storage task failed".to_string())
            })?
    }

    /// Opens the configured backend and restores its snapshot when asked.
    ///
    /// Failing to open the backend is fatal. A snapshot that exists but
    /// cannot be restored is logged and the server starts empty.
    pub fn from_config(config: &ServerConfig) -> Result<Self, StorageError> {
        let storage = config.storage();
        let store = open_store(&storage)?;

        if config.restore && storage.snapshots() {
            if let Err(e) = store.load().op("load") {
                tracing::error!(error = %e, "snapshot restore failed, starting empty");
            }
        }

        tracing::info!(
            backend = store.backend_name(),
            store_interval = ?config.store_interval,
            integrity = config.signing_key().is_some(),
            "metric service ready"
        );

        Ok(AppState::new(MetricService::new(
            store,
            config.signing_key(),
            config.persist_on_write(),
        )))
    }

    /// Creates state backed by a fresh in-memory store (for testing).
    pub fn in_memory(key: Option<SigningKey>) -> Self {
        let store: Arc<dyn MetricStore> = Arc::new(MemoryStore::new());
        AppState::new(MetricService::new(store, key, false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[tokio::test]
    async fn blocked_service_call_leaves_runtime_free() {
        let state = AppState::in_memory(None);
        let (release, wait) = std::sync::mpsc::channel::<()>();

        let pending = tokio::spawn({
            let state = state.clone();
            async move {
                state
                    .call(move |svc| {
                        wait.recv()
                            .map_err(|e| ApiError::InternalError(e.to_string()))?;
                        svc.list(None)
                    })
                    .await
            }
        });

        // On a current-thread runtime this only runs if the call above is
        // parked off the runtime thread.
        tokio::task::yield_now().await;
        release.send(()).unwrap();
        assert!(pending.await.unwrap().unwrap().is_empty());
    }

    #[tokio::test]
    async fn panicking_call_is_an_internal_error() {
        let state = AppState::in_memory(None);
        let err = state
            .call(|_| -> Result<(), ApiError> { panic!("boom") })
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}

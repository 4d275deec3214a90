//! Binary entrypoint for the gaugeline HTTP server.
//!
//! Configuration comes from flags or environment variables (see
//! [`ServerConfig`]). On SIGINT/SIGTERM the server stops accepting requests,
//! drains in-flight ones, and writes a final snapshot.

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use gaugeline_server::config::ServerConfig;
use gaugeline_server::router::build_router;
use gaugeline_server::snapshot::start_snapshot_task;
use gaugeline_server::state::AppState;
use gaugeline_storage::OpResultExt;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ServerConfig::parse();

    let state = match AppState::from_config(&config) {
        Ok(state) => state,
        Err(e) => {
            tracing::error!(error = %e, "failed to open storage");
            return ExitCode::FAILURE;
        }
    };
    let store = state.service.store().clone();

    let snapshot_task = (!config.persist_on_write() && config.storage().snapshots())
        .then(|| start_snapshot_task(store.clone(), config.store_interval));

    let listener = match tokio::net::TcpListener::bind(&config.address).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(address = %config.address, error = %e, "failed to bind");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!("gaugeline server listening on {}", config.address);

    let app = build_router(state);
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    if let Some(task) = snapshot_task {
        task.abort();
    }
    match store.persist().op("persist") {
        Ok(()) => tracing::info!("final snapshot written"),
        Err(e) => tracing::error!(error = %e, "final snapshot failed"),
    }

    match served {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "server error");
            ExitCode::FAILURE
        }
    }
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}

//! Binary entrypoint for the gaugeline agent.
//!
//! Configuration comes from flags or environment variables (see
//! [`AgentConfig`]). Runs until SIGINT/SIGTERM.

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use gaugeline_agent::config::AgentConfig;
use gaugeline_agent::{Agent, HttpTransport, ProcessSampler};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AgentConfig::parse();

    let transport = match HttpTransport::new(&config.address, config.timeout) {
        Ok(transport) => transport,
        Err(e) => {
            tracing::error!(error = %e, "failed to build http client");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(server = transport.base_url(), "reporting to server");

    let agent = Agent::new(ProcessSampler::new(), transport, config.settings());
    agent.run(shutdown_signal()).await;
    ExitCode::SUCCESS
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

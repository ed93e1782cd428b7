//! Rollcall Server - REST API for in-person attendance verification
//!
//! Exposes rollcall-core functionality via HTTP endpoints:
//! - GET  /api/token            - Issue a session credential and PIN
//! - POST /api/attendance/mark  - Submit attendance
//! - GET  /api/attendanceFeed   - Live attendance grouped by status
//!
//! See /docs for the full API.

use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;

use rollcall_core::SystemClock;
use rollcall_server::{create_router_with_config, open_store, AppState, Config};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                EnvFilter::new("rollcall_server=info,rollcall_core=info,tower_http=info")
            }),
        )
        .init();

    let config = Config::from_env();
    tracing::debug!(?config, "Loaded configuration");

    let store = match open_store(&config).await {
        Ok(store) => store,
        Err(e) => {
            tracing::error!(error = %e, "Failed to open attendance storage");
            return ExitCode::FAILURE;
        }
    };

    let state = match AppState::new(&config, store, Arc::new(SystemClock)) {
        Ok(state) => state,
        Err(e) => {
            tracing::error!(error = %e, "Failed to initialise session signing");
            return ExitCode::FAILURE;
        }
    };

    let app = create_router_with_config(&config, state);
    let addr = config.socket_addr();

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, %addr, "Failed to bind");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(%addr, "Rollcall server listening (docs at /docs)");

    let served = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await;

    match served {
        Ok(()) => {
            tracing::info!("Server stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Server error");
            ExitCode::FAILURE
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

//! Health check handlers
//!
//! Provides health and readiness endpoints for monitoring and orchestration.

use axum::{extract::State, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::handlers::AppState;

/// Health check response
#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    /// Service status: "healthy" or "degraded"
    #[schema(example = "healthy")]
    pub status: &'static str,
    /// Server version from Cargo.toml
    #[schema(example = "0.1.0")]
    pub version: &'static str,
    /// Service name
    #[schema(example = "rollcall-server")]
    pub service: &'static str,
    /// Storage backend: "postgres" or "memory"
    #[schema(example = "postgres")]
    pub storage: &'static str,
    /// Whether the storage backend answered
    pub storage_available: bool,
    /// Whether session timers are paused
    pub paused: bool,
}

/// Service health
///
/// Returns JSON with service status, version, and storage availability.
/// Used for monitoring and load balancer health checks.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service status", body = HealthResponse)
    )
)]
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let storage_available = match state.service.store().check_health().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Storage health check failed");
            false
        }
    };

    let status = if storage_available {
        "healthy"
    } else {
        "degraded"
    };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        service: "rollcall-server",
        storage: state.storage_backend(),
        storage_available,
        paused: state.service.pause_status().await,
    })
}

/// Readiness response for Kubernetes
#[derive(Serialize, ToSchema)]
pub struct ReadyResponse {
    /// Whether the service is ready to accept traffic
    pub ready: bool,
}

/// Readiness probe
///
/// Returns 200 when storage is reachable, 503 otherwise.
#[utoipa::path(
    get,
    path = "/ready",
    tag = "Health",
    responses(
        (status = 200, description = "Ready", body = ReadyResponse),
        (status = 503, description = "Storage unreachable")
    )
)]
pub async fn ready(State(state): State<AppState>) -> Result<Json<ReadyResponse>, ApiError> {
    state
        .service
        .store()
        .check_health()
        .await
        .map_err(|e| {
            tracing::warn!(error = %e, "Readiness check failed");
            ApiError::service_unavailable("storage unreachable")
        })?;

    Ok(Json(ReadyResponse { ready: true }))
}

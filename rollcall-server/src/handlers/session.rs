//! Session handlers
//!
//! Issue rotating credentials for the presenter display and control the
//! process-wide session timer.

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use rollcall_core::SessionInfo;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::error::ApiError;
use crate::handlers::AppState;
use crate::validation::{optional_field, MAX_IDENTIFIER_LEN};

/// Query parameters for credential issuance
#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct TokenQuery {
    /// Class or room id (default: "DEFAULT")
    pub class_id: Option<String>,
}

/// Freshly issued session credential
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    /// Signed credential to display, `window:nonce:signature`
    #[schema(example = "1700000000:4242:9f86d081884c7d65...")]
    pub token_string: String,
    /// Four-digit PIN shown alongside the credential
    #[schema(example = "0427")]
    pub pin: String,
    /// Seconds until expiry; 999999 while paused
    #[schema(example = 15)]
    pub expires_in: i64,
    #[schema(example = "1700000000")]
    pub window_id: String,
    pub class_id: String,
    pub expires_at: DateTime<Utc>,
    pub paused: bool,
}

impl From<SessionInfo> for TokenResponse {
    fn from(info: SessionInfo) -> Self {
        Self {
            token_string: info.signed_credential,
            pin: info.pin,
            expires_in: info.expires_in,
            window_id: info.window_id,
            class_id: info.class_id,
            expires_at: info.expires_at,
            paused: info.paused,
        }
    }
}

/// Session timer state
#[derive(Debug, Serialize, ToSchema)]
pub struct TimerResponse {
    pub paused: bool,
}

/// Issue a new session credential
///
/// Supersedes the current session of the class: the previous credential and
/// PIN stop verifying immediately.
#[utoipa::path(
    get,
    path = "/api/token",
    tag = "Sessions",
    params(TokenQuery),
    responses(
        (status = 200, description = "Session started", body = TokenResponse),
        (status = 400, description = "Invalid class id"),
        (status = 503, description = "Storage unavailable")
    )
)]
pub async fn token_handler(
    State(state): State<AppState>,
    Query(query): Query<TokenQuery>,
) -> Result<Json<TokenResponse>, ApiError> {
    let class_id = optional_field("classId", query.class_id.as_deref(), MAX_IDENTIFIER_LEN)?;
    let info = state.service.issue_session(class_id).await?;
    Ok(Json(info.into()))
}

/// Pause every live session
///
/// Sessions stop expiring until the timer is resumed.
#[utoipa::path(
    post,
    path = "/api/timer/pause",
    tag = "Sessions",
    responses(
        (status = 200, description = "Timer paused", body = TimerResponse),
        (status = 503, description = "Storage unavailable")
    )
)]
pub async fn pause_handler(State(state): State<AppState>) -> Result<Json<TimerResponse>, ApiError> {
    state.service.pause().await?;
    Ok(Json(TimerResponse { paused: true }))
}

/// Resume the session timer
///
/// Every live session gets a fresh full validity window.
#[utoipa::path(
    post,
    path = "/api/timer/resume",
    tag = "Sessions",
    responses(
        (status = 200, description = "Timer resumed", body = TimerResponse),
        (status = 503, description = "Storage unavailable")
    )
)]
pub async fn resume_handler(
    State(state): State<AppState>,
) -> Result<Json<TimerResponse>, ApiError> {
    state.service.resume().await?;
    Ok(Json(TimerResponse { paused: false }))
}

/// Current timer state
#[utoipa::path(
    get,
    path = "/api/timer/status",
    tag = "Sessions",
    responses(
        (status = 200, description = "Timer state", body = TimerResponse)
    )
)]
pub async fn timer_status_handler(State(state): State<AppState>) -> Json<TimerResponse> {
    Json(TimerResponse {
        paused: state.service.pause_status().await,
    })
}

//! Enrollment handler
//!
//! Administrative pre-enrollment of a participant's trusted device.

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use rollcall_core::Enrollment;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::handlers::AppState;
use crate::validation::{fingerprint_field, optional_field, require_field, MAX_IDENTIFIER_LEN};

/// Request for enrolling a participant
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EnrollStudentRequest {
    #[schema(example = "S1")]
    pub student_id: String,
    #[serde(default)]
    #[schema(example = "Ada Lovelace")]
    pub name: Option<String>,
    /// Fingerprint of the device to trust
    pub device_hash: String,
}

/// Stored enrollment
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EnrollStudentResponse {
    pub success: bool,
    pub student_id: String,
    pub name: String,
    pub enrolled_at: DateTime<Utc>,
}

impl From<Enrollment> for EnrollStudentResponse {
    fn from(enrollment: Enrollment) -> Self {
        Self {
            success: true,
            student_id: enrollment.participant_id,
            name: enrollment.name,
            enrolled_at: enrollment.enrolled_at,
        }
    }
}

/// Enroll a participant's device
///
/// Always replaces any existing enrollment, unlike enrollment on first
/// submission which never overwrites an anchor.
#[utoipa::path(
    post,
    path = "/api/students",
    tag = "Enrollment",
    request_body = EnrollStudentRequest,
    responses(
        (status = 200, description = "Participant enrolled", body = EnrollStudentResponse),
        (status = 400, description = "Missing student id or device hash"),
        (status = 503, description = "Storage unavailable")
    )
)]
pub async fn enroll_student_handler(
    State(state): State<AppState>,
    Json(request): Json<EnrollStudentRequest>,
) -> Result<Json<EnrollStudentResponse>, ApiError> {
    let participant_id = require_field("studentId", &request.student_id, MAX_IDENTIFIER_LEN)?;
    let fingerprint = fingerprint_field("deviceHash", &request.device_hash, true)?;
    let name = optional_field("name", request.name.as_deref(), MAX_IDENTIFIER_LEN)?
        .unwrap_or(participant_id);

    let enrollment = state
        .service
        .pre_enroll(participant_id, name, fingerprint)
        .await?;

    Ok(Json(enrollment.into()))
}

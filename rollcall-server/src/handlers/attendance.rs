//! Attendance handlers
//!
//! Participant submissions, presenter listings and moderation.

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use rollcall_core::{
    class_id_or_default, AttendanceFeed, AttendanceOutcome, AttendanceRecord, AuthMethod,
    ClassFilter, Moderation, Submission,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::error::ApiError;
use crate::handlers::AppState;
use crate::validation::{
    fingerprint_field, optional_field, require_field, MAX_IDENTIFIER_LEN,
};

/// Attendance submission from a participant's device
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MarkAttendanceRequest {
    #[schema(example = "S1")]
    pub student_id: String,
    /// Display name; falls back to the enrolled name, then the student id
    #[serde(default)]
    #[schema(example = "Ada Lovelace")]
    pub name: Option<String>,
    /// Signed credential as displayed by the presenter
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    #[schema(example = "0427")]
    pub pin: String,
    /// Opaque device fingerprint
    #[serde(default)]
    pub device_hash: String,
    /// "biometric" (default) or "fallback"
    #[serde(default)]
    #[schema(example = "biometric")]
    pub auth_method: Option<String>,
    #[serde(default)]
    pub class_id: Option<String>,
}

/// Accepted submission
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MarkAttendanceResponse {
    pub success: bool,
    pub id: i64,
    /// "present" or "flagged"
    #[schema(example = "present")]
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub student_id: String,
    pub name: String,
    #[schema(example = "biometric")]
    pub auth_method: String,
    pub window_id: String,
    /// Whether this submission enrolled the device
    pub enrolled: bool,
}

impl From<AttendanceOutcome> for MarkAttendanceResponse {
    fn from(outcome: AttendanceOutcome) -> Self {
        Self {
            success: true,
            id: outcome.record_id,
            status: outcome.status.to_string(),
            reason: outcome.reason,
            student_id: outcome.participant_id,
            name: outcome.name,
            auth_method: outcome.auth_method.as_str().to_string(),
            window_id: outcome.window_id,
            enrolled: outcome.new_enrollment,
        }
    }
}

/// One attendance record
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecordResponse {
    pub id: i64,
    pub student_id: String,
    pub name: String,
    #[schema(example = "flagged")]
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(example = "different device detected")]
    pub reason: Option<String>,
    pub time: DateTime<Utc>,
    pub class_id: String,
    pub window_id: String,
}

impl From<AttendanceRecord> for AttendanceRecordResponse {
    fn from(record: AttendanceRecord) -> Self {
        Self {
            id: record.id,
            student_id: record.participant_id,
            name: record.name,
            status: record.status.to_string(),
            reason: record.reason,
            time: record.recorded_at,
            class_id: record.class_id,
            window_id: record.window_id,
        }
    }
}

/// Attendance grouped by status
#[derive(Debug, Default, Serialize, ToSchema)]
pub struct AttendanceFeedResponse {
    pub present: Vec<AttendanceRecordResponse>,
    pub pending: Vec<AttendanceRecordResponse>,
    pub flagged: Vec<AttendanceRecordResponse>,
    pub total: usize,
}

impl From<AttendanceFeed> for AttendanceFeedResponse {
    fn from(feed: AttendanceFeed) -> Self {
        let convert = |records: Vec<AttendanceRecord>| -> Vec<AttendanceRecordResponse> {
            records.into_iter().map(Into::into).collect()
        };
        Self {
            present: convert(feed.present),
            pending: convert(feed.pending),
            flagged: convert(feed.flagged),
            total: feed.total,
        }
    }
}

/// Query parameters for the attendance listing
#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceQuery {
    /// Class or room id (default: "DEFAULT")
    pub class_id: Option<String>,
}

/// Query parameters for the attendance feed
#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct FeedQuery {
    /// Class or room id; all classes when absent
    pub class_id: Option<String>,
    /// "true" to include every class
    pub all: Option<String>,
}

/// Moderation target
#[derive(Debug, Deserialize, ToSchema)]
pub struct RecordIdRequest {
    #[schema(example = 42)]
    pub id: i64,
}

/// Plain success acknowledgement
#[derive(Debug, Serialize, ToSchema)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Scope of an attendance clear
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClearAttendanceRequest {
    #[serde(default)]
    pub class_id: Option<String>,
    #[serde(default)]
    pub clear_all: bool,
}

/// Number of records cleared
#[derive(Debug, Serialize, ToSchema)]
pub struct ClearAttendanceResponse {
    pub success: bool,
    pub deleted: u64,
}

/// Submit attendance
///
/// Verifies the credential and PIN against the current session of the class,
/// suppresses duplicates within a window and classifies device trust.
/// Rejections carry a stable `code`: `NO_ACTIVE_SESSION`, `SESSION_EXPIRED`,
/// `INVALID_CREDENTIAL`, `INVALID_PIN` or `DUPLICATE_SUBMISSION`.
#[utoipa::path(
    post,
    path = "/api/attendance/mark",
    tag = "Attendance",
    request_body = MarkAttendanceRequest,
    responses(
        (status = 200, description = "Attendance recorded", body = MarkAttendanceResponse),
        (status = 400, description = "Submission rejected or invalid input"),
        (status = 409, description = "Already marked in this window"),
        (status = 503, description = "Storage unavailable")
    )
)]
pub async fn mark_attendance_handler(
    State(state): State<AppState>,
    Json(request): Json<MarkAttendanceRequest>,
) -> Result<Json<MarkAttendanceResponse>, ApiError> {
    let participant_id = require_field("studentId", &request.student_id, MAX_IDENTIFIER_LEN)?;
    let name = optional_field("name", request.name.as_deref(), MAX_IDENTIFIER_LEN)?;
    let class_id = optional_field("classId", request.class_id.as_deref(), MAX_IDENTIFIER_LEN)?;
    fingerprint_field("deviceHash", &request.device_hash, false)?;

    let outcome = state
        .service
        .submit(Submission {
            class_id: class_id.map(str::to_string),
            participant_id: participant_id.to_string(),
            display_name: name.map(str::to_string),
            credential: request.token,
            pin: request.pin,
            fingerprint: request.device_hash,
            auth_method: AuthMethod::from_wire(request.auth_method.as_deref()),
        })
        .await?;

    Ok(Json(outcome.into()))
}

/// List attendance for a class, newest first
#[utoipa::path(
    get,
    path = "/api/attendance",
    tag = "Attendance",
    params(AttendanceQuery),
    responses(
        (status = 200, description = "Attendance records", body = [AttendanceRecordResponse]),
        (status = 503, description = "Storage unavailable")
    )
)]
pub async fn list_attendance_handler(
    State(state): State<AppState>,
    Query(query): Query<AttendanceQuery>,
) -> Result<Json<Vec<AttendanceRecordResponse>>, ApiError> {
    let filter = ClassFilter::Class(class_id_or_default(query.class_id.as_deref()));
    let records = state.service.list_attendance(&filter).await?;
    Ok(Json(records.into_iter().map(Into::into).collect()))
}

/// Live attendance feed grouped by status
///
/// Covers every class when `all=true` or no class id is given. A storage
/// failure yields an empty feed.
#[utoipa::path(
    get,
    path = "/api/attendanceFeed",
    tag = "Attendance",
    params(FeedQuery),
    responses(
        (status = 200, description = "Grouped attendance", body = AttendanceFeedResponse)
    )
)]
pub async fn attendance_feed_handler(
    State(state): State<AppState>,
    Query(query): Query<FeedQuery>,
) -> Json<AttendanceFeedResponse> {
    let filter = feed_filter(&query);

    match state.service.attendance_feed(&filter).await {
        Ok(feed) => Json(feed.into()),
        Err(e) => {
            tracing::error!(error = %e, ?filter, "Attendance feed unavailable, returning empty feed");
            Json(AttendanceFeedResponse::default())
        }
    }
}

fn feed_filter(query: &FeedQuery) -> ClassFilter {
    let show_all = query.all.as_deref() == Some("true");
    match query.class_id.as_deref().map(str::trim) {
        Some(class_id) if !show_all && !class_id.is_empty() => {
            ClassFilter::Class(class_id.to_string())
        }
        _ => ClassFilter::All,
    }
}

/// Approve a record
///
/// Marks it present and clears its flag reason.
#[utoipa::path(
    post,
    path = "/api/approve",
    tag = "Moderation",
    request_body = RecordIdRequest,
    responses(
        (status = 200, description = "Record approved", body = SuccessResponse),
        (status = 404, description = "No such record"),
        (status = 503, description = "Storage unavailable")
    )
)]
pub async fn approve_handler(
    State(state): State<AppState>,
    Json(request): Json<RecordIdRequest>,
) -> Result<Json<SuccessResponse>, ApiError> {
    moderate(&state, request.id, Moderation::Approve).await
}

/// Reject a record
///
/// Deletes it; the participant may submit again in the same window.
#[utoipa::path(
    post,
    path = "/api/reject",
    tag = "Moderation",
    request_body = RecordIdRequest,
    responses(
        (status = 200, description = "Record rejected", body = SuccessResponse),
        (status = 404, description = "No such record"),
        (status = 503, description = "Storage unavailable")
    )
)]
pub async fn reject_handler(
    State(state): State<AppState>,
    Json(request): Json<RecordIdRequest>,
) -> Result<Json<SuccessResponse>, ApiError> {
    moderate(&state, request.id, Moderation::Reject).await
}

async fn moderate(
    state: &AppState,
    id: i64,
    moderation: Moderation,
) -> Result<Json<SuccessResponse>, ApiError> {
    if !state.service.set_record_status(id, moderation).await? {
        return Err(ApiError::not_found(format!("Attendance record {}", id)));
    }
    Ok(Json(SuccessResponse { success: true }))
}

/// Clear attendance
///
/// Clears one class, or everything when `clearAll` is set or no class id is given.
#[utoipa::path(
    post,
    path = "/api/attendance/clear",
    tag = "Moderation",
    request_body = ClearAttendanceRequest,
    responses(
        (status = 200, description = "Records deleted", body = ClearAttendanceResponse),
        (status = 503, description = "Storage unavailable")
    )
)]
pub async fn clear_attendance_handler(
    State(state): State<AppState>,
    Json(request): Json<ClearAttendanceRequest>,
) -> Result<Json<ClearAttendanceResponse>, ApiError> {
    let filter = match optional_field("classId", request.class_id.as_deref(), MAX_IDENTIFIER_LEN)? {
        Some(class_id) if !request.clear_all => ClassFilter::Class(class_id.to_string()),
        _ => ClassFilter::All,
    };

    let deleted = state.service.clear_attendance(&filter).await?;
    Ok(Json(ClearAttendanceResponse {
        success: true,
        deleted,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feed_filter() {
        let query = |class_id: Option<&str>, all: Option<&str>| FeedQuery {
            class_id: class_id.map(str::to_string),
            all: all.map(str::to_string),
        };

        assert_eq!(feed_filter(&query(None, None)), ClassFilter::All);
        assert_eq!(feed_filter(&query(Some(""), None)), ClassFilter::All);
        assert_eq!(feed_filter(&query(Some("A"), Some("true"))), ClassFilter::All);
        assert_eq!(
            feed_filter(&query(Some("A"), Some("false"))),
            ClassFilter::Class("A".into())
        );
    }

    #[test]
    fn test_mark_request_defaults() {
        let request: MarkAttendanceRequest =
            serde_json::from_str(r#"{"studentId":"S1"}"#).unwrap();
        assert_eq!(request.student_id, "S1");
        assert!(request.token.is_empty());
        assert!(request.auth_method.is_none());
        assert!(request.class_id.is_none());
    }
}

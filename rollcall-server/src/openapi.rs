//! OpenAPI documentation configuration
//!
//! Generates OpenAPI 3.0 specification for the Rollcall attendance API.

use utoipa::OpenApi;

use crate::handlers::{
    AttendanceFeedResponse, AttendanceRecordResponse, ClearAttendanceRequest,
    ClearAttendanceResponse, EnrollStudentRequest, EnrollStudentResponse, HealthResponse,
    MarkAttendanceRequest, MarkAttendanceResponse, ReadyResponse, RecordIdRequest,
    SuccessResponse, TimerResponse, TokenResponse,
};

/// Rollcall Attendance API - OpenAPI Documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Rollcall - Attendance API",
        version = "0.1.0",
        description = r#"
## In-Person Attendance Verification API

A presenter displays a short-lived **signed credential** and a **PIN**. Each
participant submits both from their own device within the validity window.

### How It Works

1. The presenter display polls `GET /api/token` for a fresh credential
2. Participants submit it via `POST /api/attendance/mark` with a device fingerprint
3. The first device a participant uses becomes their trusted device
4. Submissions from another device, or via a fallback factor instead of
   biometrics, are recorded as **flagged** for review
5. Moderators approve or reject flagged records

Session timers can be paused (credentials stop expiring) and resumed
(every session gets a fresh full window).
"#,
        license(name = "MIT OR Apache-2.0")
    ),
    servers(
        (url = "http://localhost:4000", description = "Local development server")
    ),
    tags(
        (name = "Sessions", description = "Credential issuance and session timer control"),
        (name = "Attendance", description = "Participant submissions and presenter listings"),
        (name = "Moderation", description = "Manual review of attendance records"),
        (name = "Enrollment", description = "Trusted device enrollment"),
        (name = "Health", description = "Service health and readiness endpoints")
    ),
    paths(
        crate::handlers::health::health,
        crate::handlers::health::ready,
        crate::handlers::session::token_handler,
        crate::handlers::session::pause_handler,
        crate::handlers::session::resume_handler,
        crate::handlers::session::timer_status_handler,
        crate::handlers::attendance::mark_attendance_handler,
        crate::handlers::attendance::list_attendance_handler,
        crate::handlers::attendance::attendance_feed_handler,
        crate::handlers::attendance::approve_handler,
        crate::handlers::attendance::reject_handler,
        crate::handlers::attendance::clear_attendance_handler,
        crate::handlers::enrollment::enroll_student_handler,
    ),
    components(
        schemas(
            HealthResponse,
            ReadyResponse,
            TokenResponse,
            TimerResponse,
            MarkAttendanceRequest,
            MarkAttendanceResponse,
            AttendanceRecordResponse,
            AttendanceFeedResponse,
            RecordIdRequest,
            SuccessResponse,
            ClearAttendanceRequest,
            ClearAttendanceResponse,
            EnrollStudentRequest,
            EnrollStudentResponse,
        )
    )
)]
pub struct ApiDoc;

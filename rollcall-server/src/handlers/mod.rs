//! HTTP request handlers
//!
//! This module contains all the request handlers for the API endpoints.

pub mod attendance;
pub mod enrollment;
pub mod health;
pub mod session;

pub use crate::state::AppState;
pub use attendance::{
    approve_handler, attendance_feed_handler, clear_attendance_handler, list_attendance_handler,
    mark_attendance_handler, reject_handler, AttendanceFeedResponse, AttendanceRecordResponse,
    ClearAttendanceRequest, ClearAttendanceResponse, MarkAttendanceRequest,
    MarkAttendanceResponse, RecordIdRequest, SuccessResponse,
};
pub use enrollment::{enroll_student_handler, EnrollStudentRequest, EnrollStudentResponse};
pub use health::{health, ready, HealthResponse, ReadyResponse};
pub use session::{
    pause_handler, resume_handler, timer_status_handler, token_handler, TimerResponse,
    TokenResponse,
};

//! Domain records shared by the engine and its storage backends.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::trust::AuthMethod;

/// Class/room id used when a caller does not name one.
pub const DEFAULT_CLASS_ID: &str = "DEFAULT";

/// Resolve an optional class id, treating empty as absent.
pub fn class_id_or_default(class_id: Option<&str>) -> String {
    match class_id.map(str::trim) {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => DEFAULT_CLASS_ID.to_string(),
    }
}

/// The live session of one class/room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub window_id: String,
    pub class_id: String,
    pub signed_credential: String,
    pub pin: String,
    pub expires_at: DateTime<Utc>,
}

/// What a presenter displays for a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub class_id: String,
    pub window_id: String,
    pub signed_credential: String,
    pub pin: String,
    /// Seconds until expiry; a sentinel value while paused
    pub expires_in: i64,
    pub expires_at: DateTime<Utc>,
    pub paused: bool,
}

/// Attendance record status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Pending,
    Present,
    Flagged,
}

impl AttendanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Present => "present",
            Self::Flagged => "flagged",
        }
    }

    /// Whether a record with this status counts towards duplicate suppression.
    pub fn is_counted(&self) -> bool {
        matches!(self, Self::Present | Self::Flagged)
    }
}

impl std::fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AttendanceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "present" => Ok(Self::Present),
            "flagged" => Ok(Self::Flagged),
            other => Err(format!("unknown attendance status '{other}'")),
        }
    }
}

/// A participant's enrolled device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Enrollment {
    pub participant_id: String,
    pub name: String,
    pub fingerprint: String,
    pub enrolled_at: DateTime<Utc>,
}

/// Enrollment to create alongside an attendance record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEnrollment {
    pub participant_id: String,
    pub name: String,
    pub fingerprint: String,
}

/// A stored attendance record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub id: i64,
    pub participant_id: String,
    pub name: String,
    pub status: AttendanceStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub recorded_at: DateTime<Utc>,
    pub class_id: String,
    pub window_id: String,
    pub fingerprint: String,
}

/// Attendance record to persist; the store assigns the id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAttendance {
    pub participant_id: String,
    pub name: String,
    pub status: AttendanceStatus,
    pub reason: Option<String>,
    pub recorded_at: DateTime<Utc>,
    pub class_id: String,
    pub window_id: String,
    pub fingerprint: String,
}

/// Scope of listing and clearing operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassFilter {
    All,
    Class(String),
}

impl ClassFilter {
    pub fn matches(&self, class_id: &str) -> bool {
        match self {
            Self::All => true,
            Self::Class(id) => id == class_id,
        }
    }
}

/// Manual moderation applied to a single record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Moderation {
    /// Mark the record present and clear its reason
    Approve,
    /// Delete the record
    Reject,
}

/// Result of a successful attendance submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceOutcome {
    pub record_id: i64,
    pub status: AttendanceStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub participant_id: String,
    pub name: String,
    pub auth_method: AuthMethod,
    pub window_id: String,
    pub new_enrollment: bool,
}

/// Attendance grouped by status for a live dashboard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AttendanceFeed {
    pub present: Vec<AttendanceRecord>,
    pub pending: Vec<AttendanceRecord>,
    pub flagged: Vec<AttendanceRecord>,
    pub total: usize,
}

impl AttendanceFeed {
    /// Group `records`, keeping their order within each bucket.
    pub fn from_records(records: Vec<AttendanceRecord>) -> Self {
        let mut feed = Self {
            total: records.len(),
            ..Self::default()
        };
        for record in records {
            match record.status {
                AttendanceStatus::Present => feed.present.push(record),
                AttendanceStatus::Pending => feed.pending.push(record),
                AttendanceStatus::Flagged => feed.flagged.push(record),
            }
        }
        feed
    }
}

//! Storage contract for sessions, enrollments and attendance.
//!
//! Three logical tables back the engine:
//! - **sessions**: at most one row per class/room; replaced atomically
//! - **enrollments**: one row per participant, holding the trusted fingerprint
//! - **attendance**: append-only records, at most one `present`/`flagged`
//!   row per (participant, window)
//!
//! Every method is individually atomic. [`MemoryStore`] is provided for
//! development and tests; the server crate ships a PostgreSQL backend.

mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StorageError;
use crate::model::{
    AttendanceRecord, ClassFilter, Enrollment, NewAttendance, NewEnrollment, Session,
};

#[async_trait]
pub trait AttendanceStore: Send + Sync {
    /// Make `session` the only session of its class, discarding any previous one.
    async fn supersede_session(&self, session: &Session) -> Result<(), StorageError>;

    /// The current session of `class_id`, if one was ever started.
    async fn current_session(&self, class_id: &str) -> Result<Option<Session>, StorageError>;

    /// Set the expiry of every stored session. Returns the number of sessions touched.
    async fn set_all_session_expiry(&self, expires_at: DateTime<Utc>)
        -> Result<u64, StorageError>;

    async fn enrollment(&self, participant_id: &str) -> Result<Option<Enrollment>, StorageError>;

    /// Create or unconditionally replace an enrollment.
    async fn upsert_enrollment(
        &self,
        enrollment: NewEnrollment,
        enrolled_at: DateTime<Utc>,
    ) -> Result<Enrollment, StorageError>;

    /// Whether a `present`/`flagged` record exists for the pair.
    async fn has_counted_record(
        &self,
        participant_id: &str,
        window_id: &str,
    ) -> Result<bool, StorageError>;

    /// Persist an attendance record, and `enrollment` if the participant has
    /// no non-empty enrollment yet, as one atomic write.
    ///
    /// Fails with [`StorageError::UniqueViolation`] if a counted record for
    /// the same (participant, window) already exists. Nothing is written on
    /// failure.
    async fn record_attendance(
        &self,
        record: NewAttendance,
        enrollment: Option<NewEnrollment>,
    ) -> Result<AttendanceRecord, StorageError>;

    /// Records matching `filter`, newest first.
    async fn list_attendance(
        &self,
        filter: &ClassFilter,
    ) -> Result<Vec<AttendanceRecord>, StorageError>;

    /// Set a record to `present` and clear its reason. Returns false if absent.
    async fn approve_record(&self, id: i64) -> Result<bool, StorageError>;

    /// Returns false if absent.
    async fn delete_record(&self, id: i64) -> Result<bool, StorageError>;

    /// Delete records matching `filter`. Returns the number deleted.
    async fn clear_attendance(&self, filter: &ClassFilter) -> Result<u64, StorageError>;

    async fn check_health(&self) -> Result<(), StorageError> {
        Ok(())
    }

    /// Whether data survives a process restart.
    fn is_persistent(&self) -> bool;
}

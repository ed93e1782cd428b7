//! Presenter and moderator operations.
//!
//! These bypass the trust classifier: pre-enrollment overwrites the anchor
//! unconditionally and moderation edits records directly.

use crate::error::Result;
use crate::model::{
    class_id_or_default, AttendanceFeed, AttendanceRecord, ClassFilter, Enrollment, Moderation,
    NewEnrollment, SessionInfo,
};
use crate::pipeline::AttendanceService;

impl AttendanceService {
    /// Start a new session for the class (default class when absent).
    pub async fn issue_session(&self, class_id: Option<&str>) -> Result<SessionInfo> {
        self.registry
            .start_session(&class_id_or_default(class_id))
            .await
    }

    pub async fn pause(&self) -> Result<()> {
        self.registry.pause_all().await
    }

    pub async fn resume(&self) -> Result<()> {
        self.registry.resume_all().await
    }

    pub async fn pause_status(&self) -> bool {
        self.registry.status().await
    }

    /// Register or replace a participant's trusted device.
    pub async fn pre_enroll(
        &self,
        participant_id: &str,
        name: &str,
        fingerprint: &str,
    ) -> Result<Enrollment> {
        let enrollment = self
            .store
            .upsert_enrollment(
                NewEnrollment {
                    participant_id: participant_id.to_string(),
                    name: name.to_string(),
                    fingerprint: fingerprint.to_string(),
                },
                self.clock.now(),
            )
            .await?;

        tracing::info!(participant_id = %participant_id, "Participant pre-enrolled");
        Ok(enrollment)
    }

    pub async fn enrollment(&self, participant_id: &str) -> Result<Option<Enrollment>> {
        Ok(self.store.enrollment(participant_id).await?)
    }

    /// Records for `filter`, newest first.
    pub async fn list_attendance(&self, filter: &ClassFilter) -> Result<Vec<AttendanceRecord>> {
        Ok(self.store.list_attendance(filter).await?)
    }

    pub async fn attendance_feed(&self, filter: &ClassFilter) -> Result<AttendanceFeed> {
        let records = self.list_attendance(filter).await?;
        Ok(AttendanceFeed::from_records(records))
    }

    /// Apply a moderation decision. Returns false if no such record exists.
    pub async fn set_record_status(&self, id: i64, moderation: Moderation) -> Result<bool> {
        let affected = match moderation {
            Moderation::Approve => self.store.approve_record(id).await?,
            Moderation::Reject => self.store.delete_record(id).await?,
        };

        tracing::info!(record_id = id, ?moderation, affected, "Attendance moderated");
        Ok(affected)
    }

    /// Delete attendance for `filter`. Returns the number of records deleted.
    pub async fn clear_attendance(&self, filter: &ClassFilter) -> Result<u64> {
        let deleted = self.store.clear_attendance(filter).await?;
        tracing::info!(?filter, deleted, "Attendance cleared");
        Ok(deleted)
    }
}

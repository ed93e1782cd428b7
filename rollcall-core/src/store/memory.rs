//! In-memory storage backend
//!
//! Thread-safe, process-local storage. Everything is lost on restart.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::AttendanceStore;
use crate::error::StorageError;
use crate::model::{
    AttendanceRecord, AttendanceStatus, ClassFilter, Enrollment, NewAttendance, NewEnrollment,
    Session,
};

#[derive(Default)]
struct AttendanceTable {
    next_id: i64,
    rows: Vec<AttendanceRecord>,
}

/// In-memory [`AttendanceStore`].
#[derive(Default)]
pub struct MemoryStore {
    /// class_id -> current session
    sessions: DashMap<String, Session>,
    /// participant_id -> enrollment
    enrollments: DashMap<String, Enrollment>,
    attendance: Mutex<AttendanceTable>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self) -> std::sync::MutexGuard<'_, AttendanceTable> {
        self.attendance.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl AttendanceStore for MemoryStore {
    async fn supersede_session(&self, session: &Session) -> Result<(), StorageError> {
        self.sessions
            .insert(session.class_id.clone(), session.clone());
        Ok(())
    }

    async fn current_session(&self, class_id: &str) -> Result<Option<Session>, StorageError> {
        Ok(self.sessions.get(class_id).map(|entry| entry.value().clone()))
    }

    async fn set_all_session_expiry(
        &self,
        expires_at: DateTime<Utc>,
    ) -> Result<u64, StorageError> {
        let mut touched = 0;
        for mut entry in self.sessions.iter_mut() {
            entry.expires_at = expires_at;
            touched += 1;
        }
        Ok(touched)
    }

    async fn enrollment(&self, participant_id: &str) -> Result<Option<Enrollment>, StorageError> {
        Ok(self
            .enrollments
            .get(participant_id)
            .map(|entry| entry.value().clone()))
    }

    async fn upsert_enrollment(
        &self,
        enrollment: NewEnrollment,
        enrolled_at: DateTime<Utc>,
    ) -> Result<Enrollment, StorageError> {
        let stored = Enrollment {
            participant_id: enrollment.participant_id,
            name: enrollment.name,
            fingerprint: enrollment.fingerprint,
            enrolled_at,
        };
        self.enrollments
            .insert(stored.participant_id.clone(), stored.clone());
        Ok(stored)
    }

    async fn has_counted_record(
        &self,
        participant_id: &str,
        window_id: &str,
    ) -> Result<bool, StorageError> {
        Ok(self.table().rows.iter().any(|r| {
            r.participant_id == participant_id && r.window_id == window_id && r.status.is_counted()
        }))
    }

    async fn record_attendance(
        &self,
        record: NewAttendance,
        enrollment: Option<NewEnrollment>,
    ) -> Result<AttendanceRecord, StorageError> {
        let mut table = self.table();

        if record.status.is_counted()
            && table.rows.iter().any(|r| {
                r.participant_id == record.participant_id
                    && r.window_id == record.window_id
                    && r.status.is_counted()
            })
        {
            return Err(StorageError::UniqueViolation(format!(
                "attendance already recorded for {} in window {}",
                record.participant_id, record.window_id
            )));
        }

        if let Some(enrollment) = enrollment {
            let stored = Enrollment {
                participant_id: enrollment.participant_id.clone(),
                name: enrollment.name,
                fingerprint: enrollment.fingerprint,
                enrolled_at: record.recorded_at,
            };
            match self.enrollments.entry(enrollment.participant_id) {
                Entry::Vacant(slot) => {
                    slot.insert(stored);
                }
                Entry::Occupied(mut slot) if slot.get().fingerprint.is_empty() => {
                    slot.insert(stored);
                }
                Entry::Occupied(_) => {}
            }
        }

        table.next_id += 1;
        let stored = AttendanceRecord {
            id: table.next_id,
            participant_id: record.participant_id,
            name: record.name,
            status: record.status,
            reason: record.reason,
            recorded_at: record.recorded_at,
            class_id: record.class_id,
            window_id: record.window_id,
            fingerprint: record.fingerprint,
        };
        table.rows.push(stored.clone());
        Ok(stored)
    }

    async fn list_attendance(
        &self,
        filter: &ClassFilter,
    ) -> Result<Vec<AttendanceRecord>, StorageError> {
        let mut rows: Vec<AttendanceRecord> = self
            .table()
            .rows
            .iter()
            .filter(|r| filter.matches(&r.class_id))
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            b.recorded_at
                .cmp(&a.recorded_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(rows)
    }

    async fn approve_record(&self, id: i64) -> Result<bool, StorageError> {
        let mut table = self.table();
        match table.rows.iter_mut().find(|r| r.id == id) {
            Some(record) => {
                record.status = AttendanceStatus::Present;
                record.reason = None;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_record(&self, id: i64) -> Result<bool, StorageError> {
        let mut table = self.table();
        let before = table.rows.len();
        table.rows.retain(|r| r.id != id);
        Ok(table.rows.len() != before)
    }

    async fn clear_attendance(&self, filter: &ClassFilter) -> Result<u64, StorageError> {
        let mut table = self.table();
        let before = table.rows.len();
        table.rows.retain(|r| !filter.matches(&r.class_id));
        Ok((before - table.rows.len()) as u64)
    }

    fn is_persistent(&self) -> bool {
        false
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("sessions", &self.sessions.len())
            .field("enrollments", &self.enrollments.len())
            .field("attendance", &self.table().rows.len())
            .finish()
    }
}

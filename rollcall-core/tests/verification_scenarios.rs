//! End-to-end behaviour of the verification engine against the in-memory store.
//!
//! Covers the attendance scenarios (first contact, device change, fallback
//! factor, wrong PIN, duplicates, pause) and the engine-wide properties:
//! supersession, fresh windows on resume, enrollment immutability and
//! duplicate suppression under concurrent submission.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rollcall_core::{
    AttendanceRecord, AttendanceService, AttendanceStatus, AttendanceStore, AuthMethod, Clock,
    ClassFilter, CredentialIssuer, Enrollment, ManualClock, MemoryStore, Moderation,
    NewAttendance, NewEnrollment, RegistryConfig, Session, SessionInfo, StorageError, Submission,
    VerificationError, DEFAULT_SESSION_DURATION_SECS,
};

const FALLBACK_REASON: &str = "used PIN/pattern fallback instead of biometric";
const DEVICE_REASON: &str = "different device detected";

struct Harness {
    service: Arc<AttendanceService>,
    store: Arc<MemoryStore>,
    clock: Arc<ManualClock>,
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("rollcall_core=debug")
        .try_init();
}

fn harness() -> Harness {
    init_tracing();
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::default());
    let service = AttendanceService::new(
        CredentialIssuer::new("scenario-signing-key").unwrap(),
        store.clone(),
        clock.clone(),
        RegistryConfig::default(),
    );
    Harness {
        service: Arc::new(service),
        store,
        clock,
    }
}

fn submit_with(
    info: &SessionInfo,
    participant: &str,
    fingerprint: &str,
    method: AuthMethod,
) -> Submission {
    Submission {
        class_id: Some(info.class_id.clone()),
        participant_id: participant.to_string(),
        display_name: None,
        credential: info.signed_credential.clone(),
        pin: info.pin.clone(),
        fingerprint: fingerprint.to_string(),
        auth_method: method,
    }
}

async fn record_count(store: &MemoryStore) -> usize {
    store.list_attendance(&ClassFilter::All).await.unwrap().len()
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn scenario_a_first_biometric_submission_enrolls_device() {
    let h = harness();
    let info = h.service.issue_session(Some("CS101")).await.unwrap();

    let outcome = h
        .service
        .submit(submit_with(&info, "S1", "F1", AuthMethod::Biometric))
        .await
        .unwrap();

    assert_eq!(outcome.status, AttendanceStatus::Present);
    assert!(outcome.reason.is_none());
    assert!(outcome.new_enrollment);
    assert_eq!(outcome.window_id, info.window_id);

    let enrolled = h.store.enrollment("S1").await.unwrap().unwrap();
    assert_eq!(enrolled.fingerprint, "F1");
}

#[tokio::test]
async fn scenario_b_new_device_is_flagged_and_anchor_kept() {
    let h = harness();
    let first = h.service.issue_session(Some("CS101")).await.unwrap();
    h.service
        .submit(submit_with(&first, "S1", "F1", AuthMethod::Biometric))
        .await
        .unwrap();

    h.clock.advance(Duration::seconds(20));
    let next = h.service.issue_session(Some("CS101")).await.unwrap();
    assert_ne!(next.window_id, first.window_id);

    let outcome = h
        .service
        .submit(submit_with(&next, "S1", "F2", AuthMethod::Biometric))
        .await
        .unwrap();

    assert_eq!(outcome.status, AttendanceStatus::Flagged);
    assert_eq!(outcome.reason.as_deref(), Some(DEVICE_REASON));
    assert!(!outcome.new_enrollment);
    assert_eq!(
        h.store.enrollment("S1").await.unwrap().unwrap().fingerprint,
        "F1"
    );
}

#[tokio::test]
async fn scenario_c_first_fallback_submission_flagged_but_enrolled() {
    let h = harness();
    let info = h.service.issue_session(Some("CS101")).await.unwrap();

    let outcome = h
        .service
        .submit(submit_with(&info, "S2", "F3", AuthMethod::Fallback))
        .await
        .unwrap();

    assert_eq!(outcome.status, AttendanceStatus::Flagged);
    assert_eq!(outcome.reason.as_deref(), Some(FALLBACK_REASON));
    assert_eq!(outcome.auth_method, AuthMethod::Fallback);
    assert_eq!(
        h.store.enrollment("S2").await.unwrap().unwrap().fingerprint,
        "F3"
    );
}

#[tokio::test]
async fn scenario_d_wrong_pin_rejected_without_record() {
    let h = harness();
    let first = h.service.issue_session(Some("CS101")).await.unwrap();
    h.service
        .submit(submit_with(&first, "S1", "F1", AuthMethod::Biometric))
        .await
        .unwrap();

    h.clock.advance(Duration::seconds(20));
    let info = h.service.issue_session(Some("CS101")).await.unwrap();
    let mut submission = submit_with(&info, "S1", "F1", AuthMethod::Biometric);
    submission.pin = if info.pin == "0000" { "0001" } else { "0000" }.to_string();

    let err = h.service.submit(submission).await.unwrap_err();
    assert_eq!(err, VerificationError::InvalidPin);
    assert_eq!(err.code(), "INVALID_PIN");
    assert_eq!(record_count(&h.store).await, 1);
}

#[tokio::test]
async fn scenario_e_second_submission_in_window_is_duplicate() {
    let h = harness();
    let info = h.service.issue_session(Some("CS101")).await.unwrap();
    let submission = submit_with(&info, "S1", "F1", AuthMethod::Biometric);

    h.service.submit(submission.clone()).await.unwrap();
    let err = h.service.submit(submission).await.unwrap_err();

    assert_eq!(err, VerificationError::DuplicateSubmission);
    assert_eq!(record_count(&h.store).await, 1);
}

#[tokio::test]
async fn scenario_f_paused_session_does_not_expire() {
    let h = harness();
    let info = h.service.issue_session(Some("CS101")).await.unwrap();
    h.service.pause().await.unwrap();

    h.clock
        .advance(Duration::seconds(DEFAULT_SESSION_DURATION_SECS * 40));

    let outcome = h
        .service
        .submit(submit_with(&info, "S1", "F1", AuthMethod::Biometric))
        .await
        .unwrap();
    assert_eq!(outcome.status, AttendanceStatus::Present);
}

// ============================================================================
// Session window properties
// ============================================================================

#[tokio::test]
async fn expired_session_rejected_without_record() {
    let h = harness();
    let info = h.service.issue_session(Some("CS101")).await.unwrap();
    h.clock
        .advance(Duration::seconds(DEFAULT_SESSION_DURATION_SECS + 1));

    let err = h
        .service
        .submit(submit_with(&info, "S1", "F1", AuthMethod::Biometric))
        .await
        .unwrap_err();
    assert_eq!(err, VerificationError::SessionExpired);
    assert_eq!(record_count(&h.store).await, 0);
    assert!(h.store.enrollment("S1").await.unwrap().is_none());
}

#[tokio::test]
async fn unknown_class_has_no_active_session() {
    let h = harness();
    let info = h.service.issue_session(Some("CS101")).await.unwrap();
    let mut submission = submit_with(&info, "S1", "F1", AuthMethod::Biometric);
    submission.class_id = Some("MATH200".into());

    assert_eq!(
        h.service.submit(submission).await.unwrap_err(),
        VerificationError::NoActiveSession
    );
}

#[tokio::test]
async fn new_session_invalidates_previous_credential() {
    let h = harness();
    for _ in 0..5 {
        let old = h.service.issue_session(Some("CS101")).await.unwrap();
        let new = h.service.issue_session(Some("CS101")).await.unwrap();
        assert_ne!(old.signed_credential, new.signed_credential);

        // Old credential with the new PIN still fails on the credential
        let mut submission = submit_with(&old, "S1", "F1", AuthMethod::Biometric);
        submission.pin = new.pin.clone();
        assert_eq!(
            h.service.submit(submission).await.unwrap_err(),
            VerificationError::InvalidCredential
        );
    }
    assert_eq!(record_count(&h.store).await, 0);
}

#[tokio::test]
async fn sessions_are_independent_across_classes() {
    let h = harness();
    let a = h.service.issue_session(Some("A")).await.unwrap();
    let b = h.service.issue_session(Some("B")).await.unwrap();

    // Credential of room B is not valid for room A
    let mut cross = submit_with(&b, "S1", "F1", AuthMethod::Biometric);
    cross.class_id = Some("A".into());
    assert_eq!(
        h.service.submit(cross).await.unwrap_err(),
        VerificationError::InvalidCredential
    );

    h.service
        .submit(submit_with(&a, "S1", "F1", AuthMethod::Biometric))
        .await
        .unwrap();
    h.service
        .submit(submit_with(&b, "S2", "F9", AuthMethod::Biometric))
        .await
        .unwrap();

    let only_a = h
        .service
        .list_attendance(&ClassFilter::Class("A".into()))
        .await
        .unwrap();
    assert_eq!(only_a.len(), 1);
    assert_eq!(only_a[0].participant_id, "S1");
}

#[tokio::test]
async fn resume_always_grants_full_window() {
    let h = harness();
    for elapsed in [0, 5, 14, 60, 3600] {
        let info = h.service.issue_session(Some("CS101")).await.unwrap();
        h.clock.advance(Duration::seconds(elapsed));
        h.service.pause().await.unwrap();
        h.clock.advance(Duration::seconds(elapsed));
        h.service.resume().await.unwrap();
        assert!(!h.service.pause_status().await);

        let current = h.service.registry().session_info("CS101").await.unwrap();
        assert_eq!(current.window_id, info.window_id);
        assert_eq!(current.expires_in, DEFAULT_SESSION_DURATION_SECS);
        assert!(!current.paused);

        h.clock.advance(Duration::seconds(DEFAULT_SESSION_DURATION_SECS));
        let snapshot = h.service.registry().lookup("CS101").await.unwrap();
        assert!(!snapshot.is_expired(h.clock.now()));
    }
}

#[tokio::test]
async fn resume_restarts_countdown_after_pause() {
    let h = harness();
    let info = h.service.issue_session(Some("CS101")).await.unwrap();
    h.service.pause().await.unwrap();
    h.clock.advance(Duration::minutes(30));
    h.service.resume().await.unwrap();

    h.clock
        .advance(Duration::seconds(DEFAULT_SESSION_DURATION_SECS + 1));
    assert_eq!(
        h.service
            .submit(submit_with(&info, "S1", "F1", AuthMethod::Biometric))
            .await
            .unwrap_err(),
        VerificationError::SessionExpired
    );
}

// ============================================================================
// Enrollment properties
// ============================================================================

#[tokio::test]
async fn enrollment_fingerprint_never_changes_through_submissions() {
    let h = harness();
    let devices = ["F1", "F2", "F3", "F1", "F4"];
    let mut statuses = Vec::new();

    for device in devices {
        let info = h.service.issue_session(Some("CS101")).await.unwrap();
        let outcome = h
            .service
            .submit(submit_with(&info, "S1", device, AuthMethod::Biometric))
            .await
            .unwrap();
        statuses.push(outcome.status);
        h.clock.advance(Duration::seconds(2));

        assert_eq!(
            h.store.enrollment("S1").await.unwrap().unwrap().fingerprint,
            "F1"
        );
    }

    assert_eq!(
        statuses,
        [
            AttendanceStatus::Present,
            AttendanceStatus::Flagged,
            AttendanceStatus::Flagged,
            AttendanceStatus::Present,
            AttendanceStatus::Flagged,
        ]
    );
}

#[tokio::test]
async fn pre_enroll_overwrites_anchor() {
    let h = harness();
    let info = h.service.issue_session(Some("CS101")).await.unwrap();
    h.service
        .submit(submit_with(&info, "S1", "F1", AuthMethod::Biometric))
        .await
        .unwrap();

    h.service.pre_enroll("S1", "Ada", "F2").await.unwrap();
    let enrolled = h.service.enrollment("S1").await.unwrap().unwrap();
    assert_eq!(enrolled.fingerprint, "F2");
    assert_eq!(enrolled.name, "Ada");

    h.clock.advance(Duration::seconds(2));
    let next = h.service.issue_session(Some("CS101")).await.unwrap();
    let outcome = h
        .service
        .submit(submit_with(&next, "S1", "F2", AuthMethod::Biometric))
        .await
        .unwrap();
    assert_eq!(outcome.status, AttendanceStatus::Present);
    assert_eq!(outcome.name, "Ada");
}

#[tokio::test]
async fn fallback_on_enrolled_device_is_flagged() {
    let h = harness();
    h.service.pre_enroll("S1", "Ada", "F1").await.unwrap();
    let info = h.service.issue_session(Some("CS101")).await.unwrap();

    let outcome = h
        .service
        .submit(submit_with(&info, "S1", "F1", AuthMethod::Fallback))
        .await
        .unwrap();
    assert_eq!(outcome.status, AttendanceStatus::Flagged);
    assert_eq!(outcome.reason.as_deref(), Some(FALLBACK_REASON));
}

// ============================================================================
// Duplicate suppression under concurrency
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_identical_submissions_record_once() {
    let h = harness();
    let info = h.service.issue_session(Some("CS101")).await.unwrap();
    let submission = submit_with(&info, "S1", "F1", AuthMethod::Biometric);

    let mut tasks = Vec::new();
    for _ in 0..32 {
        let service = h.service.clone();
        let submission = submission.clone();
        tasks.push(tokio::spawn(async move { service.submit(submission).await }));
    }

    let mut accepted = 0;
    let mut duplicates = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => accepted += 1,
            Err(VerificationError::DuplicateSubmission) => duplicates += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(accepted, 1);
    assert_eq!(duplicates, 31);
    assert_eq!(record_count(&h.store).await, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_participants_all_recorded() {
    let h = harness();
    let info = h.service.issue_session(Some("CS101")).await.unwrap();

    let mut tasks = Vec::new();
    for i in 0..20 {
        let service = h.service.clone();
        let submission = submit_with(&info, &format!("S{i}"), &format!("F{i}"), AuthMethod::Biometric);
        tasks.push(tokio::spawn(async move { service.submit(submission).await }));
    }
    for task in tasks {
        assert!(task.await.unwrap().is_ok());
    }
    assert_eq!(record_count(&h.store).await, 20);
}

// ============================================================================
// Moderation
// ============================================================================

#[tokio::test]
async fn approve_and_reject_bypass_classifier() {
    let h = harness();
    let info = h.service.issue_session(Some("CS101")).await.unwrap();
    let flagged = h
        .service
        .submit(submit_with(&info, "S1", "F1", AuthMethod::Fallback))
        .await
        .unwrap();
    let present = h
        .service
        .submit(submit_with(&info, "S2", "F2", AuthMethod::Biometric))
        .await
        .unwrap();

    assert!(h
        .service
        .set_record_status(flagged.record_id, Moderation::Approve)
        .await
        .unwrap());
    assert!(h
        .service
        .set_record_status(present.record_id, Moderation::Reject)
        .await
        .unwrap());
    assert!(!h
        .service
        .set_record_status(present.record_id, Moderation::Reject)
        .await
        .unwrap());

    let feed = h.service.attendance_feed(&ClassFilter::All).await.unwrap();
    assert_eq!(feed.total, 1);
    assert_eq!(feed.present.len(), 1);
    assert_eq!(feed.present[0].participant_id, "S1");
    assert!(feed.present[0].reason.is_none());

    // A rejected submission may be resubmitted in the same window
    let again = h
        .service
        .submit(submit_with(&info, "S2", "F2", AuthMethod::Biometric))
        .await
        .unwrap();
    assert_eq!(again.status, AttendanceStatus::Present);
}

#[tokio::test]
async fn clear_attendance_by_class_and_all() {
    let h = harness();
    let a = h.service.issue_session(Some("A")).await.unwrap();
    let b = h.service.issue_session(Some("B")).await.unwrap();
    for (info, participant) in [(&a, "S1"), (&a, "S2"), (&b, "S3")] {
        h.service
            .submit(submit_with(info, participant, participant, AuthMethod::Biometric))
            .await
            .unwrap();
    }

    assert_eq!(
        h.service
            .clear_attendance(&ClassFilter::Class("A".into()))
            .await
            .unwrap(),
        2
    );
    assert_eq!(h.service.clear_attendance(&ClassFilter::All).await.unwrap(), 1);
    assert_eq!(record_count(&h.store).await, 0);
}

// ============================================================================
// Storage failures
// ============================================================================

/// Store that delegates to memory but fails every attendance write.
struct FailingWrites {
    inner: MemoryStore,
}

#[async_trait]
impl AttendanceStore for FailingWrites {
    async fn supersede_session(&self, session: &Session) -> Result<(), StorageError> {
        self.inner.supersede_session(session).await
    }

    async fn current_session(&self, class_id: &str) -> Result<Option<Session>, StorageError> {
        self.inner.current_session(class_id).await
    }

    async fn set_all_session_expiry(
        &self,
        expires_at: DateTime<Utc>,
    ) -> Result<u64, StorageError> {
        self.inner.set_all_session_expiry(expires_at).await
    }

    async fn enrollment(&self, participant_id: &str) -> Result<Option<Enrollment>, StorageError> {
        self.inner.enrollment(participant_id).await
    }

    async fn upsert_enrollment(
        &self,
        enrollment: NewEnrollment,
        enrolled_at: DateTime<Utc>,
    ) -> Result<Enrollment, StorageError> {
        self.inner.upsert_enrollment(enrollment, enrolled_at).await
    }

    async fn has_counted_record(
        &self,
        participant_id: &str,
        window_id: &str,
    ) -> Result<bool, StorageError> {
        self.inner.has_counted_record(participant_id, window_id).await
    }

    async fn record_attendance(
        &self,
        _record: NewAttendance,
        _enrollment: Option<NewEnrollment>,
    ) -> Result<AttendanceRecord, StorageError> {
        Err(StorageError::Connection("connection reset".into()))
    }

    async fn list_attendance(
        &self,
        _filter: &ClassFilter,
    ) -> Result<Vec<AttendanceRecord>, StorageError> {
        Err(StorageError::Query("relation does not exist".into()))
    }

    async fn approve_record(&self, id: i64) -> Result<bool, StorageError> {
        self.inner.approve_record(id).await
    }

    async fn delete_record(&self, id: i64) -> Result<bool, StorageError> {
        self.inner.delete_record(id).await
    }

    async fn clear_attendance(&self, filter: &ClassFilter) -> Result<u64, StorageError> {
        self.inner.clear_attendance(filter).await
    }

    fn is_persistent(&self) -> bool {
        false
    }
}

#[tokio::test]
async fn storage_failure_surfaces_as_its_own_kind() {
    init_tracing();
    let store = Arc::new(FailingWrites {
        inner: MemoryStore::new(),
    });
    let service = AttendanceService::new(
        CredentialIssuer::new("failing-store-key").unwrap(),
        store.clone(),
        Arc::new(ManualClock::default()),
        RegistryConfig::default(),
    );

    let info = service.issue_session(None).await.unwrap();
    assert_eq!(info.class_id, "DEFAULT");

    let err = service
        .submit(submit_with(&info, "S1", "F1", AuthMethod::Biometric))
        .await
        .unwrap_err();
    assert!(matches!(err, VerificationError::StorageFailure(_)));
    assert_eq!(err.code(), "STORAGE_FAILURE");

    // Nothing partial: the enrollment rides on the failed write
    assert!(store.inner.enrollment("S1").await.unwrap().is_none());

    let err = service.list_attendance(&ClassFilter::All).await.unwrap_err();
    assert!(matches!(err, VerificationError::StorageFailure(_)));
}

/// Store whose session writes can be switched to fail.
struct FailingSessionWrites {
    inner: MemoryStore,
    failing: AtomicBool,
}

impl FailingSessionWrites {
    fn check(&self) -> Result<(), StorageError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StorageError::Connection("connection refused".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl AttendanceStore for FailingSessionWrites {
    async fn supersede_session(&self, session: &Session) -> Result<(), StorageError> {
        self.check()?;
        self.inner.supersede_session(session).await
    }

    async fn current_session(&self, class_id: &str) -> Result<Option<Session>, StorageError> {
        self.inner.current_session(class_id).await
    }

    async fn set_all_session_expiry(
        &self,
        expires_at: DateTime<Utc>,
    ) -> Result<u64, StorageError> {
        self.check()?;
        self.inner.set_all_session_expiry(expires_at).await
    }

    async fn enrollment(&self, participant_id: &str) -> Result<Option<Enrollment>, StorageError> {
        self.inner.enrollment(participant_id).await
    }

    async fn upsert_enrollment(
        &self,
        enrollment: NewEnrollment,
        enrolled_at: DateTime<Utc>,
    ) -> Result<Enrollment, StorageError> {
        self.inner.upsert_enrollment(enrollment, enrolled_at).await
    }

    async fn has_counted_record(
        &self,
        participant_id: &str,
        window_id: &str,
    ) -> Result<bool, StorageError> {
        self.inner.has_counted_record(participant_id, window_id).await
    }

    async fn record_attendance(
        &self,
        record: NewAttendance,
        enrollment: Option<NewEnrollment>,
    ) -> Result<AttendanceRecord, StorageError> {
        self.inner.record_attendance(record, enrollment).await
    }

    async fn list_attendance(
        &self,
        filter: &ClassFilter,
    ) -> Result<Vec<AttendanceRecord>, StorageError> {
        self.inner.list_attendance(filter).await
    }

    async fn approve_record(&self, id: i64) -> Result<bool, StorageError> {
        self.inner.approve_record(id).await
    }

    async fn delete_record(&self, id: i64) -> Result<bool, StorageError> {
        self.inner.delete_record(id).await
    }

    async fn clear_attendance(&self, filter: &ClassFilter) -> Result<u64, StorageError> {
        self.inner.clear_attendance(filter).await
    }

    fn is_persistent(&self) -> bool {
        false
    }
}

#[tokio::test]
async fn failed_session_writes_leave_registry_unchanged() {
    init_tracing();
    let store = Arc::new(FailingSessionWrites {
        inner: MemoryStore::new(),
        failing: AtomicBool::new(false),
    });
    let clock = Arc::new(ManualClock::default());
    let service = AttendanceService::new(
        CredentialIssuer::new("failing-session-key").unwrap(),
        store.clone(),
        clock.clone(),
        RegistryConfig::default(),
    );

    let first = service.issue_session(Some("ROOM")).await.unwrap();
    store.failing.store(true, Ordering::SeqCst);

    // Supersede fails: the previous session stays current
    let err = service.issue_session(Some("ROOM")).await.unwrap_err();
    assert!(matches!(err, VerificationError::StorageFailure(_)));
    let snapshot = service.registry().lookup("ROOM").await.unwrap();
    assert_eq!(snapshot.session.signed_credential, first.signed_credential);
    assert_eq!(snapshot.session.expires_at, first.expires_at);

    // Pause fails: not paused, expiry not frozen
    let err = service.pause().await.unwrap_err();
    assert!(matches!(err, VerificationError::StorageFailure(_)));
    assert!(!service.pause_status().await);
    let snapshot = service.registry().lookup("ROOM").await.unwrap();
    assert!(!snapshot.paused);
    assert_eq!(snapshot.session.expires_at, first.expires_at);

    // Resume fails while paused: stays paused with the frozen expiry
    store.failing.store(false, Ordering::SeqCst);
    service.pause().await.unwrap();
    let frozen = service.registry().lookup("ROOM").await.unwrap().session.expires_at;
    store.failing.store(true, Ordering::SeqCst);

    clock.advance(Duration::seconds(DEFAULT_SESSION_DURATION_SECS + 5));
    let err = service.resume().await.unwrap_err();
    assert!(matches!(err, VerificationError::StorageFailure(_)));
    assert!(service.pause_status().await);
    let snapshot = service.registry().lookup("ROOM").await.unwrap();
    assert!(snapshot.paused);
    assert_eq!(snapshot.session.expires_at, frozen);
    assert!(!snapshot.is_expired(clock.now()));
}

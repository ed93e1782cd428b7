//! Attendance verification pipeline.
//!
//! One submission is checked against the current session of its class
//! (expiry, credential, PIN), de-duplicated per (participant, window), and
//! classified by device trust before exactly one attendance record is written.
//! Every rejection happens before the write; nothing partial is ever stored.

use std::sync::Arc;

use tracing::instrument;

use crate::clock::Clock;
use crate::credential::CredentialIssuer;
use crate::error::{Result, StorageError, VerificationError};
use crate::locks::KeyedLocks;
use crate::model::{class_id_or_default, AttendanceOutcome, NewAttendance, NewEnrollment};
use crate::registry::{RegistryConfig, SessionRegistry};
use crate::store::AttendanceStore;
use crate::trust::{self, AuthMethod};

/// One attendance submission as received from a participant's device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    /// Class/room; empty or absent means the default class
    pub class_id: Option<String>,
    pub participant_id: String,
    /// Falls back to the enrolled name, then to the participant id
    pub display_name: Option<String>,
    /// Signed credential as displayed by the presenter
    pub credential: String,
    pub pin: String,
    /// Opaque device fingerprint supplied by the client
    pub fingerprint: String,
    pub auth_method: AuthMethod,
}

/// The attendance engine: session registry, verification pipeline and the
/// administrative operations around them.
///
/// Construct once at startup and share behind an `Arc`.
pub struct AttendanceService {
    pub(crate) registry: SessionRegistry,
    pub(crate) store: Arc<dyn AttendanceStore>,
    pub(crate) clock: Arc<dyn Clock>,
    /// Serializes duplicate-check-then-insert per participant
    participants: KeyedLocks,
}

impl AttendanceService {
    pub fn new(
        issuer: CredentialIssuer,
        store: Arc<dyn AttendanceStore>,
        clock: Arc<dyn Clock>,
        config: RegistryConfig,
    ) -> Self {
        Self {
            registry: SessionRegistry::new(issuer, store.clone(), clock.clone(), config),
            store,
            clock,
            participants: KeyedLocks::new(),
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn store(&self) -> &Arc<dyn AttendanceStore> {
        &self.store
    }

    /// Verify and record one submission.
    #[instrument(
        level = "info",
        skip_all,
        fields(
            class_id = tracing::field::Empty,
            participant_id = %submission.participant_id,
            auth_method = submission.auth_method.as_str(),
        )
    )]
    pub async fn submit(&self, submission: Submission) -> Result<AttendanceOutcome> {
        let class_id = class_id_or_default(submission.class_id.as_deref());
        tracing::Span::current().record("class_id", class_id.as_str());

        let result = self.verify_and_record(&class_id, submission).await;
        match &result {
            Ok(outcome) => tracing::info!(
                status = %outcome.status,
                window_id = %outcome.window_id,
                new_enrollment = outcome.new_enrollment,
                "Attendance recorded"
            ),
            Err(e) if e.is_rejection() => {
                tracing::info!(code = e.code(), "Attendance submission rejected")
            }
            Err(e) => tracing::error!(error = %e, "Attendance submission failed"),
        }
        result
    }

    async fn verify_and_record(
        &self,
        class_id: &str,
        submission: Submission,
    ) -> Result<AttendanceOutcome> {
        let participant_id = submission.participant_id;
        let name = self
            .resolve_name(&participant_id, submission.display_name)
            .await?;

        let window = self.registry.lookup(class_id).await?;
        if window.is_expired(self.clock.now()) {
            return Err(VerificationError::SessionExpired);
        }

        if submission.credential != window.session.signed_credential {
            return Err(VerificationError::InvalidCredential);
        }
        if submission.pin != window.session.pin {
            return Err(VerificationError::InvalidPin);
        }

        let window_id = window.session.window_id;
        let _section = self.participants.lock(&participant_id).await;

        if self
            .store
            .has_counted_record(&participant_id, &window_id)
            .await?
        {
            return Err(VerificationError::DuplicateSubmission);
        }

        let enrolled = self.store.enrollment(&participant_id).await?;
        let decision = trust::decide(
            enrolled.as_ref().map(|e| e.fingerprint.as_str()),
            &submission.fingerprint,
            submission.auth_method,
        );

        let enrollment = decision.enroll.then(|| NewEnrollment {
            participant_id: participant_id.clone(),
            name: name.clone(),
            fingerprint: submission.fingerprint.clone(),
        });

        let record = NewAttendance {
            participant_id,
            name,
            status: decision.verdict.status(),
            reason: decision.verdict.reason().map(|r| r.to_string()),
            recorded_at: self.clock.now(),
            class_id: class_id.to_string(),
            window_id,
            fingerprint: submission.fingerprint,
        };

        let stored = self
            .store
            .record_attendance(record, enrollment)
            .await
            .map_err(|e| match e {
                StorageError::UniqueViolation(_) => VerificationError::DuplicateSubmission,
                other => VerificationError::StorageFailure(other),
            })?;

        Ok(AttendanceOutcome {
            record_id: stored.id,
            status: stored.status,
            reason: stored.reason,
            participant_id: stored.participant_id,
            name: stored.name,
            auth_method: submission.auth_method,
            window_id: stored.window_id,
            new_enrollment: decision.enroll,
        })
    }

    async fn resolve_name(&self, participant_id: &str, given: Option<String>) -> Result<String> {
        if let Some(name) = given.filter(|n| !n.trim().is_empty()) {
            return Ok(name);
        }

        let enrolled = self
            .store
            .enrollment(participant_id)
            .await?
            .map(|e| e.name)
            .filter(|n| !n.is_empty());

        Ok(enrolled.unwrap_or_else(|| participant_id.to_string()))
    }
}

impl std::fmt::Debug for AttendanceService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttendanceService")
            .field("registry", &self.registry)
            .field("participants", &self.participants)
            .finish()
    }
}

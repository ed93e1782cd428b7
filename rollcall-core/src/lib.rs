//! Rollcall Core - session and trust verification engine for in-person attendance
//!
//! A presenter displays a short-lived signed credential and a PIN. Each
//! participant submits both, together with a device fingerprint and the
//! authentication factor they used, within the validity window.
//!
//! # Components
//!
//! - [`CredentialIssuer`] - rotating `window:nonce` credentials signed with HMAC-SHA256
//! - [`SessionRegistry`] - one live session per class/room, global pause/resume
//! - [`trust::decide`] - device-trust classification against the enrolled fingerprint
//! - [`AttendanceService`] - the verification pipeline and moderation operations
//! - [`AttendanceStore`] - storage contract, with an in-memory implementation
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use rollcall_core::{
//!     AttendanceService, AuthMethod, CredentialIssuer, MemoryStore, RegistryConfig,
//!     Submission, SystemClock,
//! };
//!
//! # async fn example() -> rollcall_core::Result<()> {
//! let issuer = CredentialIssuer::new("process-lifetime-secret").expect("non-empty key");
//! let service = AttendanceService::new(
//!     issuer,
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(SystemClock),
//!     RegistryConfig::default(),
//! );
//!
//! // Presenter side
//! let session = service.issue_session(Some("CS101")).await?;
//!
//! // Participant side
//! let outcome = service
//!     .submit(Submission {
//!         class_id: Some("CS101".into()),
//!         participant_id: "S1".into(),
//!         display_name: Some("Ada".into()),
//!         credential: session.signed_credential.clone(),
//!         pin: session.pin.clone(),
//!         fingerprint: "device-hash".into(),
//!         auth_method: AuthMethod::Biometric,
//!     })
//!     .await?;
//! println!("{} is {}", outcome.name, outcome.status);
//! # Ok(())
//! # }
//! ```

mod admin;
pub mod clock;
pub mod credential;
pub mod error;
pub mod locks;
pub mod model;
pub mod pipeline;
pub mod registry;
pub mod store;
pub mod trust;

pub use clock::{Clock, ManualClock, SystemClock};
pub use credential::{CredentialError, CredentialIssuer, IssuedCredential, PIN_DIGITS};
pub use error::{Result, StorageError, VerificationError};
pub use model::{
    class_id_or_default, AttendanceFeed, AttendanceOutcome, AttendanceRecord, AttendanceStatus,
    ClassFilter, Enrollment, Moderation, NewAttendance, NewEnrollment, Session, SessionInfo,
    DEFAULT_CLASS_ID,
};
pub use pipeline::{AttendanceService, Submission};
pub use registry::{
    RegistryConfig, SessionRegistry, WindowSnapshot, DEFAULT_SESSION_DURATION_SECS,
    PAUSED_EXPIRES_IN_SECS,
};
pub use store::{AttendanceStore, MemoryStore};
pub use trust::{AuthMethod, FlagReason, TrustDecision, Verdict};

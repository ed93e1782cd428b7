//! Session window registry.
//!
//! Holds the current session of every class/room and the process-wide pause
//! flag. Starting a session supersedes the previous one for that class.
//! Pausing freezes every live session by pushing its expiry far into the
//! future; resuming grants every live session a fresh full window.
//!
//! The pause flag and the expiry cache sit behind a single reader/writer lock.
//! Writers (start, pause, resume) hold the write guard across their storage
//! write, so readers never see a pause flag and an expiry that disagree.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;

use crate::clock::Clock;
use crate::credential::CredentialIssuer;
use crate::error::{Result, VerificationError};
use crate::model::{Session, SessionInfo};
use crate::store::AttendanceStore;

/// `expires_in` reported for sessions while the registry is paused.
pub const PAUSED_EXPIRES_IN_SECS: i64 = 999_999;

/// Default validity of a freshly started or resumed session (15 seconds).
pub const DEFAULT_SESSION_DURATION_SECS: i64 = 15;

/// How far expiry is pushed while paused (365 days).
const PAUSED_EXTENSION_DAYS: i64 = 365;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Validity window of an active, unpaused session
    pub session_duration: Duration,
    /// Expiry offset applied while paused
    pub paused_extension: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            session_duration: Duration::seconds(DEFAULT_SESSION_DURATION_SECS),
            paused_extension: Duration::days(PAUSED_EXTENSION_DAYS),
        }
    }
}

#[derive(Debug, Default)]
struct RegistryState {
    paused: bool,
    /// class_id -> expiry of its current session
    expiries: HashMap<String, DateTime<Utc>>,
}

/// The current session of a class together with the pause flag, read
/// under one guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowSnapshot {
    pub session: Session,
    pub paused: bool,
}

impl WindowSnapshot {
    /// Expired means unpaused and strictly past the expiry instant.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        !self.paused && now > self.session.expires_at
    }
}

pub struct SessionRegistry {
    issuer: CredentialIssuer,
    store: Arc<dyn AttendanceStore>,
    clock: Arc<dyn Clock>,
    config: RegistryConfig,
    state: RwLock<RegistryState>,
}

impl SessionRegistry {
    pub fn new(
        issuer: CredentialIssuer,
        store: Arc<dyn AttendanceStore>,
        clock: Arc<dyn Clock>,
        config: RegistryConfig,
    ) -> Self {
        Self {
            issuer,
            store,
            clock,
            config,
            state: RwLock::new(RegistryState::default()),
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn issuer(&self) -> &CredentialIssuer {
        &self.issuer
    }

    /// Issue a new credential and PIN for `class_id`, replacing any previous
    /// session of that class. The old credential stops verifying immediately.
    pub async fn start_session(&self, class_id: &str) -> Result<SessionInfo> {
        let mut state = self.state.write().await;
        let now = self.clock.now();

        let issued = self.issuer.issue(class_id, now);
        let expires_at = self.expiry_from(now, state.paused);

        let session = Session {
            window_id: issued.window_id,
            class_id: class_id.to_string(),
            signed_credential: issued.signed_credential,
            pin: issued.pin,
            expires_at,
        };

        self.store.supersede_session(&session).await?;
        state.expiries.insert(class_id.to_string(), expires_at);

        tracing::info!(
            class_id = %class_id,
            window_id = %session.window_id,
            paused = state.paused,
            "Session started"
        );

        Ok(self.describe(session, state.paused, now))
    }

    /// Freeze every live session. Idempotent.
    pub async fn pause_all(&self) -> Result<()> {
        let mut state = self.state.write().await;
        let frozen_until = self.clock.now() + self.config.paused_extension;

        let touched = self.store.set_all_session_expiry(frozen_until).await?;
        state.paused = true;
        for expiry in state.expiries.values_mut() {
            *expiry = frozen_until;
        }

        tracing::info!(sessions = touched, "Session timers paused");
        Ok(())
    }

    /// Give every live session a fresh full window and clear the pause flag.
    ///
    /// Time elapsed before the pause is not carried over.
    pub async fn resume_all(&self) -> Result<()> {
        let mut state = self.state.write().await;
        let expires_at = self.clock.now() + self.config.session_duration;

        let touched = self.store.set_all_session_expiry(expires_at).await?;
        state.paused = false;
        for expiry in state.expiries.values_mut() {
            *expiry = expires_at;
        }

        tracing::info!(sessions = touched, "Session timers resumed");
        Ok(())
    }

    pub async fn status(&self) -> bool {
        self.state.read().await.paused
    }

    /// Current session of `class_id` and the pause flag.
    ///
    /// Fails with [`VerificationError::NoActiveSession`] if no session was
    /// ever started for the class.
    pub async fn lookup(&self, class_id: &str) -> Result<WindowSnapshot> {
        let state = self.state.read().await;

        let mut session = self
            .store
            .current_session(class_id)
            .await?
            .ok_or(VerificationError::NoActiveSession)?;

        // Sessions loaded from storage after a restart have no cached expiry
        if let Some(expiry) = state.expiries.get(class_id) {
            session.expires_at = *expiry;
        }

        Ok(WindowSnapshot {
            session,
            paused: state.paused,
        })
    }

    /// Display form of the current session of `class_id`.
    pub async fn session_info(&self, class_id: &str) -> Result<SessionInfo> {
        let snapshot = self.lookup(class_id).await?;
        Ok(self.describe(snapshot.session, snapshot.paused, self.clock.now()))
    }

    fn expiry_from(&self, now: DateTime<Utc>, paused: bool) -> DateTime<Utc> {
        if paused {
            now + self.config.paused_extension
        } else {
            now + self.config.session_duration
        }
    }

    fn describe(&self, session: Session, paused: bool, now: DateTime<Utc>) -> SessionInfo {
        let expires_in = if paused {
            PAUSED_EXPIRES_IN_SECS
        } else {
            (session.expires_at - now).num_seconds().max(0)
        };

        SessionInfo {
            class_id: session.class_id,
            window_id: session.window_id,
            signed_credential: session.signed_credential,
            pin: session.pin,
            expires_in,
            expires_at: session.expires_at,
            paused,
        }
    }
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("config", &self.config)
            .field("persistent", &self.store.is_persistent())
            .finish()
    }
}

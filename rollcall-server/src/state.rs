//! Application state module
//!
//! Defines shared state accessible across all request handlers.

use std::sync::Arc;

use rand::distributions::Alphanumeric;
use rand::Rng;
use rollcall_core::{
    AttendanceService, AttendanceStore, Clock, CredentialError, CredentialIssuer, MemoryStore,
    RegistryConfig, SystemClock,
};

use crate::config::Config;

const GENERATED_KEY_LEN: usize = 48;

/// Application state containing shared resources.
#[derive(Clone)]
pub struct AppState {
    /// Verification engine: session registry, pipeline and moderation
    pub service: Arc<AttendanceService>,
}

impl AppState {
    /// Build the engine over `store`, reading time from `clock`.
    pub fn new(
        config: &Config,
        store: Arc<dyn AttendanceStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, CredentialError> {
        let issuer = CredentialIssuer::new(signing_key(config))?;
        let registry_config = RegistryConfig {
            session_duration: config.session_duration(),
            ..RegistryConfig::default()
        };

        Ok(Self {
            service: Arc::new(AttendanceService::new(
                issuer,
                store,
                clock,
                registry_config,
            )),
        })
    }

    /// In-memory storage on the wall clock.
    pub fn in_memory(config: &Config) -> Result<Self, CredentialError> {
        Self::new(config, Arc::new(MemoryStore::new()), Arc::new(SystemClock))
    }

    /// Storage backend name for health reporting
    pub fn storage_backend(&self) -> &'static str {
        if self.service.store().is_persistent() {
            "postgres"
        } else {
            "memory"
        }
    }
}

/// Configured key, or a random one that lives as long as the process.
fn signing_key(config: &Config) -> Vec<u8> {
    match &config.signing_key {
        Some(key) => key.as_bytes().to_vec(),
        None => {
            tracing::warn!(
                "SESSION_SIGNING_KEY not set, using a random per-process key (dev mode)"
            );
            rand::thread_rng()
                .sample_iter(&Alphanumeric)
                .take(GENERATED_KEY_LEN)
                .collect()
        }
    }
}

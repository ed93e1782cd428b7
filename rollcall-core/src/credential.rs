//! Rotating session credentials.
//!
//! A credential is `window_id:nonce`, signed with HMAC-SHA256 under a key that
//! stays fixed for the lifetime of the process. The signed form displayed to
//! participants is `window_id:nonce:hex(mac)`.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use rand::Rng;
use sha2::Sha256;
use thiserror::Error;
use zeroize::Zeroizing;

type HmacSha256 = Hmac<Sha256>;

/// Number of decimal digits in a session PIN.
pub const PIN_DIGITS: usize = 4;

const PIN_SPACE: u32 = 10_000;

/// Errors raised while preparing the signing key.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CredentialError {
    #[error("signing key must not be empty")]
    EmptyKey,

    #[error("invalid signing key: {0}")]
    InvalidKey(String),
}

/// A freshly generated credential, ready to be stored and displayed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedCredential {
    /// Unix seconds at issue time, as a decimal string
    pub window_id: String,
    /// `window_id:nonce:signature`
    pub signed_credential: String,
    /// Zero-padded 4-digit secondary factor
    pub pin: String,
}

/// Generates and signs rotating session credentials.
#[derive(Clone)]
pub struct CredentialIssuer {
    mac: HmacSha256,
}

impl CredentialIssuer {
    /// Key the issuer. The issuer's own copy of the secret is wiped once the
    /// MAC state has been derived from it. Copies kept by the caller are not.
    pub fn new(secret: impl Into<Vec<u8>>) -> Result<Self, CredentialError> {
        let secret = Zeroizing::new(secret.into());
        if secret.is_empty() {
            return Err(CredentialError::EmptyKey);
        }

        let mac = HmacSha256::new_from_slice(&secret)
            .map_err(|e| CredentialError::InvalidKey(e.to_string()))?;

        Ok(Self { mac })
    }

    /// Issue a credential for `class_id` with a window id derived from `now`.
    ///
    /// Two calls within the same second share a window id; they still differ
    /// in nonce and the registry keeps only the latest one per class.
    pub fn issue(&self, class_id: &str, now: DateTime<Utc>) -> IssuedCredential {
        let mut rng = rand::thread_rng();

        let window_id = now.timestamp().to_string();
        let nonce: i64 = rng.gen_range(0..i64::MAX);
        let credential = format!("{window_id}:{nonce}");
        let signature = self.sign(&credential);
        let pin = format!("{:0width$}", rng.gen_range(0..PIN_SPACE), width = PIN_DIGITS);

        tracing::debug!(class_id = %class_id, window_id = %window_id, "Issued session credential");

        IssuedCredential {
            window_id,
            signed_credential: format!("{credential}:{signature}"),
            pin,
        }
    }

    /// Hex-encoded HMAC-SHA256 of `credential`.
    pub fn sign(&self, credential: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(credential.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Check that `signed_credential` carries a valid signature from this key.
    ///
    /// Comparison of the MAC is constant time. A malformed credential is
    /// simply invalid.
    pub fn verify_signature(&self, signed_credential: &str) -> bool {
        let Some((credential, signature)) = signed_credential.rsplit_once(':') else {
            return false;
        };
        if !credential.contains(':') {
            return false;
        }
        let Ok(signature) = hex::decode(signature) else {
            return false;
        };

        let mut mac = self.mac.clone();
        mac.update(credential.as_bytes());
        mac.verify_slice(&signature).is_ok()
    }
}

impl std::fmt::Debug for CredentialIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialIssuer")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

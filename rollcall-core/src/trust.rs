//! Device trust classification.
//!
//! The first device a participant submits from becomes their trust anchor.
//! Later submissions are compared against it, together with the
//! authentication factor the client asserts it used.

use serde::{Deserialize, Serialize};

use crate::model::AttendanceStatus;

/// Authentication factor asserted by the submitting client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMethod {
    /// Primary factor (platform biometric)
    #[default]
    Biometric,
    /// Device PIN/pattern used instead of the biometric
    Fallback,
}

impl AuthMethod {
    /// Parse the wire value. Only `"fallback"` selects the fallback factor;
    /// anything else, including an absent value, is the primary factor.
    pub fn from_wire(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("fallback") => Self::Fallback,
            _ => Self::Biometric,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Biometric => "biometric",
            Self::Fallback => "fallback",
        }
    }
}

/// Why a submission was flagged for review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlagReason {
    FallbackAuth,
    DifferentDevice,
}

impl FlagReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FallbackAuth => "used PIN/pattern fallback instead of biometric",
            Self::DifferentDevice => "different device detected",
        }
    }
}

impl std::fmt::Display for FlagReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Present,
    Flagged(FlagReason),
}

impl Verdict {
    pub fn status(&self) -> AttendanceStatus {
        match self {
            Self::Present => AttendanceStatus::Present,
            Self::Flagged(_) => AttendanceStatus::Flagged,
        }
    }

    pub fn reason(&self) -> Option<FlagReason> {
        match self {
            Self::Present => None,
            Self::Flagged(reason) => Some(*reason),
        }
    }
}

/// Outcome of classifying one submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrustDecision {
    pub verdict: Verdict,
    /// The asserted fingerprint should be enrolled as the new trust anchor
    pub enroll: bool,
}

/// Classify a submission against the participant's enrolled fingerprint.
///
/// Rules, first match wins:
/// 1. nothing enrolled: enroll, flag if the fallback factor was used
/// 2. fingerprint differs from the enrolled one: flag as different device
/// 3. fallback factor used: flag
/// 4. otherwise present
///
/// An empty enrolled fingerprint counts as nothing enrolled. This never
/// replaces an existing enrollment.
pub fn decide(enrolled: Option<&str>, fingerprint: &str, method: AuthMethod) -> TrustDecision {
    let fallback = method == AuthMethod::Fallback;

    match enrolled.filter(|fp| !fp.is_empty()) {
        None => TrustDecision {
            verdict: if fallback {
                Verdict::Flagged(FlagReason::FallbackAuth)
            } else {
                Verdict::Present
            },
            enroll: true,
        },
        Some(anchor) if anchor != fingerprint => TrustDecision {
            verdict: Verdict::Flagged(FlagReason::DifferentDevice),
            enroll: false,
        },
        Some(_) if fallback => TrustDecision {
            verdict: Verdict::Flagged(FlagReason::FallbackAuth),
            enroll: false,
        },
        Some(_) => TrustDecision {
            verdict: Verdict::Present,
            enroll: false,
        },
    }
}

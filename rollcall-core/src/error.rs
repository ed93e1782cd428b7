use thiserror::Error;

/// Failures raised by an [`AttendanceStore`](crate::store::AttendanceStore) backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("Database connection error: {0}")]
    Connection(String),

    #[error("Database migration error: {0}")]
    Migration(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A uniqueness rule enforced by the storage layer rejected a write.
    #[error("Uniqueness violation: {0}")]
    UniqueViolation(String),
}

/// Closed set of reasons an attendance submission (or a registry operation)
/// can fail. Every variant is terminal for the request that raised it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerificationError {
    #[error("No active session")]
    NoActiveSession,

    #[error("Session expired")]
    SessionExpired,

    #[error("Invalid credential")]
    InvalidCredential,

    #[error("Invalid PIN")]
    InvalidPin,

    #[error("Already marked attendance")]
    DuplicateSubmission,

    #[error("Storage failure: {0}")]
    StorageFailure(#[from] StorageError),
}

impl VerificationError {
    /// Stable machine-readable code, safe to branch on in clients.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NoActiveSession => "NO_ACTIVE_SESSION",
            Self::SessionExpired => "SESSION_EXPIRED",
            Self::InvalidCredential => "INVALID_CREDENTIAL",
            Self::InvalidPin => "INVALID_PIN",
            Self::DuplicateSubmission => "DUPLICATE_SUBMISSION",
            Self::StorageFailure(_) => "STORAGE_FAILURE",
        }
    }

    /// True when the participant (not the server) caused the rejection.
    pub fn is_rejection(&self) -> bool {
        !matches!(self, Self::StorageFailure(_))
    }
}

pub type Result<T> = std::result::Result<T, VerificationError>;

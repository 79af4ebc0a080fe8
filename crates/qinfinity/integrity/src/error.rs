use qinfinity_types::ErrorKind;
use thiserror::Error;

pub type IntegrityResult<T> = Result<T, IntegrityError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IntegrityError {
    #[error("attestation check failed: {check}: {reason}")]
    CheckNonCompliant { check: String, reason: String },

    #[error("kill-first-launcher test failed: {0}")]
    KillTestFailed(String),

    #[error("attestation publication failed: {0}")]
    PublicationFailed(String),

    #[error("internal integrity error: {0}")]
    Internal(String),
}

impl IntegrityError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            IntegrityError::CheckNonCompliant { .. } => ErrorKind::Validation,
            IntegrityError::KillTestFailed(_) => ErrorKind::IntegrityViolation,
            IntegrityError::PublicationFailed(_) => ErrorKind::Timeout,
            IntegrityError::Internal(_) => ErrorKind::Internal,
        }
    }
}

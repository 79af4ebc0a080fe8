use qinfinity_types::ErrorKind;
use thiserror::Error;

pub type PortResult<T> = Result<T, PortError>;

/// Errors surfaced across a capability-port boundary.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PortError {
    #[error("capability unavailable: {0}")]
    Unavailable(String),

    #[error("capability timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: String, available: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("io error: {0}")]
    Io(String),

    #[error("internal capability error: {0}")]
    Internal(String),
}

impl PortError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PortError::Unavailable(_) => ErrorKind::Timeout,
            PortError::Timeout { .. } => ErrorKind::Timeout,
            PortError::InsufficientFunds { .. } => ErrorKind::AuthorizationDenied,
            PortError::NotFound(_) => ErrorKind::NotFound,
            PortError::Serialization(_) => ErrorKind::Internal,
            PortError::Io(_) => ErrorKind::Internal,
            PortError::Internal(_) => ErrorKind::Internal,
        }
    }
}

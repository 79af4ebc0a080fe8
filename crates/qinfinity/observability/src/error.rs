use qinfinity_types::ErrorKind;
use thiserror::Error;

pub type ObservabilityResult<T> = Result<T, ObservabilityError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ObservabilityError {
    #[error("dependency already registered: {0}")]
    DuplicateDependency(String),

    #[error("dependency not registered: {0}")]
    UnknownDependency(String),

    #[error("poller already running")]
    AlreadyStarted,

    #[error("internal observability error: {0}")]
    Internal(String),
}

impl ObservabilityError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ObservabilityError::DuplicateDependency(_) => ErrorKind::Conflict,
            ObservabilityError::UnknownDependency(_) => ErrorKind::NotFound,
            ObservabilityError::AlreadyStarted => ErrorKind::Conflict,
            ObservabilityError::Internal(_) => ErrorKind::Internal,
        }
    }
}

use qinfinity_types::ErrorKind;
use thiserror::Error;

pub type GossipResult<T> = Result<T, GossipError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GossipError {
    #[error("no nodes supplied for distribution")]
    NoNodes,

    #[error("no jobs supplied for distribution")]
    NoJobs,

    #[error("stress harness misconfigured: {0}")]
    InvalidStressConfig(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl GossipError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GossipError::NoNodes | GossipError::NoJobs => ErrorKind::Validation,
            GossipError::InvalidStressConfig(_) => ErrorKind::Validation,
            GossipError::Internal(_) => ErrorKind::Internal,
        }
    }
}

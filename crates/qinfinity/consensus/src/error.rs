use qinfinity_types::ErrorKind;
use thiserror::Error;

pub type ConsensusResult<T> = Result<T, ConsensusError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConsensusError {
    #[error("no active nodes available for consensus")]
    NoActiveNodes,

    #[error("vote request to {node} timed out")]
    VoteTimeout { node: String },

    #[error("consensus recovery exhausted for round {round_id}")]
    RecoveryExhausted { round_id: String },

    #[error("internal consensus error: {0}")]
    Internal(String),
}

impl ConsensusError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConsensusError::NoActiveNodes => ErrorKind::Validation,
            ConsensusError::VoteTimeout { .. } => ErrorKind::Timeout,
            ConsensusError::RecoveryExhausted { .. } => ErrorKind::Exhausted,
            ConsensusError::Internal(_) => ErrorKind::Internal,
        }
    }
}

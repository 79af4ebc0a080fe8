use qinfinity_types::ErrorKind;
use thiserror::Error;

pub type LedgerResult<T> = Result<T, LedgerError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Recomputing the last record's hash did not match its stored hash;
    /// the chain is broken and the append is refused.
    #[error("ledger corruption detected at record {record_id}: {reason}")]
    LedgerCorruption { record_id: String, reason: String },

    #[error("record not found: {0}")]
    RecordNotFound(String),

    #[error("content address already assigned to record {0}")]
    ContentAddressAssigned(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("internal ledger error: {0}")]
    Internal(String),
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::LedgerCorruption { .. } => ErrorKind::Conflict,
            LedgerError::RecordNotFound(_) => ErrorKind::NotFound,
            LedgerError::ContentAddressAssigned(_) => ErrorKind::Conflict,
            LedgerError::Serialization(_) => ErrorKind::Internal,
            LedgerError::Internal(_) => ErrorKind::Internal,
        }
    }
}

use qinfinity_types::ErrorKind;
use thiserror::Error;

pub type DaoResult<T> = Result<T, DaoError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DaoError {
    #[error("dao not found: {0}")]
    DaoNotFound(String),

    #[error("dao {0} is not active")]
    DaoInactive(String),

    #[error("proposal not found: {0}")]
    ProposalNotFound(String),

    #[error("{identity} is not a member of {dao}")]
    NotMember { identity: String, dao: String },

    #[error("token requirement not met: need {required} {currency}, have {available}")]
    TokenRequirementNotMet {
        required: String,
        currency: String,
        available: String,
    },

    #[error("invalid proposal options: {0}")]
    InvalidOptions(String),

    #[error("option not in proposal: {0}")]
    UnknownOption(String),

    #[error("{voter} already voted on {proposal}")]
    DuplicateVote { voter: String, proposal: String },

    #[error("proposal {0} is closed")]
    ProposalClosed(String),

    #[error("vote signature rejected for {0}")]
    SignatureRejected(String),

    #[error("wallet capability error: {0}")]
    Wallet(String),

    #[error("internal dao error: {0}")]
    Internal(String),
}

impl DaoError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DaoError::DaoNotFound(_) | DaoError::ProposalNotFound(_) => ErrorKind::NotFound,
            DaoError::DaoInactive(_) => ErrorKind::Conflict,
            DaoError::NotMember { .. } => ErrorKind::AuthorizationDenied,
            DaoError::TokenRequirementNotMet { .. } => ErrorKind::AuthorizationDenied,
            DaoError::InvalidOptions(_) | DaoError::UnknownOption(_) => ErrorKind::Validation,
            DaoError::DuplicateVote { .. } => ErrorKind::Conflict,
            DaoError::ProposalClosed(_) => ErrorKind::Conflict,
            DaoError::SignatureRejected(_) => ErrorKind::AuthorizationDenied,
            DaoError::Wallet(_) => ErrorKind::Timeout,
            DaoError::Internal(_) => ErrorKind::Internal,
        }
    }
}

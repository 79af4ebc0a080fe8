use qinfinity_types::ErrorKind;
use thiserror::Error;

pub type PaymentResult<T> = Result<T, PaymentError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PaymentError {
    #[error("invalid charge: {0}")]
    InvalidCharge(String),

    #[error("intent not found: {0}")]
    IntentNotFound(String),

    #[error("insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: String, available: String },

    #[error("intent {intent_id} is terminal ({status}); no further transitions")]
    IntentTerminal { intent_id: String, status: String },

    #[error("invalid status transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("intent {0} expired before settlement")]
    IntentExpired(String),

    #[error("wallet capability error: {0}")]
    Wallet(String),

    #[error("internal payment error: {0}")]
    Internal(String),
}

impl PaymentError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PaymentError::InvalidCharge(_) => ErrorKind::Validation,
            PaymentError::IntentNotFound(_) => ErrorKind::NotFound,
            PaymentError::InsufficientFunds { .. } => ErrorKind::AuthorizationDenied,
            PaymentError::IntentTerminal { .. } => ErrorKind::Conflict,
            PaymentError::InvalidTransition { .. } => ErrorKind::Conflict,
            PaymentError::IntentExpired(_) => ErrorKind::Conflict,
            PaymentError::Wallet(_) => ErrorKind::Timeout,
            PaymentError::Internal(_) => ErrorKind::Internal,
        }
    }
}

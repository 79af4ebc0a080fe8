//! The payment-intent state machine. All transitions pass through one
//! function; terminal states are immutable.

use qinfinity_types::{Amount, Currency, IdentityRef, IntentId, TransactionId};
use serde::{Deserialize, Serialize};

use crate::error::{PaymentError, PaymentResult};
use crate::fees::{Module, ModuleCharge};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentStatus {
    Pending { expires_at_ms: u64 },
    Settled { transaction_id: TransactionId, settled_at_ms: u64 },
    Expired,
    Failed { reason: String },
}

impl PaymentStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PaymentStatus::Pending { .. })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending { .. } => "PENDING",
            PaymentStatus::Settled { .. } => "SETTLED",
            PaymentStatus::Expired => "EXPIRED",
            PaymentStatus::Failed { .. } => "FAILED",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub intent_id: IntentId,
    pub payer: IdentityRef,
    pub module: Module,
    pub charge: ModuleCharge,
    pub amount: Amount,
    pub currency: Currency,
    pub purpose: String,
    pub created_at_ms: u64,
    pub status: PaymentStatus,
}

impl PaymentIntent {
    pub fn expires_at_ms(&self) -> Option<u64> {
        match &self.status {
            PaymentStatus::Pending { expires_at_ms } => Some(*expires_at_ms),
            _ => None,
        }
    }

    pub fn transaction_id(&self) -> Option<&TransactionId> {
        match &self.status {
            PaymentStatus::Settled { transaction_id, .. } => Some(transaction_id),
            _ => None,
        }
    }

    pub fn settled_at_ms(&self) -> Option<u64> {
        match &self.status {
            PaymentStatus::Settled { settled_at_ms, .. } => Some(*settled_at_ms),
            _ => None,
        }
    }

    /// The only mutation point for intent status. PENDING may move to any
    /// terminal state; terminal states reject every transition.
    pub fn transition(&mut self, to: PaymentStatus) -> PaymentResult<()> {
        match (&self.status, &to) {
            (PaymentStatus::Pending { .. }, PaymentStatus::Settled { .. })
            | (PaymentStatus::Pending { .. }, PaymentStatus::Expired)
            | (PaymentStatus::Pending { .. }, PaymentStatus::Failed { .. }) => {
                self.status = to;
                Ok(())
            }
            (from, _) if from.is_terminal() => Err(PaymentError::IntentTerminal {
                intent_id: self.intent_id.to_string(),
                status: from.as_str().into(),
            }),
            (from, to) => Err(PaymentError::InvalidTransition {
                from: from.as_str().into(),
                to: to.as_str().into(),
            }),
        }
    }
}

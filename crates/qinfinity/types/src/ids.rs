//! Strongly-typed identifiers for Q∞ entities.
//!
//! All ids are UUID-based unless the id is naturally operator-assigned
//! (node names), and are wrapped in newtype structs for type safety.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$doc:meta])* $name:ident, $prefix:literal) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(Uuid);

        impl $name {
            pub fn generate() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, ":{}"), self.0)
            }
        }
    };
}

uuid_id!(
    /// Unique identifier for one ledger record.
    RecordId,
    "rec"
);
uuid_id!(
    /// Unique identifier for a payment intent.
    IntentId,
    "intent"
);
uuid_id!(
    /// Unique identifier for a revenue distribution.
    DistributionId,
    "dist"
);
uuid_id!(
    /// Unique identifier for a DAO.
    DaoId,
    "dao"
);
uuid_id!(
    /// Unique identifier for a governance proposal.
    ProposalId,
    "prop"
);
uuid_id!(
    /// Unique identifier for a single cast vote.
    VoteId,
    "vote"
);
uuid_id!(
    /// Unique identifier for a consensus round.
    RoundId,
    "round"
);
uuid_id!(
    /// Unique identifier for a decentralization attestation.
    AttestationId,
    "attest"
);
uuid_id!(
    /// Unique identifier for a dispatched job.
    JobId,
    "job"
);
uuid_id!(
    /// Unique identifier for an emitted event.
    EventId,
    "event"
);

/// Identifier for one distributed execution (a pipeline run, a consensus
/// operation). Operator- or caller-assigned, so string-based.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExecutionId(String);

impl ExecutionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "exec:{}", self.0)
    }
}

/// Identifier for a node in the fleet. Operator-assigned, so string-based.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node:{}", self.0)
    }
}

/// Identifier for a wallet transaction. Caller-generated so that port
/// operations stay idempotent on it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransactionId(String);

impl TransactionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tx:{}", self.0)
    }
}

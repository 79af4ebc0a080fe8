//! Event envelopes and the topic catalog emitted by the control-plane.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::identity::IdentityRef;
use crate::ids::EventId;

/// Dot-delimited, versioned topic constants.
pub mod topics {
    pub const ECOSYSTEM_HEALTH_VALIDATED: &str = "ecosystem.health.validated";
    pub const ATTESTATION_COMPLETED: &str = "decentralization.attestation.completed";
    pub const CONSENSUS_VALIDATED: &str = "consensus.validated";
    pub const CONSENSUS_FAILED: &str = "consensus.failed";
    pub const PERFORMANCE_GATES_VALIDATED: &str = "performance.gates.validated";
    pub const DATAFLOW_INPUT_COMPLETED: &str = "dataflow.input.completed";
    pub const DATAFLOW_OUTPUT_COMPLETED: &str = "dataflow.output.completed";
    pub const DATAFLOW_LEDGER_RECORDED: &str = "dataflow.ledger.recorded";
    pub const DATAFLOW_LEDGER_VERIFIED: &str = "dataflow.ledger.verified";
    pub const DATAFLOW_REPLAY_COMPLETED: &str = "dataflow.replay.completed";
    pub const DATAFLOW_GOSSIPSUB_VALIDATED: &str = "dataflow.gossipsub.validated";
    pub const DATAFLOW_STRESS_COMPLETED: &str = "dataflow.stress.completed";
    pub const PAYMENT_INTENT_CREATED: &str = "payment.intent.created";
    pub const PAYMENT_SETTLED: &str = "payment.settled";
    pub const PAYMENT_SETTLEMENT_REPORTED: &str = "payment.settlement.reported";
    pub const DAO_PROPOSAL_CREATED: &str = "dao.proposal.created";
    pub const DAO_VOTE_CAST: &str = "dao.vote.cast";
    pub const DAO_PROPOSAL_CLOSED: &str = "dao.proposal.closed";
    pub const SLO_VIOLATION: &str = "observability.slo.violation";
}

/// Who caused an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventActor {
    pub identity: IdentityRef,
    pub role: String,
}

impl EventActor {
    pub fn new(identity: IdentityRef, role: impl Into<String>) -> Self {
        Self {
            identity,
            role: role.into(),
        }
    }

    /// The control-plane itself acting on its own behalf.
    pub fn system() -> Self {
        Self {
            identity: IdentityRef::new("qinfinity-core"),
            role: "system".into(),
        }
    }
}

/// The envelope broadcast for every control-plane event.
///
/// Delivery is at-least-once; handlers must be idempotent on `event_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event_id: EventId,
    pub topic: String,
    pub timestamp_ms: u64,
    pub actor: EventActor,
    pub payload: Value,
    pub correlation_id: Option<String>,
}

impl EventEnvelope {
    pub fn new(topic: impl Into<String>, timestamp_ms: u64, actor: EventActor, payload: Value) -> Self {
        Self {
            event_id: EventId::generate(),
            topic: topic.into(),
            timestamp_ms,
            actor,
            payload,
            correlation_id: None,
        }
    }

    pub fn with_correlation(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }
}

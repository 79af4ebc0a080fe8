//! Consensus round vocabulary.

use qinfinity_types::{ExecutionId, NodeId, RoundId, Signature};
use serde::{Deserialize, Serialize};

/// Operation classes with their per-class vote thresholds (out of the
/// standard 5-node participant set).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationType {
    Payment,
    Governance,
    Licensing,
    Default,
}

impl OperationType {
    pub fn required_threshold(&self) -> usize {
        match self {
            OperationType::Payment => 4,
            OperationType::Governance | OperationType::Licensing | OperationType::Default => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationType::Payment => "payment",
            OperationType::Governance => "governance",
            OperationType::Licensing => "licensing",
            OperationType::Default => "default",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoteDecision {
    Approve,
    Reject,
}

/// A signed vote returned by one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeVote {
    pub node: NodeId,
    pub decision: VoteDecision,
    /// Self-reported confidence in [0, 1].
    pub confidence: f64,
    pub signature: Option<Signature>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteRequest {
    pub round_id: RoundId,
    pub execution_id: ExecutionId,
    pub step_id: String,
    pub operation: OperationType,
    pub deadline_ms: u64,
}

/// Staged recovery actions, keyed by attempt index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecoveryAction {
    RetryUnresponsive,
    ExpandNodeSet,
    MajorityFallback,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryAttempt {
    pub attempt: u32,
    pub action: RecoveryAction,
    pub votes_before: usize,
    pub votes_after: usize,
    pub succeeded: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusRound {
    pub id: RoundId,
    pub execution_id: ExecutionId,
    pub step_id: String,
    pub operation: OperationType,
    pub required_threshold: usize,
    pub votes: Vec<NodeVote>,
    pub reached: bool,
    pub decision: Option<VoteDecision>,
    pub confidence: f64,
    pub recovery: Vec<RecoveryAttempt>,
    /// True when the simple-majority fallback decided the round.
    pub fallback_used: bool,
}

impl ConsensusRound {
    /// The persisted form: identical, with signatures stripped.
    pub fn archive_form(&self) -> ConsensusRound {
        let mut archived = self.clone();
        for vote in &mut archived.votes {
            vote.signature = None;
        }
        archived
    }
}

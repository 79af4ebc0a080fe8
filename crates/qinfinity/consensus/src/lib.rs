//! Critical-operation consensus: operation-scoped vote collection across a
//! participating node set, threshold analysis, and staged recovery.

pub mod coordinator;
pub mod error;
pub mod types;

pub use coordinator::{ConsensusConfig, ConsensusCoordinator, VoterPort};
pub use error::{ConsensusError, ConsensusResult};
pub use types::{
    ConsensusRound, NodeVote, OperationType, RecoveryAction, RecoveryAttempt, VoteDecision,
    VoteRequest,
};

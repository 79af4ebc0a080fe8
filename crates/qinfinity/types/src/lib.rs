//! Canonical type system shared across the Q∞ control-plane crates.
//!
//! This crate provides:
//! - strongly-typed identifiers for every owned entity
//! - identity references and signatures as passed between components
//! - `Currency` / `Amount` money primitives in i64 micro-units
//! - the per-node `VectorClock` causal ordering primitive
//! - event envelopes and the dot-delimited topic catalog
//! - the shared `ErrorKind` failure classification
//!
//! Components reference each other's entities by id only; no shared mutable
//! graphs cross a crate boundary.

pub mod error;
pub mod events;
pub mod ids;
pub mod identity;
pub mod ledger;
pub mod money;
pub mod perf;
pub mod vclock;

pub use error::{ErrorKind, FailureReport};
pub use events::{topics, EventActor, EventEnvelope};
pub use ids::{
    AttestationId, DaoId, DistributionId, EventId, ExecutionId, IntentId, JobId, NodeId,
    ProposalId, RecordId, RoundId, TransactionId, VoteId,
};
pub use identity::{ContentAddress, IdentityRef, Signature};
pub use ledger::{PayloadSummary, ValidationOutcome};
pub use money::{Amount, Currency};
pub use perf::PerfSnapshot;
pub use vclock::{ClockOrder, VectorClock};

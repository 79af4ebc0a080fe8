//! Execution ledger for the Q∞ control-plane.
//!
//! Records form one global hash chain across all executions on a node;
//! verification additionally checks per-execution linkage in timestamp
//! order. Appends are serialized (single writer per node); publication to
//! content-addressed storage is asynchronous and eventual.

pub mod error;
pub mod ledger;
pub mod publish;
pub mod record;

pub use error::{LedgerError, LedgerResult};
pub use ledger::{ExecutionLedger, VerificationReport};
pub use publish::PublicationPolicy;
pub use record::LedgerRecord;

//! DAO governance: the DAO registry, proposal lifecycle, weighted-vote
//! collection with signature verification, and auto-closure on quorum
//! plus supermajority.

pub mod error;
pub mod service;
pub mod types;

pub use error::{DaoError, DaoResult};
pub use service::{DaoConfig, DaoService};
pub use types::{
    Dao, DaoVisibility, OptionTally, Proposal, ProposalStatus, TokenRequirement, Vote, WeightRule,
};

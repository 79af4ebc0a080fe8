//! Fair job distribution under gossipsub-style backpressure, plus the
//! stress harness that drives bounded-parallelism event load.

pub mod distributor;
pub mod error;
pub mod stress;

pub use distributor::{
    DistributionReport, DistributorConfig, FairDistributor, NodeReport,
};
pub use error::{GossipError, GossipResult};
pub use stress::{StressConfig, StressHarness, StressReport};

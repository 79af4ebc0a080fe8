//! Payment settlement and revenue distribution for the Q∞ ecosystem:
//! module-specific fee calculation, the payment-intent state machine,
//! atomic sandbox settlement under per-wallet locks, multi-party revenue
//! splits, and the reconciliation reporter.

pub mod config;
pub mod engine;
pub mod error;
pub mod fees;
pub mod intent;
pub mod reconcile;
pub mod split;

pub use config::{MailFees, MarketFees, MarketSplit, PaymentConfig, SplitTable, StorageFees};
pub use engine::{PaymentEngine, SettlementOutcome};
pub use error::{PaymentError, PaymentResult};
pub use fees::{FeeBreakdown, FeeCalculator, Module, ModuleCharge};
pub use intent::{PaymentIntent, PaymentStatus};
pub use reconcile::ReconciliationReport;
pub use split::{RevenueDistribution, Share};

//! Capability port boundaries for the Q∞ control-plane.
//!
//! The core never talks to the ecosystem's crypto/storage/identity/wallet
//! modules directly — it depends on the narrow traits in this crate, and
//! every trait ships with an in-memory sandbox implementation used by
//! tests, demos, and the verifiable end-to-end settlement path.

pub mod artifacts;
pub mod audit;
pub mod bus;
pub mod content;
pub mod crypto;
pub mod error;
pub mod identity;
pub mod recorder;
pub mod runtime;
pub mod wallet;

pub use artifacts::ArtifactStore;
pub use audit::{AuditEvent, AuditPort, IndexEntry, IndexPort, MemoryAuditTrail, MemoryIndex};
pub use bus::{BusStats, EventBusPort, EventHandler, MemoryEventBus, SubscriptionId};
pub use content::{ContentDescriptor, ContentStoragePort, MemoryContentStore};
pub use crypto::{CryptoPort, EncryptionLevel, EncryptionMeta, SandboxCrypto};
pub use error::{PortError, PortResult};
pub use identity::{IdentityDescriptor, IdentityPort, StaticIdentityDirectory};
pub use recorder::{ExecutionRecorder, MetricSink, NullMetricSink};
pub use runtime::{
    ClockPort, IdPort, ManualClock, RandomSource, SeededRandom, SequentialIdSource, SystemClock,
    UuidIdSource,
};
pub use wallet::{MemoryWallet, NftRef, WalletPort};

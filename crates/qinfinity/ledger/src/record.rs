//! Ledger record shape and hashing.

use qinfinity_types::{ContentAddress, ExecutionId, NodeId, PayloadSummary, RecordId, VectorClock};
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, LedgerResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerRecord {
    pub record_id: RecordId,
    pub execution_id: ExecutionId,
    pub timestamp_ms: u64,
    pub node_id: NodeId,
    pub vector_clock: VectorClock,
    /// Null only for the genesis record of the node's chain.
    pub prev_hash: Option<[u8; 32]>,
    pub payload: PayloadSummary,
    pub record_hash: [u8; 32],
    /// Assigned at most once, after external publication.
    pub content_address: Option<ContentAddress>,
    pub published: bool,
}

impl LedgerRecord {
    /// record-hash = H(record fields excluding record-hash). The content
    /// address and publication flag are assigned after hashing, so they are
    /// zeroed out of the canonical form as well.
    pub fn compute_hash(&self) -> LedgerResult<[u8; 32]> {
        let mut canonical = self.clone();
        canonical.record_hash = [0; 32];
        canonical.content_address = None;
        canonical.published = false;

        let encoded = serde_json::to_vec(&canonical)
            .map_err(|error| LedgerError::Serialization(error.to_string()))?;

        let mut hasher = blake3::Hasher::new();
        hasher.update(b"qinfinity-ledger-record-v1:");
        hasher.update(&encoded);
        Ok(*hasher.finalize().as_bytes())
    }

    /// True when the stored hash matches a fresh recomputation.
    pub fn hash_intact(&self) -> bool {
        self.compute_hash()
            .map(|hash| hash == self.record_hash)
            .unwrap_or(false)
    }
}

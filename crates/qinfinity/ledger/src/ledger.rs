//! The per-node execution ledger. Appends are strictly ordered behind one
//! write lock; the record chain is global across executions, with
//! per-execution linkage checked by `verify`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use qinfinity_ports::{
    ClockPort, ContentStoragePort, EventBusPort, ExecutionRecorder, PortError, PortResult,
};
use qinfinity_types::{
    topics, ContentAddress, EventActor, EventEnvelope, ExecutionId, NodeId, PayloadSummary,
    RecordId, VectorClock,
};
use serde_json::json;
use tracing::{error, info};

use crate::error::{LedgerError, LedgerResult};
use crate::publish::{mock_address, publish_with_retry, PublicationPolicy};
use crate::record::LedgerRecord;

/// Report returned by `verify`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct VerificationReport {
    pub chain_valid: bool,
    pub total_records: usize,
    pub broken_at: Option<RecordId>,
    pub orphan_records: Vec<RecordId>,
}

#[derive(Default)]
struct LedgerState {
    records: Vec<LedgerRecord>,
    by_hash: HashMap<[u8; 32], usize>,
    by_id: HashMap<RecordId, usize>,
    vclock: VectorClock,
}

struct Inner {
    node_id: NodeId,
    clock: Arc<dyn ClockPort>,
    storage: Option<Arc<dyn ContentStoragePort>>,
    bus: Option<Arc<dyn EventBusPort>>,
    policy: PublicationPolicy,
    state: RwLock<LedgerState>,
    publications: Mutex<Vec<tokio::task::JoinHandle<()>>>,
}

#[derive(Clone)]
pub struct ExecutionLedger {
    inner: Arc<Inner>,
}

impl ExecutionLedger {
    pub fn new(node_id: NodeId, clock: Arc<dyn ClockPort>) -> Self {
        Self {
            inner: Arc::new(Inner {
                node_id,
                clock,
                storage: None,
                bus: None,
                policy: PublicationPolicy::default(),
                state: RwLock::new(LedgerState::default()),
                publications: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Attach content-addressed storage for eventual record publication.
    pub fn with_storage(mut self, storage: Arc<dyn ContentStoragePort>) -> Self {
        Arc::get_mut(&mut self.inner)
            .expect("with_storage must be called before the ledger is shared")
            .storage = Some(storage);
        self
    }

    pub fn with_bus(mut self, bus: Arc<dyn EventBusPort>) -> Self {
        Arc::get_mut(&mut self.inner)
            .expect("with_bus must be called before the ledger is shared")
            .bus = Some(bus);
        self
    }

    pub fn with_publication_policy(mut self, policy: PublicationPolicy) -> Self {
        Arc::get_mut(&mut self.inner)
            .expect("with_publication_policy must be called before the ledger is shared")
            .policy = policy;
        self
    }

    /// Append a record for `execution_id`, linked to the globally last
    /// record. Fails with `LedgerCorruption` when the last record's stored
    /// hash no longer matches a recomputation.
    pub fn append(
        &self,
        execution_id: &ExecutionId,
        payload: PayloadSummary,
    ) -> LedgerResult<LedgerRecord> {
        let record = {
            let mut state = self
                .inner
                .state
                .write()
                .map_err(|_| LedgerError::Internal("ledger write lock poisoned".into()))?;

            let prev_hash = match state.records.last() {
                None => None,
                Some(last) => {
                    if !last.hash_intact() {
                        let broken = LedgerError::LedgerCorruption {
                            record_id: last.record_id.to_string(),
                            reason: "stored hash does not match recomputation".into(),
                        };
                        self.raise_integrity_event(&last.record_id, &broken);
                        return Err(broken);
                    }
                    Some(last.record_hash)
                }
            };

            state.vclock.increment(&self.inner.node_id);

            let mut record = LedgerRecord {
                record_id: RecordId::generate(),
                execution_id: execution_id.clone(),
                timestamp_ms: self.inner.clock.now_ms(),
                node_id: self.inner.node_id.clone(),
                vector_clock: state.vclock.clone(),
                prev_hash,
                payload,
                record_hash: [0; 32],
                content_address: None,
                published: false,
            };
            record.record_hash = record.compute_hash()?;

            let index = state.records.len();
            state.by_hash.insert(record.record_hash, index);
            state.by_id.insert(record.record_id.clone(), index);
            state.records.push(record.clone());
            record
        };

        info!(
            record_id = %record.record_id,
            execution_id = %record.execution_id,
            "ledger record appended"
        );
        self.emit(
            topics::DATAFLOW_LEDGER_RECORDED,
            json!({
                "record_id": record.record_id.to_string(),
                "execution_id": record.execution_id.to_string(),
                "step_count": record.payload.step_count,
            }),
        );

        self.schedule_publication(&record);
        Ok(record)
    }

    fn schedule_publication(&self, record: &LedgerRecord) {
        let Some(storage) = self.inner.storage.clone() else {
            return;
        };
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };

        let bytes = match serde_json::to_vec(record) {
            Ok(bytes) => bytes,
            Err(error) => {
                error!(%error, "ledger record serialization for publication failed");
                return;
            }
        };

        let ledger = self.clone();
        let record_id = record.record_id.clone();
        let record_hash = record.record_hash;
        let name = record.record_id.to_string();
        let policy = self.inner.policy.clone();

        let task = handle.spawn(async move {
            let (address, published) =
                publish_with_retry(storage, bytes, name, record_hash, policy).await;
            let _ = ledger.assign_content_address(&record_id, address, published);
        });

        if let Ok(mut publications) = self.inner.publications.lock() {
            publications.push(task);
        }
    }

    /// Await every in-flight publication task. Test and shutdown helper.
    pub async fn flush_publications(&self) {
        let tasks: Vec<_> = match self.inner.publications.lock() {
            Ok(mut publications) => publications.drain(..).collect(),
            Err(_) => return,
        };
        for task in tasks {
            let _ = task.await;
        }
    }

    fn assign_content_address(
        &self,
        record_id: &RecordId,
        address: ContentAddress,
        published: bool,
    ) -> LedgerResult<()> {
        let mut state = self
            .inner
            .state
            .write()
            .map_err(|_| LedgerError::Internal("ledger write lock poisoned".into()))?;

        let index = *state
            .by_id
            .get(record_id)
            .ok_or_else(|| LedgerError::RecordNotFound(record_id.to_string()))?;
        let record = &mut state.records[index];

        if record.content_address.is_some() {
            return Err(LedgerError::ContentAddressAssigned(record_id.to_string()));
        }
        record.content_address = Some(address);
        record.published = published;
        Ok(())
    }

    /// Verify hash recomputation for every record and per-execution
    /// linkage along the global chain in timestamp order.
    pub fn verify(&self, execution_id: &ExecutionId) -> LedgerResult<VerificationReport> {
        let state = self
            .inner
            .state
            .read()
            .map_err(|_| LedgerError::Internal("ledger read lock poisoned".into()))?;

        let mut execution_records: Vec<&LedgerRecord> = state
            .records
            .iter()
            .filter(|r| &r.execution_id == execution_id)
            .collect();
        execution_records.sort_by_key(|r| r.timestamp_ms);

        let mut broken_at = None;
        let mut orphans = Vec::new();

        for (position, &record) in execution_records.iter().enumerate() {
            if !record.hash_intact() && broken_at.is_none() {
                broken_at = Some(record.record_id.clone());
            }

            if let Some(prev_hash) = record.prev_hash {
                if !state.by_hash.contains_key(&prev_hash) {
                    orphans.push(record.record_id.clone());
                    continue;
                }
            }

            // Walk the global chain back to the nearest same-execution
            // predecessor; it must be the previous record in timestamp order.
            let expected_prev = position.checked_sub(1).map(|i| &execution_records[i].record_id);
            let found_prev = self.walk_to_same_execution(&state, record);
            if found_prev.as_ref() != expected_prev && broken_at.is_none() {
                broken_at = Some(record.record_id.clone());
            }
        }

        let report = VerificationReport {
            chain_valid: broken_at.is_none() && orphans.is_empty(),
            total_records: execution_records.len(),
            broken_at,
            orphan_records: orphans,
        };

        self.emit(
            topics::DATAFLOW_LEDGER_VERIFIED,
            json!({
                "execution_id": execution_id.to_string(),
                "chain_valid": report.chain_valid,
                "total_records": report.total_records,
            }),
        );
        if !report.chain_valid {
            error!(
                execution_id = %execution_id,
                broken_at = ?report.broken_at,
                "ledger chain verification failed"
            );
        }
        Ok(report)
    }

    fn walk_to_same_execution(
        &self,
        state: &LedgerState,
        record: &LedgerRecord,
    ) -> Option<RecordId> {
        let mut cursor = record.prev_hash;
        let mut hops = 0usize;
        while let Some(hash) = cursor {
            let index = *state.by_hash.get(&hash)?;
            let candidate = &state.records[index];
            if candidate.execution_id == record.execution_id {
                return Some(candidate.record_id.clone());
            }
            cursor = candidate.prev_hash;
            hops += 1;
            if hops > state.records.len() {
                return None;
            }
        }
        None
    }

    pub fn record(&self, record_id: &RecordId) -> LedgerResult<LedgerRecord> {
        let state = self
            .inner
            .state
            .read()
            .map_err(|_| LedgerError::Internal("ledger read lock poisoned".into()))?;
        state
            .by_id
            .get(record_id)
            .map(|&index| state.records[index].clone())
            .ok_or_else(|| LedgerError::RecordNotFound(record_id.to_string()))
    }

    pub fn records_for(&self, execution_id: &ExecutionId) -> Vec<LedgerRecord> {
        self.inner
            .state
            .read()
            .map(|state| {
                let mut records: Vec<LedgerRecord> = state
                    .records
                    .iter()
                    .filter(|r| &r.execution_id == execution_id)
                    .cloned()
                    .collect();
                records.sort_by_key(|r| r.timestamp_ms);
                records
            })
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.inner.state.read().map(|s| s.records.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bulk retention: remove entire execution chains whose newest record
    /// is older than the window. Individual records are never rewritten.
    pub fn prune_older_than(&self, window_ms: u64) -> LedgerResult<usize> {
        let now_ms = self.inner.clock.now_ms();
        let cutoff = now_ms.saturating_sub(window_ms);

        let mut state = self
            .inner
            .state
            .write()
            .map_err(|_| LedgerError::Internal("ledger write lock poisoned".into()))?;

        let mut newest: HashMap<ExecutionId, u64> = HashMap::new();
        for record in &state.records {
            let entry = newest.entry(record.execution_id.clone()).or_insert(0);
            if record.timestamp_ms > *entry {
                *entry = record.timestamp_ms;
            }
        }

        let state = &mut *state;
        let before = state.records.len();
        state
            .records
            .retain(|r| newest.get(&r.execution_id).copied().unwrap_or(0) >= cutoff);

        state.by_hash.clear();
        state.by_id.clear();
        for (index, record) in state.records.iter().enumerate() {
            state.by_hash.insert(record.record_hash, index);
            state.by_id.insert(record.record_id.clone(), index);
        }

        let removed = before - state.records.len();
        if removed > 0 {
            info!(removed, cutoff, "ledger retention pruned expired chains");
        }
        Ok(removed)
    }

    /// Test hook: mutate a stored record's payload in place to simulate
    /// tampering. Hidden behind cfg(test)-adjacent usage in this workspace.
    #[doc(hidden)]
    pub fn corrupt_payload_for_tests(&self, record_id: &RecordId, step_count: u32) {
        if let Ok(mut state) = self.inner.state.write() {
            if let Some(&index) = state.by_id.get(record_id) {
                state.records[index].payload.step_count = step_count;
            }
        }
    }

    fn raise_integrity_event(&self, record_id: &RecordId, error: &LedgerError) {
        error!(record_id = %record_id, %error, "ledger chain break detected on append");
        self.emit(
            topics::DATAFLOW_LEDGER_VERIFIED,
            json!({
                "record_id": record_id.to_string(),
                "severity": "critical",
                "error": error.to_string(),
            }),
        );
    }

    fn emit(&self, topic: &str, payload: serde_json::Value) {
        if let Some(bus) = &self.inner.bus {
            let envelope = EventEnvelope::new(
                topic,
                self.inner.clock.now_ms(),
                EventActor::system(),
                payload,
            );
            let _ = bus.publish(envelope);
        }
    }
}

impl ExecutionRecorder for ExecutionLedger {
    fn record_execution(
        &self,
        execution_id: &ExecutionId,
        summary: PayloadSummary,
    ) -> PortResult<()> {
        self.append(execution_id, summary)
            .map(|_| ())
            .map_err(|error| PortError::Internal(error.to_string()))
    }
}

/// Exposed for integration tests that need a fallback address to compare
/// against.
pub fn mock_fallback_address(record_hash: &[u8; 32]) -> ContentAddress {
    mock_address(record_hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use qinfinity_ports::{ManualClock, MemoryContentStore};
    use qinfinity_types::ValidationOutcome;
    use std::time::Duration;

    fn ledger_with_clock() -> (ExecutionLedger, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(1));
        let ledger = ExecutionLedger::new(NodeId::new("n1"), clock.clone());
        (ledger, clock)
    }

    fn summary() -> PayloadSummary {
        PayloadSummary::new(2, 40, ValidationOutcome::Passed)
    }

    #[test]
    fn appends_link_globally() {
        let (ledger, clock) = ledger_with_clock();
        let e1 = ExecutionId::new("E1");
        let e2 = ExecutionId::new("E2");

        let first = ledger.append(&e1, summary()).unwrap();
        clock.advance(1);
        let second = ledger.append(&e2, summary()).unwrap();
        clock.advance(1);
        let third = ledger.append(&e1, summary()).unwrap();

        assert_eq!(first.prev_hash, None);
        assert_eq!(second.prev_hash, Some(first.record_hash));
        assert_eq!(third.prev_hash, Some(second.record_hash));
        assert_eq!(third.vector_clock.counter(&NodeId::new("n1")), 3);
    }

    #[test]
    fn verify_passes_for_interleaved_executions() {
        let (ledger, clock) = ledger_with_clock();
        let e1 = ExecutionId::new("E1");
        let e2 = ExecutionId::new("E2");

        for _ in 0..3 {
            ledger.append(&e1, summary()).unwrap();
            clock.advance(1);
            ledger.append(&e2, summary()).unwrap();
            clock.advance(1);
        }

        let report = ledger.verify(&e1).unwrap();
        assert!(report.chain_valid);
        assert_eq!(report.total_records, 3);
        assert!(report.orphan_records.is_empty());
    }

    #[test]
    fn verify_detects_mutated_middle_record() {
        // Scenario: three records at t=1,2,3, then the middle payload is
        // mutated; verification must point at the middle record.
        let (ledger, clock) = ledger_with_clock();
        let e1 = ExecutionId::new("E1");

        ledger.append(&e1, summary()).unwrap();
        clock.advance(1);
        let middle = ledger.append(&e1, summary()).unwrap();
        clock.advance(1);
        ledger.append(&e1, summary()).unwrap();

        ledger.corrupt_payload_for_tests(&middle.record_id, 99);

        let report = ledger.verify(&e1).unwrap();
        assert!(!report.chain_valid);
        assert_eq!(report.total_records, 3);
        assert_eq!(report.broken_at, Some(middle.record_id));
    }

    #[test]
    fn append_refuses_on_corrupted_tail() {
        let (ledger, _) = ledger_with_clock();
        let e1 = ExecutionId::new("E1");

        let tail = ledger.append(&e1, summary()).unwrap();
        ledger.corrupt_payload_for_tests(&tail.record_id, 77);

        let error = ledger.append(&e1, summary()).unwrap_err();
        assert!(matches!(error, LedgerError::LedgerCorruption { .. }));
        assert_eq!(error.kind(), qinfinity_types::ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn publication_assigns_content_address() {
        let clock = Arc::new(ManualClock::new(1));
        let storage = Arc::new(MemoryContentStore::new());
        let ledger = ExecutionLedger::new(NodeId::new("n1"), clock)
            .with_storage(storage.clone())
            .with_publication_policy(PublicationPolicy {
                max_attempts: 3,
                base_delay: Duration::from_millis(1),
                attempt_timeout: Duration::from_millis(100),
                namespace: "ledger".into(),
            });

        let record = ledger.append(&ExecutionId::new("E1"), summary()).unwrap();
        ledger.flush_publications().await;

        let stored = ledger.record(&record.record_id).unwrap();
        assert!(stored.published);
        assert!(stored.content_address.is_some());
        assert_eq!(storage.put_count(), 1);
    }

    #[tokio::test]
    async fn exhausted_publication_degrades_to_mock_address() {
        let clock = Arc::new(ManualClock::new(1));
        let storage = Arc::new(MemoryContentStore::new());
        storage.fail_next_puts(10);
        let ledger = ExecutionLedger::new(NodeId::new("n1"), clock)
            .with_storage(storage.clone())
            .with_publication_policy(PublicationPolicy {
                max_attempts: 2,
                base_delay: Duration::from_millis(1),
                attempt_timeout: Duration::from_millis(100),
                namespace: "ledger".into(),
            });

        let record = ledger.append(&ExecutionId::new("E1"), summary()).unwrap();
        ledger.flush_publications().await;

        let stored = ledger.record(&record.record_id).unwrap();
        assert!(!stored.published);
        assert_eq!(
            stored.content_address,
            Some(mock_fallback_address(&record.record_hash))
        );
    }

    #[test]
    fn retention_removes_whole_chains_only() {
        let (ledger, clock) = ledger_with_clock();
        let old = ExecutionId::new("old");
        let fresh = ExecutionId::new("fresh");

        ledger.append(&old, summary()).unwrap();
        clock.advance(10);
        ledger.append(&old, summary()).unwrap();

        clock.advance(100_000);
        ledger.append(&fresh, summary()).unwrap();

        let removed = ledger.prune_older_than(50_000).unwrap();
        assert_eq!(removed, 2);
        assert!(ledger.records_for(&old).is_empty());
        assert_eq!(ledger.records_for(&fresh).len(), 1);
    }
}

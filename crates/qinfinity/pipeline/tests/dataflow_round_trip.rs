//! End-to-end data path: forward chain, inverse chain, ledger recording,
//! chain verification, and deterministic replay together.

use std::sync::Arc;

use qinfinity_ledger::ExecutionLedger;
use qinfinity_pipeline::{
    PipelineExecutor, ReplayComparator, ReplayConfig, SandboxStepRunner,
};
use qinfinity_ports::{
    MemoryAuditTrail, MemoryContentStore, MemoryEventBus, MemoryIndex, SandboxCrypto, SystemClock,
};
use qinfinity_types::{ExecutionId, IdentityRef, NodeId, ValidationOutcome};

fn executor_with_ledger() -> (Arc<PipelineExecutor>, ExecutionLedger, Arc<MemoryAuditTrail>) {
    let crypto = Arc::new(SandboxCrypto::default());
    let content = Arc::new(MemoryContentStore::new());
    let audit = Arc::new(MemoryAuditTrail::new());
    let clock = Arc::new(SystemClock);
    let bus = Arc::new(MemoryEventBus::new());

    let ledger = ExecutionLedger::new(NodeId::new("n1"), clock.clone()).with_bus(bus.clone());
    let runner = SandboxStepRunner::new(
        crypto.clone(),
        content,
        Arc::new(MemoryIndex::new()),
        audit.clone(),
        clock.clone(),
    );
    let executor = PipelineExecutor::new(Arc::new(runner), crypto, clock)
        .with_recorder(Arc::new(ledger.clone()))
        .with_bus(bus);

    (Arc::new(executor), ledger, audit)
}

#[tokio::test]
async fn forward_inverse_ledger_and_replay_agree() {
    let (executor, ledger, audit) = executor_with_ledger();
    let execution_id = ExecutionId::new("canonical-path");
    let actor = IdentityRef::new("alice");
    let payload = b"data that must survive the full forward and inverse chain".to_vec();

    let forward = executor
        .forward(&execution_id, &actor, &payload)
        .await
        .unwrap();
    assert!(!forward.failed);
    assert!(!forward.integrity_violated);

    let inverse = executor
        .inverse(&execution_id, &actor, forward.carried.clone())
        .await
        .unwrap();
    assert_eq!(inverse.output, payload);

    // Both runs landed in the ledger, and the chain verifies.
    let records = ledger.records_for(&execution_id);
    assert_eq!(records.len(), 2);
    assert!(records
        .iter()
        .all(|r| r.payload.validation == ValidationOutcome::Passed));

    let report = ledger.verify(&execution_id).unwrap();
    assert!(report.chain_valid);
    assert_eq!(report.total_records, 2);
    assert!(report.orphan_records.is_empty());

    // The audit step of the forward chain left a trail entry.
    assert!(!audit.events().is_empty());

    // Replaying the recorded inverse run is deterministic.
    let comparator = ReplayComparator::new(executor, Arc::new(SystemClock)).with_config(
        ReplayConfig {
            step_tolerance: 0.01,
            timing_tolerance: 1_000.0,
        },
    );
    let replay = comparator.replay(&execution_id).await.unwrap();
    assert!(replay.deterministic, "divergence at {:?}", replay.divergence_at);
}

#[tokio::test]
async fn failed_pipeline_records_failed_validation() {
    let (executor, ledger, _) = executor_with_ledger();
    let execution_id = ExecutionId::new("broken-path");
    let actor = IdentityRef::new("alice");

    // Inverse with no carried metadata fails at the retrieve step.
    let run = executor
        .inverse(&execution_id, &actor, Default::default())
        .await
        .unwrap();
    assert!(run.failed);

    let records = ledger.records_for(&execution_id);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].payload.validation, ValidationOutcome::Failed);
    assert_eq!(records[0].payload.step_count, 1);
}

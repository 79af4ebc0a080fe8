//! Execution traces kept for deterministic replay.

use std::collections::BTreeMap;

use dashmap::DashMap;
use qinfinity_types::ExecutionId;
use serde::{Deserialize, Serialize};

use crate::step::{StepKind, StepStatus};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceStep {
    pub kind: StepKind,
    pub input_hash: [u8; 32],
    pub output_hash: [u8; 32],
    pub duration_ms: u64,
    pub status: StepStatus,
}

/// Everything needed to re-run a recorded pipeline: the original input,
/// options, and the carried metadata it started from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionTrace {
    pub execution_id: ExecutionId,
    pub kinds: Vec<StepKind>,
    pub input: Vec<u8>,
    pub options: BTreeMap<String, String>,
    pub seed_carried: BTreeMap<String, String>,
    pub steps: Vec<TraceStep>,
    pub total_duration_ms: u64,
    pub integrity_violated: bool,
}

#[derive(Default)]
pub struct TraceStore {
    traces: DashMap<ExecutionId, ExecutionTrace>,
}

impl TraceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self, trace: ExecutionTrace) {
        self.traces.insert(trace.execution_id.clone(), trace);
    }

    pub fn get(&self, execution_id: &ExecutionId) -> Option<ExecutionTrace> {
        self.traces.get(execution_id).map(|t| t.clone())
    }

    pub fn len(&self) -> usize {
        self.traces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.traces.is_empty()
    }
}

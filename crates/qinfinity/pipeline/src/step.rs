//! Step vocabulary and the runner seam behind which the ecosystem's
//! transformation modules live.

use std::collections::BTreeMap;

use async_trait::async_trait;
use qinfinity_types::{ExecutionId, IdentityRef};
use serde::{Deserialize, Serialize};

use crate::error::PipelineResult;

/// The closed set of pipeline steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StepKind {
    Compress,
    Encrypt,
    Index,
    Audit,
    Store,
    Retrieve,
    Verify,
    Decrypt,
    Decompress,
}

impl StepKind {
    pub const FORWARD: [StepKind; 5] = [
        StepKind::Compress,
        StepKind::Encrypt,
        StepKind::Index,
        StepKind::Audit,
        StepKind::Store,
    ];

    pub const INVERSE: [StepKind; 4] = [
        StepKind::Retrieve,
        StepKind::Verify,
        StepKind::Decrypt,
        StepKind::Decompress,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StepKind::Compress => "compress",
            StepKind::Encrypt => "encrypt",
            StepKind::Index => "index",
            StepKind::Audit => "audit",
            StepKind::Store => "store",
            StepKind::Retrieve => "retrieve",
            StepKind::Verify => "verify",
            StepKind::Decrypt => "decrypt",
            StepKind::Decompress => "decompress",
        }
    }
}

impl std::fmt::Display for StepKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepStatus {
    Completed,
    Failed,
}

/// One executed step as recorded in the pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub step_id: String,
    pub kind: StepKind,
    pub input_hash: [u8; 32],
    pub output: Vec<u8>,
    pub metadata: BTreeMap<String, String>,
    pub duration_ms: u64,
    pub timestamp_ms: u64,
    pub status: StepStatus,
}

/// Context handed to every step. `carried` accumulates step metadata so
/// later inverse steps can find encryption parameters and store addresses.
#[derive(Debug, Clone)]
pub struct StepContext {
    pub execution_id: ExecutionId,
    pub actor: IdentityRef,
    pub options: BTreeMap<String, String>,
    pub carried: BTreeMap<String, String>,
}

impl StepContext {
    pub fn new(execution_id: ExecutionId, actor: IdentityRef) -> Self {
        Self {
            execution_id,
            actor,
            options: BTreeMap::new(),
            carried: BTreeMap::new(),
        }
    }

    pub fn with_options(mut self, options: BTreeMap<String, String>) -> Self {
        self.options = options;
        self
    }

    pub fn with_carried(mut self, carried: BTreeMap<String, String>) -> Self {
        self.carried = carried;
        self
    }
}

/// What a step hands back: the next step's input plus metadata merged into
/// the carried context.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutput {
    pub output: Vec<u8>,
    pub metadata: BTreeMap<String, String>,
}

impl StepOutput {
    pub fn passthrough(input: &[u8]) -> Self {
        Self {
            output: input.to_vec(),
            metadata: BTreeMap::new(),
        }
    }
}

/// Seam behind which the ecosystem's transformation modules live.
#[async_trait]
pub trait StepRunner: Send + Sync {
    async fn run(
        &self,
        kind: StepKind,
        input: &[u8],
        context: &StepContext,
    ) -> PipelineResult<StepOutput>;
}

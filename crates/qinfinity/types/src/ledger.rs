//! Value types shared between the pipeline executor and the execution
//! ledger. They cross the crate boundary by value, so they live here.

use serde::{Deserialize, Serialize};

/// Outcome of the validation phase of one recorded execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationOutcome {
    Passed,
    Failed,
    Skipped,
}

/// What a ledger record summarizes about an execution phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadSummary {
    pub step_count: u32,
    pub duration_ms: u64,
    pub validation: ValidationOutcome,
}

impl PayloadSummary {
    pub fn new(step_count: u32, duration_ms: u64, validation: ValidationOutcome) -> Self {
        Self {
            step_count,
            duration_ms,
            validation,
        }
    }
}

//! Cross-component seams that keep the core acyclic: the pipeline records
//! executions and exports metrics through these traits rather than by
//! importing the ledger or observability services directly.

use qinfinity_types::{ExecutionId, PayloadSummary};

use crate::error::PortResult;

/// Sink for completed-execution summaries (implemented by the ledger).
pub trait ExecutionRecorder: Send + Sync {
    fn record_execution(
        &self,
        execution_id: &ExecutionId,
        summary: PayloadSummary,
    ) -> PortResult<()>;
}

/// Sink for point-in-time metric samples (implemented by observability).
pub trait MetricSink: Send + Sync {
    fn record_metric(&self, name: &str, value: f64, labels: &[(&str, &str)]);
}

/// Discards every sample; for callers that run without observability.
pub struct NullMetricSink;

impl MetricSink for NullMetricSink {
    fn record_metric(&self, _name: &str, _value: f64, _labels: &[(&str, &str)]) {}
}

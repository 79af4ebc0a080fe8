//! Deterministic replay: re-run a recorded pipeline from its original
//! inputs and diff the result within tolerance.

use std::sync::Arc;

use qinfinity_ports::{ClockPort, EventBusPort};
use qinfinity_types::{topics, EventActor, EventEnvelope, ExecutionId};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::error::{PipelineError, PipelineResult};
use crate::executor::PipelineExecutor;
use crate::step::StepContext;

#[derive(Debug, Clone)]
pub struct ReplayConfig {
    /// Allowed relative step-count divergence.
    pub step_tolerance: f64,
    /// Allowed relative total-duration divergence.
    pub timing_tolerance: f64,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            step_tolerance: 0.01,
            timing_tolerance: 0.10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplaySeverity {
    None,
    /// Timing drifted beyond tolerance; outputs identical.
    Minor,
    /// Output hashes or the step structure diverged.
    Major,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayReport {
    pub execution_id: ExecutionId,
    pub deterministic: bool,
    pub divergence_at: Option<String>,
    pub severity: ReplaySeverity,
    pub original_steps: usize,
    pub replayed_steps: usize,
    pub original_duration_ms: u64,
    pub replayed_duration_ms: u64,
}

pub struct ReplayComparator {
    executor: Arc<PipelineExecutor>,
    clock: Arc<dyn ClockPort>,
    bus: Option<Arc<dyn EventBusPort>>,
    config: ReplayConfig,
}

impl ReplayComparator {
    pub fn new(executor: Arc<PipelineExecutor>, clock: Arc<dyn ClockPort>) -> Self {
        Self {
            executor,
            clock,
            bus: None,
            config: ReplayConfig::default(),
        }
    }

    pub fn with_bus(mut self, bus: Arc<dyn EventBusPort>) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn with_config(mut self, config: ReplayConfig) -> Self {
        self.config = config;
        self
    }

    /// Re-execute the recorded pipeline for `execution_id` and compare.
    ///
    /// The verdict is "deterministic" only when step-count divergence is
    /// within tolerance, every per-step output hash matches exactly, and
    /// total duration drifted no more than the timing tolerance.
    pub async fn replay(&self, execution_id: &ExecutionId) -> PipelineResult<ReplayReport> {
        let trace = self
            .executor
            .traces()
            .get(execution_id)
            .ok_or_else(|| PipelineError::TraceNotFound(execution_id.to_string()))?;

        let context = StepContext::new(execution_id.clone(), EventActor::system().identity)
            .with_options(trace.options.clone())
            .with_carried(trace.seed_carried.clone());
        let replayed = self
            .executor
            .execute_unrecorded(context, &trace.kinds, &trace.input)
            .await?;

        let mut divergence_at = None;
        let mut severity = ReplaySeverity::None;

        let original_steps = trace.steps.len();
        let replayed_steps = replayed.steps.len();
        let step_divergence = if original_steps == 0 {
            if replayed_steps == 0 { 0.0 } else { 1.0 }
        } else {
            (original_steps as f64 - replayed_steps as f64).abs() / original_steps as f64
        };
        if step_divergence > self.config.step_tolerance {
            severity = ReplaySeverity::Major;
            divergence_at = trace
                .steps
                .get(replayed_steps.min(original_steps))
                .map(|step| format!("{}-{}", step.kind, replayed_steps.min(original_steps)));
        }

        if severity == ReplaySeverity::None {
            for (position, (original, replay)) in
                trace.steps.iter().zip(replayed.steps.iter()).enumerate()
            {
                let replay_output_hash = blake3::hash(&replay.output);
                if replay_output_hash.as_bytes() != &original.output_hash {
                    severity = ReplaySeverity::Major;
                    divergence_at = Some(format!("{}-{}", original.kind, position));
                    break;
                }
            }
        }

        let timing_ok = if trace.total_duration_ms == 0 {
            true
        } else {
            let delta =
                (replayed.total_duration_ms as f64 - trace.total_duration_ms as f64).abs();
            delta / trace.total_duration_ms as f64 <= self.config.timing_tolerance
        };
        if !timing_ok && severity == ReplaySeverity::None {
            severity = ReplaySeverity::Minor;
            divergence_at = Some("total-duration".into());
        }

        let report = ReplayReport {
            execution_id: execution_id.clone(),
            deterministic: severity == ReplaySeverity::None,
            divergence_at,
            severity,
            original_steps,
            replayed_steps,
            original_duration_ms: trace.total_duration_ms,
            replayed_duration_ms: replayed.total_duration_ms,
        };

        info!(
            execution_id = %execution_id,
            deterministic = report.deterministic,
            severity = ?report.severity,
            "replay comparison finished"
        );

        if let Some(bus) = &self.bus {
            let envelope = EventEnvelope::new(
                topics::DATAFLOW_REPLAY_COMPLETED,
                self.clock.now_ms(),
                EventActor::system(),
                json!({
                    "execution_id": execution_id.to_string(),
                    "deterministic": report.deterministic,
                    "divergence_at": report.divergence_at,
                }),
            )
            .with_correlation(execution_id.to_string());
            let _ = bus.publish(envelope);
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::SandboxStepRunner;
    use qinfinity_ports::{
        MemoryAuditTrail, MemoryContentStore, MemoryIndex, SandboxCrypto, SystemClock,
    };
    use qinfinity_types::IdentityRef;

    fn executor() -> Arc<PipelineExecutor> {
        let crypto = Arc::new(SandboxCrypto::default());
        let runner = SandboxStepRunner::new(
            crypto.clone(),
            Arc::new(MemoryContentStore::new()),
            Arc::new(MemoryIndex::new()),
            Arc::new(MemoryAuditTrail::new()),
            Arc::new(SystemClock),
        );
        Arc::new(PipelineExecutor::new(
            Arc::new(runner),
            crypto,
            Arc::new(SystemClock),
        ))
    }

    #[tokio::test]
    async fn deterministic_forward_run_replays_clean() {
        let executor = executor();
        let execution_id = ExecutionId::new("replay-1");

        executor
            .forward(&execution_id, &IdentityRef::new("alice"), b"replayable payload")
            .await
            .unwrap();

        let comparator = ReplayComparator::new(executor, Arc::new(SystemClock))
            .with_config(ReplayConfig {
                step_tolerance: 0.01,
                timing_tolerance: 1_000.0,
            });
        let report = comparator.replay(&execution_id).await.unwrap();
        assert!(report.deterministic);
        assert_eq!(report.severity, ReplaySeverity::None);
        assert_eq!(report.original_steps, report.replayed_steps);
    }

    #[tokio::test]
    async fn missing_trace_is_not_found() {
        let executor = executor();
        let comparator = ReplayComparator::new(executor, Arc::new(SystemClock));

        let error = comparator
            .replay(&ExecutionId::new("absent"))
            .await
            .unwrap_err();
        assert!(matches!(error, PipelineError::TraceNotFound(_)));
    }

    #[tokio::test]
    async fn replay_does_not_pollute_the_trace_store() {
        let executor = executor();
        let execution_id = ExecutionId::new("replay-2");

        executor
            .forward(&execution_id, &IdentityRef::new("alice"), b"data")
            .await
            .unwrap();
        let before = executor.traces().len();

        let comparator = ReplayComparator::new(executor.clone(), Arc::new(SystemClock))
            .with_config(ReplayConfig {
                step_tolerance: 0.01,
                timing_tolerance: 1_000.0,
            });
        comparator.replay(&execution_id).await.unwrap();

        assert_eq!(executor.traces().len(), before);
    }
}

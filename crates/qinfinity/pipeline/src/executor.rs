//! Ordered step execution with hash linkage, ledger recording, and metric
//! export.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use qinfinity_ports::{
    ClockPort, CryptoPort, EventBusPort, ExecutionRecorder, MetricSink, NullMetricSink,
};
use qinfinity_types::{
    topics, EventActor, EventEnvelope, ExecutionId, IdentityRef, PayloadSummary, ValidationOutcome,
};
use serde_json::json;
use tracing::{info, warn};

use crate::error::{PipelineError, PipelineResult};
use crate::step::{StepContext, StepKind, StepRecord, StepRunner, StepStatus};
use crate::trace::{ExecutionTrace, TraceStep, TraceStore};

/// Outcome of one pipeline run, including the partial chain when a step
/// failed.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub execution_id: ExecutionId,
    pub steps: Vec<StepRecord>,
    pub output: Vec<u8>,
    /// Carried metadata after the run; feeds the inverse pipeline.
    pub carried: BTreeMap<String, String>,
    pub total_duration_ms: u64,
    pub failed: bool,
    pub integrity_violated: bool,
    /// Bytes of final output per second of total duration.
    pub throughput_bps: f64,
}

pub struct PipelineExecutor {
    runner: Arc<dyn StepRunner>,
    crypto: Arc<dyn CryptoPort>,
    clock: Arc<dyn ClockPort>,
    recorder: Option<Arc<dyn ExecutionRecorder>>,
    metrics: Arc<dyn MetricSink>,
    bus: Option<Arc<dyn EventBusPort>>,
    traces: Arc<TraceStore>,
}

impl PipelineExecutor {
    pub fn new(
        runner: Arc<dyn StepRunner>,
        crypto: Arc<dyn CryptoPort>,
        clock: Arc<dyn ClockPort>,
    ) -> Self {
        Self {
            runner,
            crypto,
            clock,
            recorder: None,
            metrics: Arc::new(NullMetricSink),
            bus: None,
            traces: Arc::new(TraceStore::new()),
        }
    }

    pub fn with_recorder(mut self, recorder: Arc<dyn ExecutionRecorder>) -> Self {
        self.recorder = Some(recorder);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn MetricSink>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_bus(mut self, bus: Arc<dyn EventBusPort>) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn traces(&self) -> Arc<TraceStore> {
        Arc::clone(&self.traces)
    }

    /// Run the canonical forward chain over `input`.
    pub async fn forward(
        &self,
        execution_id: &ExecutionId,
        actor: &IdentityRef,
        input: &[u8],
    ) -> PipelineResult<PipelineRun> {
        let context = StepContext::new(execution_id.clone(), actor.clone());
        self.execute(context, &StepKind::FORWARD, input).await
    }

    /// Run the inverse chain using the carried metadata of a forward run.
    pub async fn inverse(
        &self,
        execution_id: &ExecutionId,
        actor: &IdentityRef,
        carried: BTreeMap<String, String>,
    ) -> PipelineResult<PipelineRun> {
        let context =
            StepContext::new(execution_id.clone(), actor.clone()).with_carried(carried);
        self.execute(context, &StepKind::INVERSE, &[]).await
    }

    pub async fn execute(
        &self,
        context: StepContext,
        kinds: &[StepKind],
        input: &[u8],
    ) -> PipelineResult<PipelineRun> {
        self.execute_inner(context, kinds, input, true).await
    }

    /// Re-execution path used by the replay comparator: identical
    /// semantics, but neither the trace store nor the ledger is touched.
    pub(crate) async fn execute_unrecorded(
        &self,
        context: StepContext,
        kinds: &[StepKind],
        input: &[u8],
    ) -> PipelineResult<PipelineRun> {
        self.execute_inner(context, kinds, input, false).await
    }

    async fn execute_inner(
        &self,
        mut context: StepContext,
        kinds: &[StepKind],
        input: &[u8],
        record: bool,
    ) -> PipelineResult<PipelineRun> {
        if kinds.is_empty() {
            return Err(PipelineError::EmptyPipeline);
        }

        let seed_carried = context.carried.clone();
        let started = Instant::now();
        let mut current = input.to_vec();
        let mut expected_hash = self.crypto.hash(&current);
        let mut steps: Vec<StepRecord> = Vec::with_capacity(kinds.len());
        let mut failed = false;
        let mut integrity_violated = false;

        for (position, &kind) in kinds.iter().enumerate() {
            // step[i+1].input hash must equal H(step[i].output).
            let input_hash = self.crypto.hash(&current);
            if input_hash != expected_hash {
                warn!(
                    execution_id = %context.execution_id,
                    step = %kind,
                    "input hash does not match previous output; pipeline integrity violated"
                );
                integrity_violated = true;
                break;
            }

            let step_started = Instant::now();
            let outcome = self.runner.run(kind, &current, &context).await;
            let duration_ms = step_started.elapsed().as_millis() as u64;
            let timestamp_ms = self.clock.now_ms();
            let step_id = format!("{}/{}-{}", context.execution_id.as_str(), kind, position);

            match outcome {
                Ok(step_output) => {
                    expected_hash = self.crypto.hash(&step_output.output);
                    context.carried.extend(step_output.metadata.clone());
                    self.metrics.record_metric(
                        "pipeline_step_duration_ms",
                        duration_ms as f64,
                        &[("step", kind.as_str())],
                    );
                    steps.push(StepRecord {
                        step_id,
                        kind,
                        input_hash,
                        output: step_output.output.clone(),
                        metadata: step_output.metadata,
                        duration_ms,
                        timestamp_ms,
                        status: StepStatus::Completed,
                    });
                    current = step_output.output;
                }
                Err(error) => {
                    warn!(
                        execution_id = %context.execution_id,
                        step = %kind,
                        %error,
                        "pipeline step failed; aborting remaining steps"
                    );
                    if error.kind() == qinfinity_types::ErrorKind::IntegrityViolation {
                        integrity_violated = true;
                    }
                    steps.push(StepRecord {
                        step_id,
                        kind,
                        input_hash,
                        output: Vec::new(),
                        metadata: BTreeMap::new(),
                        duration_ms,
                        timestamp_ms,
                        status: StepStatus::Failed,
                    });
                    failed = true;
                    break;
                }
            }
        }

        let total_duration_ms = started.elapsed().as_millis() as u64;
        let validation = if failed || integrity_violated {
            ValidationOutcome::Failed
        } else {
            ValidationOutcome::Passed
        };

        let throughput_bps = if total_duration_ms == 0 {
            current.len() as f64 * 1_000.0
        } else {
            current.len() as f64 * 1_000.0 / total_duration_ms as f64
        };

        if record {
            if let Some(recorder) = &self.recorder {
                if let Err(error) = recorder.record_execution(
                    &context.execution_id,
                    PayloadSummary::new(steps.len() as u32, total_duration_ms, validation),
                ) {
                    warn!(%error, "pipeline ledger recording failed");
                }
            }

            self.traces.store(ExecutionTrace {
                execution_id: context.execution_id.clone(),
                kinds: kinds.to_vec(),
                input: input.to_vec(),
                options: context.options.clone(),
                seed_carried,
                steps: steps
                    .iter()
                    .map(|step| TraceStep {
                        kind: step.kind,
                        input_hash: step.input_hash,
                        output_hash: self.crypto.hash(&step.output),
                        duration_ms: step.duration_ms,
                        status: step.status,
                    })
                    .collect(),
                total_duration_ms,
                integrity_violated,
            });

            self.emit_completion(&context.execution_id, kinds, &steps, validation);
        }

        info!(
            execution_id = %context.execution_id,
            steps = steps.len(),
            total_duration_ms,
            failed,
            "pipeline run finished"
        );

        Ok(PipelineRun {
            execution_id: context.execution_id,
            steps,
            output: current,
            carried: context.carried,
            total_duration_ms,
            failed,
            integrity_violated,
            throughput_bps,
        })
    }

    fn emit_completion(
        &self,
        execution_id: &ExecutionId,
        kinds: &[StepKind],
        steps: &[StepRecord],
        validation: ValidationOutcome,
    ) {
        let Some(bus) = &self.bus else {
            return;
        };
        let topic = if kinds == StepKind::FORWARD.as_slice() {
            topics::DATAFLOW_INPUT_COMPLETED
        } else if kinds == StepKind::INVERSE.as_slice() {
            topics::DATAFLOW_OUTPUT_COMPLETED
        } else {
            return;
        };

        let envelope = EventEnvelope::new(
            topic,
            self.clock.now_ms(),
            EventActor::system(),
            json!({
                "execution_id": execution_id.to_string(),
                "steps": steps.len(),
                "validation": validation,
            }),
        )
        .with_correlation(execution_id.to_string());
        let _ = bus.publish(envelope);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::SandboxStepRunner;
    use async_trait::async_trait;
    use qinfinity_ports::{
        MemoryAuditTrail, MemoryContentStore, MemoryEventBus, MemoryIndex, SandboxCrypto,
        SystemClock,
    };
    use qinfinity_types::ErrorKind;

    fn executor() -> PipelineExecutor {
        let crypto = Arc::new(SandboxCrypto::default());
        let runner = SandboxStepRunner::new(
            crypto.clone(),
            Arc::new(MemoryContentStore::new()),
            Arc::new(MemoryIndex::new()),
            Arc::new(MemoryAuditTrail::new()),
            Arc::new(SystemClock),
        );
        PipelineExecutor::new(Arc::new(runner), crypto, Arc::new(SystemClock))
    }

    fn alice() -> IdentityRef {
        IdentityRef::new("alice")
    }

    #[tokio::test]
    async fn empty_pipeline_is_rejected() {
        let executor = executor();
        let context = StepContext::new(ExecutionId::new("e"), alice());
        let error = executor.execute(context, &[], b"data").await.unwrap_err();
        assert_eq!(error, PipelineError::EmptyPipeline);
        assert_eq!(error.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn forward_then_inverse_round_trips() {
        let executor = executor();
        let execution_id = ExecutionId::new("flow-rt");
        let payload = b"the canonical data path exercises every module".to_vec();

        let forward = executor
            .forward(&execution_id, &alice(), &payload)
            .await
            .unwrap();
        assert!(!forward.failed);
        assert!(!forward.integrity_violated);
        assert_eq!(forward.steps.len(), 5);

        let inverse = executor
            .inverse(&execution_id, &alice(), forward.carried.clone())
            .await
            .unwrap();
        assert!(!inverse.failed);
        assert_eq!(inverse.steps.len(), 4);
        assert_eq!(inverse.output, payload);
    }

    #[tokio::test]
    async fn step_hash_linkage_holds_across_the_chain() {
        let executor = executor();
        let crypto = SandboxCrypto::default();
        let execution_id = ExecutionId::new("flow-hash");

        let run = executor
            .forward(&execution_id, &alice(), b"linkage")
            .await
            .unwrap();

        for pair in run.steps.windows(2) {
            assert_eq!(pair[1].input_hash, crypto.hash(&pair[0].output));
        }
    }

    #[tokio::test]
    async fn failing_step_records_partial_chain() {
        let executor = executor();
        let execution_id = ExecutionId::new("flow-fail");

        // Inverse without carried metadata: retrieve fails immediately.
        let run = executor
            .inverse(&execution_id, &alice(), BTreeMap::new())
            .await
            .unwrap();
        assert!(run.failed);
        assert_eq!(run.steps.len(), 1);
        assert_eq!(run.steps[0].status, StepStatus::Failed);
    }

    #[tokio::test]
    async fn run_is_traced_and_emitted() {
        let crypto = Arc::new(SandboxCrypto::default());
        let runner = SandboxStepRunner::new(
            crypto.clone(),
            Arc::new(MemoryContentStore::new()),
            Arc::new(MemoryIndex::new()),
            Arc::new(MemoryAuditTrail::new()),
            Arc::new(SystemClock),
        );
        let bus = Arc::new(MemoryEventBus::new());
        let executor = PipelineExecutor::new(Arc::new(runner), crypto, Arc::new(SystemClock))
            .with_bus(bus.clone());

        let execution_id = ExecutionId::new("flow-trace");
        executor
            .forward(&execution_id, &alice(), b"traced")
            .await
            .unwrap();

        let trace = executor.traces().get(&execution_id).unwrap();
        assert_eq!(trace.steps.len(), 5);
        assert_eq!(trace.input, b"traced".to_vec());
        assert_eq!(bus.stats().events_published, 1);
    }

    struct MutatingRunner {
        inner: SandboxStepRunner,
    }

    #[async_trait]
    impl StepRunner for MutatingRunner {
        async fn run(
            &self,
            kind: StepKind,
            input: &[u8],
            context: &StepContext,
        ) -> PipelineResult<crate::step::StepOutput> {
            let mut out = self.inner.run(kind, input, context).await?;
            if kind == StepKind::Encrypt {
                // Report different bytes than were produced.
                out.output.push(0xFF);
            }
            Ok(out)
        }
    }

    #[tokio::test]
    async fn throughput_is_reported() {
        let executor = executor();
        let run = executor
            .forward(&ExecutionId::new("flow-tp"), &alice(), &vec![7u8; 4096])
            .await
            .unwrap();
        assert!(run.throughput_bps > 0.0);
    }

    #[tokio::test]
    async fn mutated_cipher_is_caught_by_verify() {
        let crypto = Arc::new(SandboxCrypto::default());
        let content = Arc::new(MemoryContentStore::new());
        let inner = SandboxStepRunner::new(
            crypto.clone(),
            content.clone(),
            Arc::new(MemoryIndex::new()),
            Arc::new(MemoryAuditTrail::new()),
            Arc::new(SystemClock),
        );
        let executor = PipelineExecutor::new(
            Arc::new(MutatingRunner { inner }),
            crypto.clone(),
            Arc::new(SystemClock),
        );

        let execution_id = ExecutionId::new("flow-mut");
        let forward = executor
            .forward(&execution_id, &alice(), b"payload")
            .await
            .unwrap();
        assert!(!forward.failed);

        // The stored cipher no longer matches the recorded cipher hash, so
        // the inverse verify step rejects it.
        let sandbox = SandboxStepRunner::new(
            crypto.clone(),
            content,
            Arc::new(MemoryIndex::new()),
            Arc::new(MemoryAuditTrail::new()),
            Arc::new(SystemClock),
        );
        let honest = PipelineExecutor::new(Arc::new(sandbox), crypto, Arc::new(SystemClock));
        let inverse = honest
            .inverse(&execution_id, &alice(), forward.carried.clone())
            .await
            .unwrap();
        assert!(inverse.failed);
        assert_eq!(inverse.steps.last().unwrap().kind, StepKind::Verify);
    }
}

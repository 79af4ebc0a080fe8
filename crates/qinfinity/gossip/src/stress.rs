//! Bounded-parallelism stress harness: N simulated events in batches of
//! B, with a small injected failure rate, reported with percentile
//! accounting. A started run is never cancelled — the run itself is the
//! cancellation unit.

use std::sync::Arc;
use std::time::Instant;

use qinfinity_ports::{ArtifactStore, EventBusPort, RandomSource};
use qinfinity_types::{topics, EventActor, EventEnvelope};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::error::{GossipError, GossipResult};

#[derive(Debug, Clone)]
pub struct StressConfig {
    pub events: usize,
    pub parallelism: usize,
    /// Probability that a simulated event fails.
    pub failure_rate: f64,
    pub max_error_rate: f64,
    pub min_work_ms: u64,
    pub max_work_ms: u64,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            events: 1_000,
            parallelism: 50,
            failure_rate: 0.02,
            max_error_rate: 0.05,
            min_work_ms: 1,
            max_work_ms: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StressReport {
    pub total_events: usize,
    pub completed: usize,
    pub errors: usize,
    pub error_rate: f64,
    pub duration_ms: u64,
    pub throughput_eps: f64,
    pub latency_p50_ms: f64,
    pub latency_p95_ms: f64,
    pub latency_p99_ms: f64,
    pub latency_min_ms: f64,
    pub latency_max_ms: f64,
    pub passed: bool,
}

pub struct StressHarness {
    config: StressConfig,
    random: Arc<dyn RandomSource>,
    bus: Option<Arc<dyn EventBusPort>>,
    artifacts: Option<Arc<ArtifactStore>>,
}

impl StressHarness {
    pub fn new(config: StressConfig, random: Arc<dyn RandomSource>) -> Self {
        Self {
            config,
            random,
            bus: None,
            artifacts: None,
        }
    }

    pub fn with_bus(mut self, bus: Arc<dyn EventBusPort>) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn with_artifacts(mut self, artifacts: Arc<ArtifactStore>) -> Self {
        self.artifacts = Some(artifacts);
        self
    }

    pub async fn run(&self) -> GossipResult<StressReport> {
        if self.config.events == 0 {
            return Err(GossipError::InvalidStressConfig("zero events".into()));
        }
        if self.config.parallelism == 0 {
            return Err(GossipError::InvalidStressConfig("zero parallelism".into()));
        }
        if self.config.max_work_ms < self.config.min_work_ms {
            return Err(GossipError::InvalidStressConfig(
                "max_work_ms below min_work_ms".into(),
            ));
        }

        let started = Instant::now();
        let mut latencies: Vec<f64> = Vec::with_capacity(self.config.events);
        let mut errors = 0usize;

        let mut remaining = self.config.events;
        while remaining > 0 {
            let batch = remaining.min(self.config.parallelism);
            remaining -= batch;

            let tasks = (0..batch).map(|_| {
                let work_span = self.config.max_work_ms - self.config.min_work_ms;
                let work_ms = self.config.min_work_ms
                    + if work_span == 0 {
                        0
                    } else {
                        self.random.pick(work_span as usize + 1) as u64
                    };
                let fails = self.random.next_f64() < self.config.failure_rate;

                tokio::spawn(async move {
                    let event_started = Instant::now();
                    tokio::time::sleep(std::time::Duration::from_millis(work_ms)).await;
                    let latency_ms = event_started.elapsed().as_secs_f64() * 1_000.0;
                    (latency_ms, fails)
                })
            });

            for joined in futures::future::join_all(tasks).await {
                match joined {
                    Ok((latency_ms, true)) => {
                        errors += 1;
                        latencies.push(latency_ms);
                    }
                    Ok((latency_ms, false)) => latencies.push(latency_ms),
                    Err(_) => errors += 1,
                }
            }
        }

        let duration_ms = started.elapsed().as_millis() as u64;
        let error_rate = errors as f64 / self.config.events as f64;
        let throughput_eps = if duration_ms == 0 {
            self.config.events as f64 * 1_000.0
        } else {
            self.config.events as f64 * 1_000.0 / duration_ms as f64
        };

        let report = StressReport {
            total_events: self.config.events,
            completed: self.config.events - errors,
            errors,
            error_rate,
            duration_ms,
            throughput_eps,
            latency_p50_ms: percentile(&latencies, 50.0),
            latency_p95_ms: percentile(&latencies, 95.0),
            latency_p99_ms: percentile(&latencies, 99.0),
            latency_min_ms: latencies.iter().copied().fold(f64::INFINITY, f64::min),
            latency_max_ms: latencies.iter().copied().fold(0.0, f64::max),
            passed: error_rate <= self.config.max_error_rate,
        };

        info!(
            events = report.total_events,
            errors = report.errors,
            throughput_eps = report.throughput_eps,
            passed = report.passed,
            "stress run finished"
        );

        if let Some(artifacts) = &self.artifacts {
            let _ = artifacts.save("stress", "stress-report", &report);
        }
        if let Some(bus) = &self.bus {
            let envelope = EventEnvelope::new(
                topics::DATAFLOW_STRESS_COMPLETED,
                0,
                EventActor::system(),
                json!({
                    "events": report.total_events,
                    "error_rate": report.error_rate,
                    "throughput_eps": report.throughput_eps,
                    "passed": report.passed,
                }),
            );
            let _ = bus.publish(envelope);
        }

        Ok(report)
    }
}

fn percentile(samples: &[f64], p: f64) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let rank = ((p / 100.0) * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}

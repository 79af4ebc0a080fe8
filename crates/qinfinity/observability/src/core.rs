//! The shared observability facade: request recording, cache accounting,
//! snapshot production, and the lifecycle-bound background tasks.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use qinfinity_ports::{ClockPort, EventBusPort, MetricSink};
use qinfinity_types::PerfSnapshot;
use tracing::info;

use crate::anomaly::AnomalyDetector;
use crate::config::{DependencyOptions, ObservabilityConfig};
use crate::dependency::{DependencyChecker, DependencyRegistry, DependencyStatus};
use crate::error::{ObservabilityError, ObservabilityResult};
use crate::latency::LatencyBuffer;
use crate::metrics::{MetricSample, MetricStore};
use crate::slo::{SloEvaluator, SloViolation};

pub struct ObservabilityCore {
    config: ObservabilityConfig,
    latencies: RwLock<LatencyBuffer>,
    requests: AtomicU64,
    errors: AtomicU64,
    cache_hits: AtomicU64,
    cache_lookups: AtomicU64,
    last_slo_eval_ms: AtomicU64,
    metrics: Arc<MetricStore>,
    anomalies: AnomalyDetector,
    slo: SloEvaluator,
    dependencies: Arc<DependencyRegistry>,
    clock: Arc<dyn ClockPort>,
    tasks: Mutex<Vec<tokio::task::JoinHandle<()>>>,
}

impl ObservabilityCore {
    pub fn new(
        config: ObservabilityConfig,
        clock: Arc<dyn ClockPort>,
        bus: Arc<dyn EventBusPort>,
    ) -> Self {
        let anomalies = AnomalyDetector::new(
            config.anomaly_min_samples,
            config.anomaly_z_threshold,
            config.anomaly_critical_z,
        );
        let slo = SloEvaluator::new(config.slo.clone(), bus);
        let latencies = RwLock::new(LatencyBuffer::new(config.latency_buffer_size));

        Self {
            config,
            latencies,
            requests: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            cache_lookups: AtomicU64::new(0),
            last_slo_eval_ms: AtomicU64::new(0),
            metrics: Arc::new(MetricStore::new()),
            anomalies,
            slo,
            dependencies: Arc::new(DependencyRegistry::new()),
            clock,
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Record one handled request.
    pub fn record(&self, duration_ms: f64, status: u16, path: &str, method: &str) {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if status >= 500 {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }

        if let Ok(mut buffer) = self.latencies.write() {
            buffer.record(duration_ms);
        }

        let now_ms = self.clock.now_ms();
        self.metrics.record(
            MetricSample::new("request_latency_ms", duration_ms, now_ms)
                .with_labels(&[("path", path), ("method", method)]),
        );
        self.anomalies
            .observe(&format!("request_latency_ms:{path}"), duration_ms);

        self.maybe_evaluate_slo(now_ms);
    }

    /// Record a cache lookup outcome feeding the cache-hit-rate gate.
    pub fn record_cache(&self, hit: bool) {
        self.cache_lookups.fetch_add(1, Ordering::SeqCst);
        if hit {
            self.cache_hits.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn maybe_evaluate_slo(&self, now_ms: u64) {
        let cooldown_ms = self.config.slo_cooldown.as_millis() as u64;
        let last = self.last_slo_eval_ms.load(Ordering::SeqCst);
        if now_ms.saturating_sub(last) < cooldown_ms {
            return;
        }
        if self
            .last_slo_eval_ms
            .compare_exchange(last, now_ms, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            self.slo.evaluate(&self.snapshot(), now_ms);
        }
    }

    /// Force an SLO evaluation regardless of the cooldown.
    pub fn evaluate_slo(&self) -> Vec<SloViolation> {
        self.slo.evaluate(&self.snapshot(), self.clock.now_ms())
    }

    pub fn snapshot(&self) -> PerfSnapshot {
        let requests = self.requests.load(Ordering::SeqCst);
        let errors = self.errors.load(Ordering::SeqCst);
        let error_rate = if requests == 0 {
            0.0
        } else {
            errors as f64 / requests as f64
        };

        let lookups = self.cache_lookups.load(Ordering::SeqCst);
        let cache_hit_rate = if lookups == 0 {
            1.0
        } else {
            self.cache_hits.load(Ordering::SeqCst) as f64 / lookups as f64
        };

        let (p50, p95, p99, avg) = self
            .latencies
            .read()
            .map(|buffer| {
                (
                    buffer.percentile(50.0),
                    buffer.percentile(95.0),
                    buffer.percentile(99.0),
                    buffer.average(),
                )
            })
            .unwrap_or((0.0, 0.0, 0.0, 0.0));

        PerfSnapshot {
            p50_ms: p50,
            p95_ms: p95,
            p99_ms: p99,
            avg_ms: avg,
            error_rate,
            burn_rate: error_rate / self.config.slo.error_budget,
            cache_hit_rate,
            request_count: requests,
            error_count: errors,
            critical_anomalies: self.anomalies.critical_count(),
        }
    }

    pub fn register_dependency(
        &self,
        name: &str,
        checker: DependencyChecker,
        options: DependencyOptions,
    ) -> ObservabilityResult<()> {
        self.dependencies.register(name, checker, options)
    }

    pub fn dependency_status(&self, name: &str) -> Option<DependencyStatus> {
        self.dependencies.status(name)
    }

    pub fn dependency_statuses(&self) -> Vec<DependencyStatus> {
        self.dependencies.statuses()
    }

    /// One immediate polling pass over every due dependency.
    pub async fn poll_dependencies(&self) -> Vec<String> {
        self.dependencies
            .poll_due(
                self.clock.now_ms(),
                self.config.poll_interval,
                self.config.check_timeout,
            )
            .await
    }

    pub fn metrics(&self) -> &MetricStore {
        &self.metrics
    }

    pub fn anomalies(&self) -> &AnomalyDetector {
        &self.anomalies
    }

    /// Start the dependency poller and the retention eviction loop.
    pub fn start(&self) -> ObservabilityResult<()> {
        let mut tasks = self
            .tasks
            .lock()
            .map_err(|_| ObservabilityError::Internal("task registry poisoned".into()))?;
        if !tasks.is_empty() {
            return Err(ObservabilityError::AlreadyStarted);
        }

        let dependencies = Arc::clone(&self.dependencies);
        let clock = Arc::clone(&self.clock);
        let poll_interval = self.config.poll_interval;
        let check_timeout = self.config.check_timeout;
        tasks.push(tokio::spawn(async move {
            let mut interval = tokio::time::interval(poll_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                dependencies
                    .poll_due(clock.now_ms(), poll_interval, check_timeout)
                    .await;
            }
        }));

        let metrics = Arc::clone(&self.metrics);
        let clock = Arc::clone(&self.clock);
        let retention_ms = self.config.retention.as_millis() as u64;
        let eviction_interval = self.config.eviction_interval;
        tasks.push(tokio::spawn(async move {
            let mut interval = tokio::time::interval(eviction_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                let cutoff = clock.now_ms().saturating_sub(retention_ms);
                let evicted = metrics.evict_older_than(cutoff);
                if evicted > 0 {
                    info!(evicted, "metric samples evicted by retention");
                }
            }
        }));

        Ok(())
    }

    /// Cancel the background tasks. Safe to call when never started.
    pub fn stop(&self) {
        if let Ok(mut tasks) = self.tasks.lock() {
            for task in tasks.drain(..) {
                task.abort();
            }
        }
    }
}

impl Drop for ObservabilityCore {
    fn drop(&mut self) {
        self.stop();
    }
}

impl MetricSink for ObservabilityCore {
    fn record_metric(&self, name: &str, value: f64, labels: &[(&str, &str)]) {
        let now_ms = self.clock.now_ms();
        self.metrics
            .record(MetricSample::new(name, value, now_ms).with_labels(labels));
        self.anomalies.observe(name, value);
    }
}

//! Performance gates evaluated over the observability snapshot.

use std::sync::Arc;

use qinfinity_ports::{ArtifactStore, ClockPort, EventBusPort};
use qinfinity_types::{topics, EventActor, EventEnvelope, PerfSnapshot};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct GateThresholds {
    pub p95_max_ms: f64,
    pub p99_max_ms: f64,
    pub burn_rate_max: f64,
    pub cache_hit_min: f64,
}

impl Default for GateThresholds {
    fn default() -> Self {
        Self {
            p95_max_ms: 150.0,
            p99_max_ms: 200.0,
            burn_rate_max: 0.10,
            cache_hit_min: 0.85,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateResult {
    pub name: String,
    pub observed: f64,
    pub limit: f64,
    pub passed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GateStatus {
    Passed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateReport {
    pub gates: Vec<GateResult>,
    pub overall: GateStatus,
    pub critical_regressions: u32,
    pub timestamp_ms: u64,
}

pub struct PerformanceGates {
    thresholds: GateThresholds,
    clock: Arc<dyn ClockPort>,
    artifacts: Option<Arc<ArtifactStore>>,
    bus: Option<Arc<dyn EventBusPort>>,
}

impl PerformanceGates {
    pub fn new(thresholds: GateThresholds, clock: Arc<dyn ClockPort>) -> Self {
        Self {
            thresholds,
            clock,
            artifacts: None,
            bus: None,
        }
    }

    pub fn with_artifacts(mut self, artifacts: Arc<ArtifactStore>) -> Self {
        self.artifacts = Some(artifacts);
        self
    }

    pub fn with_bus(mut self, bus: Arc<dyn EventBusPort>) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Evaluate the four gates; any gate failure or any critical anomaly
    /// regression fails the report.
    pub fn evaluate(&self, snapshot: &PerfSnapshot) -> GateReport {
        let gates = vec![
            GateResult {
                name: "latency_p95_ms".into(),
                observed: snapshot.p95_ms,
                limit: self.thresholds.p95_max_ms,
                passed: snapshot.p95_ms <= self.thresholds.p95_max_ms,
            },
            GateResult {
                name: "latency_p99_ms".into(),
                observed: snapshot.p99_ms,
                limit: self.thresholds.p99_max_ms,
                passed: snapshot.p99_ms <= self.thresholds.p99_max_ms,
            },
            GateResult {
                name: "error_burn_rate".into(),
                observed: snapshot.burn_rate,
                limit: self.thresholds.burn_rate_max,
                passed: snapshot.burn_rate <= self.thresholds.burn_rate_max,
            },
            GateResult {
                name: "cache_hit_rate".into(),
                observed: snapshot.cache_hit_rate,
                limit: self.thresholds.cache_hit_min,
                passed: snapshot.cache_hit_rate >= self.thresholds.cache_hit_min,
            },
        ];

        let critical_regressions = snapshot.critical_anomalies;
        let overall = if gates.iter().all(|g| g.passed) && critical_regressions == 0 {
            GateStatus::Passed
        } else {
            GateStatus::Failed
        };

        let report = GateReport {
            gates,
            overall,
            critical_regressions,
            timestamp_ms: self.clock.now_ms(),
        };

        match report.overall {
            GateStatus::Passed => info!("performance gates passed"),
            GateStatus::Failed => warn!(
                critical_regressions,
                "performance gates failed"
            ),
        }

        if let Some(artifacts) = &self.artifacts {
            let _ = artifacts.save("performance", "gates", &report);
        }
        if let Some(bus) = &self.bus {
            let envelope = EventEnvelope::new(
                topics::PERFORMANCE_GATES_VALIDATED,
                report.timestamp_ms,
                EventActor::system(),
                json!({
                    "overall": report.overall,
                    "failed": report.gates.iter().filter(|g| !g.passed).count(),
                    "critical_regressions": report.critical_regressions,
                }),
            );
            let _ = bus.publish(envelope);
        }

        report
    }
}

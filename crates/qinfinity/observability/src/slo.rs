//! SLO evaluation over the current performance snapshot.

use qinfinity_types::{topics, EventActor, EventEnvelope, PerfSnapshot};
use qinfinity_ports::EventBusPort;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::warn;

use crate::config::SloTargets;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SloViolation {
    pub objective: String,
    pub observed: f64,
    pub target: f64,
}

pub struct SloEvaluator {
    targets: SloTargets,
    bus: Arc<dyn EventBusPort>,
}

impl SloEvaluator {
    pub fn new(targets: SloTargets, bus: Arc<dyn EventBusPort>) -> Self {
        Self { targets, bus }
    }

    pub fn targets(&self) -> &SloTargets {
        &self.targets
    }

    /// Check p99 latency and the availability error budget; emit one
    /// `slo-violation` event per breached objective.
    pub fn evaluate(&self, snapshot: &PerfSnapshot, now_ms: u64) -> Vec<SloViolation> {
        let mut violations = Vec::new();

        if snapshot.p99_ms > self.targets.p99_ms {
            violations.push(SloViolation {
                objective: "latency_p99_ms".into(),
                observed: snapshot.p99_ms,
                target: self.targets.p99_ms,
            });
        }

        if snapshot.error_rate > self.targets.error_budget {
            violations.push(SloViolation {
                objective: "availability_error_rate".into(),
                observed: snapshot.error_rate,
                target: self.targets.error_budget,
            });
        }

        for violation in &violations {
            warn!(
                objective = %violation.objective,
                observed = violation.observed,
                target = violation.target,
                "SLO violated"
            );
            let envelope = EventEnvelope::new(
                topics::SLO_VIOLATION,
                now_ms,
                EventActor::system(),
                json!({
                    "objective": violation.objective,
                    "observed": violation.observed,
                    "target": violation.target,
                }),
            );
            let _ = self.bus.publish(envelope);
        }

        violations
    }
}

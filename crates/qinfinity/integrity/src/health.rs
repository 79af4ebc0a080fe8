//! Ecosystem health aggregation: parallel module probes with timeouts,
//! cross-layer data-flow checks, event-bus coherence, and Qflow coherence.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;
use qinfinity_ports::{BusStats, ClockPort, EventBusPort};
use qinfinity_types::{topics, EventActor, EventEnvelope};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Critical,
}

impl HealthStatus {
    fn escalate(self, other: HealthStatus) -> HealthStatus {
        use HealthStatus::*;
        match (self, other) {
            (Critical, _) | (_, Critical) => Critical,
            (Degraded, _) | (_, Degraded) => Degraded,
            _ => Healthy,
        }
    }
}

/// Registration data for one module health checker.
#[derive(Debug, Clone)]
pub struct ModuleSpec {
    pub name: String,
    pub critical: bool,
    pub timeout: Duration,
}

pub type ModuleChecker = Arc<dyn Fn() -> BoxFuture<'static, Result<(), String>> + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleHealth {
    pub name: String,
    pub status: HealthStatus,
    pub critical: bool,
    pub latency_ms: u64,
    pub error: Option<String>,
}

/// One hop of the canonical cross-module chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HopResult {
    pub hop: String,
    pub ok: bool,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataFlowReport {
    pub hops: Vec<HopResult>,
}

impl DataFlowReport {
    pub fn ok(&self) -> bool {
        !self.hops.is_empty() && self.hops.iter().all(|h| h.ok)
    }
}

/// Runs the canonical forward+inverse chain across the modules and reports
/// every hop. Backed by the pipeline executor in production wiring.
#[async_trait]
pub trait DataFlowProbe: Send + Sync {
    async fn run_canonical_chain(&self) -> Result<DataFlowReport, String>;
}

/// Distributed-execution coherence signals (Qflow).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowCoherence {
    pub distributed_execution: bool,
    pub node_coordination: bool,
    pub workflow_integrity: bool,
    pub serverless_liveness: bool,
}

impl FlowCoherence {
    pub fn ok(&self) -> bool {
        self.distributed_execution
            && self.node_coordination
            && self.workflow_integrity
            && self.serverless_liveness
    }
}

#[async_trait]
pub trait FlowProbe: Send + Sync {
    async fn check(&self) -> FlowCoherence;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EcosystemHealthReport {
    pub overall: HealthStatus,
    pub modules: Vec<ModuleHealth>,
    pub dataflow: Option<DataFlowReport>,
    pub event_bus: Option<BusStats>,
    pub flow: Option<FlowCoherence>,
    pub timestamp_ms: u64,
}

pub struct EcosystemValidator {
    modules: RwLock<Vec<(ModuleSpec, ModuleChecker)>>,
    dataflow: Option<Arc<dyn DataFlowProbe>>,
    flow: Option<Arc<dyn FlowProbe>>,
    bus: Option<Arc<dyn EventBusPort>>,
    clock: Arc<dyn ClockPort>,
}

impl EcosystemValidator {
    pub fn new(clock: Arc<dyn ClockPort>) -> Self {
        Self {
            modules: RwLock::new(Vec::new()),
            dataflow: None,
            flow: None,
            bus: None,
            clock,
        }
    }

    pub fn with_dataflow_probe(mut self, probe: Arc<dyn DataFlowProbe>) -> Self {
        self.dataflow = Some(probe);
        self
    }

    pub fn with_flow_probe(mut self, probe: Arc<dyn FlowProbe>) -> Self {
        self.flow = Some(probe);
        self
    }

    pub fn with_bus(mut self, bus: Arc<dyn EventBusPort>) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn register_module(&self, spec: ModuleSpec, checker: ModuleChecker) {
        if let Ok(mut modules) = self.modules.write() {
            modules.push((spec, checker));
        }
    }

    /// Probe every module concurrently, run the cross-layer checks, and
    /// aggregate. An unreachable critical module escalates to `Critical`.
    pub async fn validate_health(&self) -> EcosystemHealthReport {
        let registered: Vec<(ModuleSpec, ModuleChecker)> = self
            .modules
            .read()
            .map(|modules| modules.clone())
            .unwrap_or_default();

        let probes = registered.into_iter().map(|(spec, checker)| async move {
            let started = std::time::Instant::now();
            let outcome = tokio::time::timeout(spec.timeout, checker()).await;
            let latency_ms = started.elapsed().as_millis() as u64;
            let (status, error) = match outcome {
                Ok(Ok(())) => (HealthStatus::Healthy, None),
                Ok(Err(reason)) => {
                    let status = if spec.critical {
                        HealthStatus::Critical
                    } else {
                        HealthStatus::Degraded
                    };
                    (status, Some(reason))
                }
                Err(_) => {
                    let status = if spec.critical {
                        HealthStatus::Critical
                    } else {
                        HealthStatus::Degraded
                    };
                    (status, Some(format!("timed out after {}ms", spec.timeout.as_millis())))
                }
            };
            ModuleHealth {
                name: spec.name,
                status,
                critical: spec.critical,
                latency_ms,
                error,
            }
        });
        let modules = futures::future::join_all(probes).await;

        let mut overall = modules
            .iter()
            .fold(HealthStatus::Healthy, |acc, m| acc.escalate(m.status));

        let dataflow = match &self.dataflow {
            Some(probe) => match probe.run_canonical_chain().await {
                Ok(report) => {
                    if !report.ok() {
                        overall = overall.escalate(HealthStatus::Degraded);
                    }
                    Some(report)
                }
                Err(reason) => {
                    warn!(%reason, "cross-layer data-flow probe failed");
                    overall = overall.escalate(HealthStatus::Critical);
                    Some(DataFlowReport {
                        hops: vec![HopResult {
                            hop: "dataflow".into(),
                            ok: false,
                            detail: Some(reason),
                        }],
                    })
                }
            },
            None => None,
        };

        let event_bus = self.bus.as_ref().map(|bus| bus.stats());

        let flow = match &self.flow {
            Some(probe) => {
                let coherence = probe.check().await;
                if !coherence.ok() {
                    overall = overall.escalate(HealthStatus::Degraded);
                }
                Some(coherence)
            }
            None => None,
        };

        let report = EcosystemHealthReport {
            overall,
            modules,
            dataflow,
            event_bus,
            flow,
            timestamp_ms: self.clock.now_ms(),
        };

        info!(overall = ?report.overall, modules = report.modules.len(), "ecosystem health validated");
        if let Some(bus) = &self.bus {
            let envelope = EventEnvelope::new(
                topics::ECOSYSTEM_HEALTH_VALIDATED,
                report.timestamp_ms,
                EventActor::system(),
                json!({
                    "overall": report.overall,
                    "modules": report.modules.len(),
                    "dataflow_ok": report.dataflow.as_ref().map(DataFlowReport::ok),
                }),
            );
            let _ = bus.publish(envelope);
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qinfinity_ports::{MemoryEventBus, SystemClock};

    fn ok_checker() -> ModuleChecker {
        Arc::new(|| Box::pin(async { Ok(()) }))
    }

    fn failing_checker() -> ModuleChecker {
        Arc::new(|| Box::pin(async { Err("unreachable".to_string()) }))
    }

    fn spec(name: &str, critical: bool) -> ModuleSpec {
        ModuleSpec {
            name: name.into(),
            critical,
            timeout: Duration::from_millis(100),
        }
    }

    struct HealthyFlow;

    #[async_trait]
    impl FlowProbe for HealthyFlow {
        async fn check(&self) -> FlowCoherence {
            FlowCoherence {
                distributed_execution: true,
                node_coordination: true,
                workflow_integrity: true,
                serverless_liveness: true,
            }
        }
    }

    struct CleanChain;

    #[async_trait]
    impl DataFlowProbe for CleanChain {
        async fn run_canonical_chain(&self) -> Result<DataFlowReport, String> {
            Ok(DataFlowReport {
                hops: vec![
                    HopResult {
                        hop: "compress→encrypt".into(),
                        ok: true,
                        detail: None,
                    },
                    HopResult {
                        hop: "encrypt→index".into(),
                        ok: true,
                        detail: None,
                    },
                ],
            })
        }
    }

    #[tokio::test]
    async fn all_healthy_modules_aggregate_healthy() {
        let validator = EcosystemValidator::new(Arc::new(SystemClock))
            .with_flow_probe(Arc::new(HealthyFlow))
            .with_dataflow_probe(Arc::new(CleanChain))
            .with_bus(Arc::new(MemoryEventBus::new()));

        validator.register_module(spec("qwallet", true), ok_checker());
        validator.register_module(spec("qindex", false), ok_checker());

        let report = validator.validate_health().await;
        assert_eq!(report.overall, HealthStatus::Healthy);
        assert_eq!(report.modules.len(), 2);
        assert!(report.dataflow.unwrap().ok());
        assert!(report.flow.unwrap().ok());
    }

    #[tokio::test]
    async fn unreachable_critical_module_escalates_to_critical() {
        let validator = EcosystemValidator::new(Arc::new(SystemClock));
        validator.register_module(spec("qwallet", true), failing_checker());
        validator.register_module(spec("qindex", false), ok_checker());

        let report = validator.validate_health().await;
        assert_eq!(report.overall, HealthStatus::Critical);
    }

    #[tokio::test]
    async fn unreachable_optional_module_degrades_only() {
        let validator = EcosystemValidator::new(Arc::new(SystemClock));
        validator.register_module(spec("qmarket", false), failing_checker());

        let report = validator.validate_health().await;
        assert_eq!(report.overall, HealthStatus::Degraded);
    }

    #[tokio::test]
    async fn slow_module_times_out() {
        let validator = EcosystemValidator::new(Arc::new(SystemClock));
        validator.register_module(
            ModuleSpec {
                name: "ipfs".into(),
                critical: true,
                timeout: Duration::from_millis(10),
            },
            Arc::new(|| {
                Box::pin(async {
                    tokio::time::sleep(Duration::from_millis(200)).await;
                    Ok(())
                })
            }),
        );

        let report = validator.validate_health().await;
        assert_eq!(report.overall, HealthStatus::Critical);
        assert!(report.modules[0].error.as_ref().unwrap().contains("timed out"));
    }
}

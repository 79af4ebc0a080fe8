//! Configuration for the observability core. Every timer interval and
//! threshold lives here; call sites carry no literals.

use std::time::Duration;

/// Service-level objective targets.
#[derive(Debug, Clone, PartialEq)]
pub struct SloTargets {
    pub p50_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
    /// Availability error budget as a rate (0.001 = 0.1%).
    pub error_budget: f64,
    pub min_rps: f64,
}

impl Default for SloTargets {
    fn default() -> Self {
        Self {
            p50_ms: 50.0,
            p95_ms: 150.0,
            p99_ms: 200.0,
            error_budget: 0.001,
            min_rps: 10.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    pub slo: SloTargets,
    /// Sliding latency buffer capacity.
    pub latency_buffer_size: usize,
    /// Samples needed before a metric baseline is established.
    pub anomaly_min_samples: usize,
    pub anomaly_z_threshold: f64,
    pub anomaly_critical_z: f64,
    /// Default dependency polling interval.
    pub poll_interval: Duration,
    /// Default per-checker timeout.
    pub check_timeout: Duration,
    /// Metric sample retention window.
    pub retention: Duration,
    /// How often the retention eviction runs.
    pub eviction_interval: Duration,
    /// Minimum spacing between SLO evaluations on the record path.
    pub slo_cooldown: Duration,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            slo: SloTargets::default(),
            latency_buffer_size: 1_000,
            anomaly_min_samples: 10,
            anomaly_z_threshold: 2.0,
            anomaly_critical_z: 3.0,
            poll_interval: Duration::from_secs(30),
            check_timeout: Duration::from_secs(5),
            retention: Duration::from_secs(3_600),
            eviction_interval: Duration::from_secs(60),
            slo_cooldown: Duration::from_secs(30),
        }
    }
}

/// Per-dependency overrides supplied at registration.
#[derive(Debug, Clone, Default)]
pub struct DependencyOptions {
    pub interval: Option<Duration>,
    pub timeout: Option<Duration>,
    /// Critical dependencies escalate aggregate health when down.
    pub critical: bool,
}

//! Performance snapshot — produced by the observability core, consumed by
//! the integrity performance gates. A plain value type so the two crates
//! never import each other's concrete services.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerfSnapshot {
    pub p50_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
    pub avg_ms: f64,
    /// Errors / requests, in [0, 1].
    pub error_rate: f64,
    /// Error rate normalized against the SLO error budget.
    pub burn_rate: f64,
    /// Cache hits / lookups, in [0, 1].
    pub cache_hit_rate: f64,
    pub request_count: u64,
    pub error_count: u64,
    /// Critical anomalies (|z| > critical threshold) observed in the window.
    pub critical_anomalies: u32,
}

impl PerfSnapshot {
    /// A snapshot for a system that has served no traffic yet.
    pub fn empty() -> Self {
        Self {
            p50_ms: 0.0,
            p95_ms: 0.0,
            p99_ms: 0.0,
            avg_ms: 0.0,
            error_rate: 0.0,
            burn_rate: 0.0,
            cache_hit_rate: 1.0,
            request_count: 0,
            error_count: 0,
            critical_anomalies: 0,
        }
    }
}

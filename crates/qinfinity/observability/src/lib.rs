//! Observability core for the Q∞ control-plane.
//!
//! One `ObservabilityCore` instance is shared by every component: request
//! recording feeds a bounded latency buffer and the SLO evaluator, metric
//! samples feed the per-metric anomaly detector, and registered dependency
//! checkers are polled in the background between `start()` and `stop()`.

pub mod anomaly;
pub mod config;
pub mod core;
pub mod dependency;
pub mod error;
pub mod latency;
pub mod metrics;
pub mod slo;

pub use anomaly::{Anomaly, AnomalyDetector};
pub use config::{DependencyOptions, ObservabilityConfig, SloTargets};
pub use self::core::ObservabilityCore;
pub use dependency::{DependencyChecker, DependencyStatus};
pub use error::{ObservabilityError, ObservabilityResult};
pub use latency::LatencyBuffer;
pub use metrics::{MetricSample, MetricStore};
pub use slo::{SloEvaluator, SloViolation};

//! Integrity validation for the Q∞ ecosystem: module health aggregation,
//! decentralization attestation with the kill-first-launcher test, and
//! performance gates over the observability snapshot.

pub mod attestation;
pub mod error;
pub mod gates;
pub mod health;

pub use attestation::{
    Attestation, AttestationConfig, AttestationProbe, AttestationService, CheckResult,
    CheckStatus, ContinuityReport, FleetBaseline, KillTestResult, LauncherFleet, OverallStatus,
    REQUIRED_CHECKS,
};
pub use error::{IntegrityError, IntegrityResult};
pub use gates::{GateReport, GateResult, GateStatus, GateThresholds, PerformanceGates};
pub use health::{
    DataFlowProbe, DataFlowReport, EcosystemHealthReport, EcosystemValidator, FlowCoherence,
    FlowProbe, HealthStatus, HopResult, ModuleChecker, ModuleHealth, ModuleSpec,
};

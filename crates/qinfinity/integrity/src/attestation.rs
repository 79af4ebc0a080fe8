//! Decentralization attestation: five predicate checks plus the
//! kill-first-launcher liveness test, composed into a signed, published
//! attestation document.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use qinfinity_ports::{ArtifactStore, ClockPort, ContentStoragePort, EventBusPort};
use qinfinity_types::{topics, AttestationId, ContentAddress, EventActor, EventEnvelope};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::error::{IntegrityError, IntegrityResult};

pub const REQUIRED_CHECKS: [&str; 5] = [
    "no_central_database",
    "no_message_brokers",
    "ipfs_required",
    "libp2p_active",
    "kill_first_launcher_prereqs",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckStatus {
    Compliant,
    NonCompliant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    pub status: CheckStatus,
    pub details: String,
    pub evidence: Vec<String>,
}

/// Runs one named decentralization predicate against the deployment.
#[async_trait]
pub trait AttestationProbe: Send + Sync {
    async fn check(&self, name: &str) -> CheckResult;
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FleetBaseline {
    pub availability: f64,
    pub response_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContinuityReport {
    pub availability: f64,
    pub data_integrity: bool,
    pub peer_connectivity: bool,
    pub quorum_achievable: bool,
}

/// Control surface over the node fleet used by the kill test.
#[async_trait]
pub trait LauncherFleet: Send + Sync {
    async fn baseline(&self) -> FleetBaseline;

    async fn kill_first_launcher(&self) -> Result<(), String>;

    /// Measured after the launcher is gone.
    async fn continuity(&self) -> ContinuityReport;

    /// Measured once the fleet has re-stabilized.
    async fn recovered(&self) -> FleetBaseline;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KillTestResult {
    pub passed: bool,
    pub continuity_score: f64,
    pub availability: f64,
    pub data_integrity: bool,
    pub peer_connectivity: bool,
    pub quorum_achievable: bool,
    pub baseline_response_ms: u64,
    pub recovered_response_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverallStatus {
    Compliant,
    NonCompliant,
}

impl OverallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OverallStatus::Compliant => "compliant",
            OverallStatus::NonCompliant => "non_compliant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attestation {
    pub attestation_id: AttestationId,
    pub timestamp_ms: u64,
    pub checks: BTreeMap<String, CheckResult>,
    pub kill_test: KillTestResult,
    pub overall_status: OverallStatus,
    pub content_address: Option<ContentAddress>,
    pub signature: String,
}

#[derive(Debug, Clone)]
pub struct AttestationConfig {
    /// Minimum continuity availability after the kill.
    pub min_availability: f64,
    /// Recovery must stay within this multiple of the baseline.
    pub max_degradation_factor: f64,
    pub publish_timeout: Duration,
}

impl Default for AttestationConfig {
    fn default() -> Self {
        Self {
            min_availability: 0.8,
            max_degradation_factor: 2.0,
            publish_timeout: Duration::from_secs(5),
        }
    }
}

pub struct AttestationService {
    probe: Arc<dyn AttestationProbe>,
    fleet: Arc<dyn LauncherFleet>,
    storage: Arc<dyn ContentStoragePort>,
    artifacts: Arc<ArtifactStore>,
    clock: Arc<dyn ClockPort>,
    bus: Option<Arc<dyn EventBusPort>>,
    config: AttestationConfig,
}

impl AttestationService {
    pub fn new(
        probe: Arc<dyn AttestationProbe>,
        fleet: Arc<dyn LauncherFleet>,
        storage: Arc<dyn ContentStoragePort>,
        artifacts: Arc<ArtifactStore>,
        clock: Arc<dyn ClockPort>,
    ) -> Self {
        Self {
            probe,
            fleet,
            storage,
            artifacts,
            clock,
            bus: None,
            config: AttestationConfig::default(),
        }
    }

    pub fn with_bus(mut self, bus: Arc<dyn EventBusPort>) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn with_config(mut self, config: AttestationConfig) -> Self {
        self.config = config;
        self
    }

    /// Run every check plus the kill test and compose the attestation.
    /// Compliant attestations are published to content storage and stored
    /// at `artifacts/attestation/attestation.json`.
    pub async fn attest(&self) -> IntegrityResult<Attestation> {
        let mut checks = BTreeMap::new();
        for name in REQUIRED_CHECKS {
            let result = self.probe.check(name).await;
            checks.insert(name.to_string(), result);
        }
        let all_compliant = checks
            .values()
            .all(|c| c.status == CheckStatus::Compliant);

        let kill_test = self.run_kill_test().await?;

        let overall_status = if all_compliant && kill_test.passed {
            OverallStatus::Compliant
        } else {
            OverallStatus::NonCompliant
        };

        let attestation_id = AttestationId::generate();
        let timestamp_ms = self.clock.now_ms();
        let signature = sign_attestation(
            &attestation_id,
            timestamp_ms,
            overall_status,
            checks.len(),
        );

        let mut attestation = Attestation {
            attestation_id,
            timestamp_ms,
            checks,
            kill_test,
            overall_status,
            content_address: None,
            signature,
        };

        if overall_status == OverallStatus::Compliant {
            attestation.content_address = self.publish(&attestation).await;
        }

        self.artifacts
            .save("attestation", "attestation", &attestation)
            .map_err(|e| IntegrityError::Internal(e.to_string()))?;

        info!(
            attestation_id = %attestation.attestation_id,
            status = attestation.overall_status.as_str(),
            "decentralization attestation completed"
        );
        if let Some(bus) = &self.bus {
            let envelope = EventEnvelope::new(
                topics::ATTESTATION_COMPLETED,
                timestamp_ms,
                EventActor::system(),
                json!({
                    "attestation_id": attestation.attestation_id.to_string(),
                    "overall_status": attestation.overall_status.as_str(),
                    "content_address": attestation.content_address,
                }),
            );
            let _ = bus.publish(envelope);
        }

        Ok(attestation)
    }

    /// Baseline → kill the designated launcher → measure continuity →
    /// validate recovery. Both the continuity thresholds and the recovery
    /// degradation bound must hold.
    async fn run_kill_test(&self) -> IntegrityResult<KillTestResult> {
        let baseline = self.fleet.baseline().await;

        self.fleet
            .kill_first_launcher()
            .await
            .map_err(IntegrityError::KillTestFailed)?;

        let continuity = self.fleet.continuity().await;
        let recovered = self.fleet.recovered().await;

        let continuity_score = (continuity.availability
            + bool_score(continuity.data_integrity)
            + bool_score(continuity.peer_connectivity)
            + bool_score(continuity.quorum_achievable))
            / 4.0;

        let recovery_ok = baseline.response_ms == 0
            || (recovered.response_ms as f64)
                <= self.config.max_degradation_factor * baseline.response_ms as f64;

        let passed = continuity.availability >= self.config.min_availability
            && continuity.data_integrity
            && continuity.peer_connectivity
            && continuity.quorum_achievable
            && recovery_ok;

        if !passed {
            warn!(
                availability = continuity.availability,
                recovery_ok, "kill-first-launcher test failed"
            );
        }

        Ok(KillTestResult {
            passed,
            continuity_score,
            availability: continuity.availability,
            data_integrity: continuity.data_integrity,
            peer_connectivity: continuity.peer_connectivity,
            quorum_achievable: continuity.quorum_achievable,
            baseline_response_ms: baseline.response_ms,
            recovered_response_ms: recovered.response_ms,
        })
    }

    async fn publish(&self, attestation: &Attestation) -> Option<ContentAddress> {
        let bytes = serde_json::to_vec(attestation).ok()?;
        let outcome = tokio::time::timeout(
            self.config.publish_timeout,
            self.storage.put(&bytes, "attestation.json", "attestation"),
        )
        .await;
        match outcome {
            Ok(Ok(address)) => Some(address),
            Ok(Err(error)) => {
                warn!(%error, "attestation publication failed");
                None
            }
            Err(_) => {
                warn!("attestation publication timed out");
                None
            }
        }
    }
}

fn bool_score(value: bool) -> f64 {
    if value {
        1.0
    } else {
        0.0
    }
}

/// signature = H(attestation-id || timestamp || overall-status || check count)
pub fn sign_attestation(
    attestation_id: &AttestationId,
    timestamp_ms: u64,
    overall_status: OverallStatus,
    check_count: usize,
) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(attestation_id.to_string().as_bytes());
    hasher.update(&timestamp_ms.to_le_bytes());
    hasher.update(overall_status.as_str().as_bytes());
    hasher.update(&(check_count as u64).to_le_bytes());
    hasher.finalize().to_hex().to_string()
}

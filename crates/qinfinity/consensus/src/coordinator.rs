//! Vote collection, threshold analysis, and staged recovery.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use qinfinity_ports::{ArtifactStore, ClockPort, EventBusPort};
use qinfinity_types::{topics, EventActor, EventEnvelope, ExecutionId, NodeId, RoundId};
use serde_json::json;
use tracing::{info, warn};

use crate::error::{ConsensusError, ConsensusResult};
use crate::types::{
    ConsensusRound, NodeVote, OperationType, RecoveryAction, RecoveryAttempt, VoteDecision,
    VoteRequest,
};

/// Seam to the node fleet: request one signed vote from one node.
#[async_trait]
pub trait VoterPort: Send + Sync {
    async fn request_vote(&self, node: &NodeId, request: &VoteRequest)
        -> ConsensusResult<NodeVote>;
}

#[derive(Debug, Clone)]
pub struct ConsensusConfig {
    pub max_participants: usize,
    pub vote_timeout: Duration,
    pub min_confidence: f64,
    pub recovery_max_attempts: u32,
    pub recovery_backoff_base: Duration,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            max_participants: 5,
            vote_timeout: Duration::from_secs(2),
            min_confidence: 0.8,
            recovery_max_attempts: 3,
            recovery_backoff_base: Duration::from_millis(50),
        }
    }
}

struct Tally {
    reached: bool,
    decision: Option<VoteDecision>,
    confidence: f64,
}

pub struct ConsensusCoordinator {
    voter: Arc<dyn VoterPort>,
    clock: Arc<dyn ClockPort>,
    config: ConsensusConfig,
    bus: Option<Arc<dyn EventBusPort>>,
    artifacts: Option<Arc<ArtifactStore>>,
}

impl ConsensusCoordinator {
    pub fn new(voter: Arc<dyn VoterPort>, clock: Arc<dyn ClockPort>) -> Self {
        Self {
            voter,
            clock,
            config: ConsensusConfig::default(),
            bus: None,
            artifacts: None,
        }
    }

    pub fn with_config(mut self, config: ConsensusConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_bus(mut self, bus: Arc<dyn EventBusPort>) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn with_artifacts(mut self, artifacts: Arc<ArtifactStore>) -> Self {
        self.artifacts = Some(artifacts);
        self
    }

    /// Run one consensus round for (execution, step, operation).
    ///
    /// Participants are the first `max_participants` of `active_nodes`.
    /// Below-threshold collections and low-confidence tallies enter the
    /// staged recovery ladder; exhaustion is a terminal failure.
    pub async fn execute(
        &self,
        execution_id: &ExecutionId,
        step_id: &str,
        operation: OperationType,
        active_nodes: &[NodeId],
    ) -> ConsensusResult<ConsensusRound> {
        if active_nodes.is_empty() {
            return Err(ConsensusError::NoActiveNodes);
        }

        let round_id = RoundId::generate();
        let participants: Vec<NodeId> = active_nodes
            .iter()
            .take(self.config.max_participants)
            .cloned()
            .collect();
        let threshold = operation.required_threshold();

        let request = VoteRequest {
            round_id: round_id.clone(),
            execution_id: execution_id.clone(),
            step_id: step_id.to_string(),
            operation,
            deadline_ms: self.clock.now_ms() + self.config.vote_timeout.as_millis() as u64,
        };

        info!(
            round_id = %round_id,
            operation = operation.as_str(),
            participants = participants.len(),
            threshold,
            "consensus round started"
        );

        let mut votes: BTreeMap<NodeId, NodeVote> = BTreeMap::new();
        self.collect_votes(&participants, &request, &mut votes).await;

        let mut recovery: Vec<RecoveryAttempt> = Vec::new();
        let mut fallback_used = false;
        let mut tally = self.analyze(&votes, threshold);

        if !tally.reached {
            let mut delay = self.config.recovery_backoff_base;
            for attempt in 1..=self.config.recovery_max_attempts {
                tokio::time::sleep(delay).await;
                delay *= 2;

                let votes_before = votes.len();
                let action = match attempt {
                    1 => RecoveryAction::RetryUnresponsive,
                    2 => RecoveryAction::ExpandNodeSet,
                    _ => RecoveryAction::MajorityFallback,
                };

                match action {
                    RecoveryAction::RetryUnresponsive => {
                        let unresponsive: Vec<NodeId> = participants
                            .iter()
                            .filter(|n| !votes.contains_key(*n))
                            .cloned()
                            .collect();
                        self.collect_votes(&unresponsive, &request, &mut votes).await;
                        tally = self.analyze(&votes, threshold);
                    }
                    RecoveryAction::ExpandNodeSet => {
                        let expansion: Vec<NodeId> = active_nodes
                            .iter()
                            .filter(|n| !votes.contains_key(*n))
                            .cloned()
                            .collect();
                        self.collect_votes(&expansion, &request, &mut votes).await;
                        tally = self.analyze(&votes, threshold);
                    }
                    RecoveryAction::MajorityFallback => {
                        if !votes.is_empty() {
                            tally = self.majority_of_collected(&votes);
                            fallback_used = tally.reached;
                        }
                    }
                }

                let succeeded = tally.reached;
                warn!(
                    round_id = %round_id,
                    attempt,
                    action = ?action,
                    votes = votes.len(),
                    succeeded,
                    "consensus recovery attempt"
                );
                recovery.push(RecoveryAttempt {
                    attempt,
                    action,
                    votes_before,
                    votes_after: votes.len(),
                    succeeded,
                });
                if succeeded {
                    break;
                }
            }
        }

        let round = ConsensusRound {
            id: round_id.clone(),
            execution_id: execution_id.clone(),
            step_id: step_id.to_string(),
            operation,
            required_threshold: threshold,
            votes: votes.into_values().collect(),
            reached: tally.reached,
            decision: tally.decision,
            confidence: tally.confidence,
            recovery,
            fallback_used,
        };

        self.archive(&round);

        if round.reached {
            self.emit(topics::CONSENSUS_VALIDATED, &round);
            Ok(round)
        } else {
            self.emit(topics::CONSENSUS_FAILED, &round);
            Err(ConsensusError::RecoveryExhausted {
                round_id: round_id.to_string(),
            })
        }
    }

    /// Fan the vote request out in parallel; each call races the timeout.
    /// Nodes already present in `votes` keep their first vote.
    async fn collect_votes(
        &self,
        nodes: &[NodeId],
        request: &VoteRequest,
        votes: &mut BTreeMap<NodeId, NodeVote>,
    ) {
        let pending = nodes.iter().map(|node| {
            let voter = self.voter.clone();
            let request = request.clone();
            let node = node.clone();
            async move {
                let outcome =
                    tokio::time::timeout(self.config.vote_timeout, voter.request_vote(&node, &request))
                        .await;
                match outcome {
                    Ok(Ok(vote)) => Some(vote),
                    Ok(Err(error)) => {
                        warn!(node = %node, %error, "vote request failed");
                        None
                    }
                    Err(_) => {
                        warn!(node = %node, "vote request timed out");
                        None
                    }
                }
            }
        });

        for vote in futures::future::join_all(pending).await.into_iter().flatten() {
            votes.entry(vote.node.clone()).or_insert(vote);
        }
    }

    fn analyze(&self, votes: &BTreeMap<NodeId, NodeVote>, threshold: usize) -> Tally {
        if votes.len() < threshold {
            return Tally {
                reached: false,
                decision: None,
                confidence: 0.0,
            };
        }

        let tally = self.majority_of_collected(votes);
        if tally.confidence < self.config.min_confidence {
            return Tally {
                reached: false,
                decision: tally.decision,
                confidence: tally.confidence,
            };
        }
        tally
    }

    /// Majority of collected votes decides; confidence is the average
    /// self-reported confidence scaled by the majority share.
    fn majority_of_collected(&self, votes: &BTreeMap<NodeId, NodeVote>) -> Tally {
        let total = votes.len();
        if total == 0 {
            return Tally {
                reached: false,
                decision: None,
                confidence: 0.0,
            };
        }

        let approvals = votes
            .values()
            .filter(|v| v.decision == VoteDecision::Approve)
            .count();
        let rejections = total - approvals;
        let (decision, majority) = if approvals > rejections {
            (VoteDecision::Approve, approvals)
        } else {
            (VoteDecision::Reject, rejections)
        };

        let avg_confidence =
            votes.values().map(|v| v.confidence).sum::<f64>() / total as f64;
        let confidence = avg_confidence * (majority as f64 / total as f64);

        Tally {
            reached: true,
            decision: Some(decision),
            confidence,
        }
    }

    fn archive(&self, round: &ConsensusRound) {
        if let Some(artifacts) = &self.artifacts {
            let name = round.id.as_uuid().to_string();
            if let Err(error) = artifacts.save("consensus", &name, &round.archive_form()) {
                warn!(round_id = %round.id, %error, "consensus round archive failed");
            }
        }
    }

    fn emit(&self, topic: &str, round: &ConsensusRound) {
        if let Some(bus) = &self.bus {
            let envelope = EventEnvelope::new(
                topic,
                self.clock.now_ms(),
                EventActor::system(),
                json!({
                    "round_id": round.id.to_string(),
                    "execution_id": round.execution_id.to_string(),
                    "operation": round.operation.as_str(),
                    "reached": round.reached,
                    "decision": round.decision,
                    "confidence": round.confidence,
                    "recovery_attempts": round.recovery.len(),
                }),
            )
            .with_correlation(round.id.to_string());
            let _ = bus.publish(envelope);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qinfinity_ports::SystemClock;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Test voter: per-node behavior keyed by call count, so recovery
    /// retries can be scripted.
    struct ScriptedVoter {
        /// node -> calls required before it answers (1 = first call).
        responds_on_call: Mutex<std::collections::HashMap<String, u32>>,
        calls: Mutex<std::collections::HashMap<String, u32>>,
        decision_for: Mutex<std::collections::HashMap<String, VoteDecision>>,
        confidence: f64,
        total_requests: AtomicU32,
    }

    impl ScriptedVoter {
        fn new(confidence: f64) -> Self {
            Self {
                responds_on_call: Mutex::new(Default::default()),
                calls: Mutex::new(Default::default()),
                decision_for: Mutex::new(Default::default()),
                confidence,
                total_requests: AtomicU32::new(0),
            }
        }

        fn respond_on(&self, node: &str, call: u32) {
            self.responds_on_call
                .lock()
                .unwrap()
                .insert(node.to_string(), call);
        }

        fn reject_from(&self, node: &str) {
            self.decision_for
                .lock()
                .unwrap()
                .insert(node.to_string(), VoteDecision::Reject);
        }
    }

    #[async_trait]
    impl VoterPort for ScriptedVoter {
        async fn request_vote(
            &self,
            node: &NodeId,
            _request: &VoteRequest,
        ) -> ConsensusResult<NodeVote> {
            self.total_requests.fetch_add(1, Ordering::SeqCst);
            let key = node.as_str().to_string();
            let call = {
                let mut calls = self.calls.lock().unwrap();
                let entry = calls.entry(key.clone()).or_insert(0);
                *entry += 1;
                *entry
            };
            let ready_on = self
                .responds_on_call
                .lock()
                .unwrap()
                .get(&key)
                .copied()
                .unwrap_or(1);
            if call < ready_on {
                return Err(ConsensusError::VoteTimeout {
                    node: key,
                });
            }
            let decision = self
                .decision_for
                .lock()
                .unwrap()
                .get(&key)
                .copied()
                .unwrap_or(VoteDecision::Approve);
            Ok(NodeVote {
                node: node.clone(),
                decision,
                confidence: self.confidence,
                signature: Some(qinfinity_types::Signature::new("sandbox_sig_vote")),
            })
        }
    }

    fn nodes(n: usize) -> Vec<NodeId> {
        (0..n).map(|i| NodeId::new(format!("n{i}"))).collect()
    }

    fn coordinator(voter: Arc<ScriptedVoter>) -> ConsensusCoordinator {
        ConsensusCoordinator::new(voter, Arc::new(SystemClock)).with_config(ConsensusConfig {
            recovery_backoff_base: Duration::from_millis(1),
            vote_timeout: Duration::from_millis(200),
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn clean_round_reaches_threshold_first_pass() {
        let voter = Arc::new(ScriptedVoter::new(0.9));
        let round = coordinator(voter)
            .execute(
                &ExecutionId::new("e1"),
                "step-1",
                OperationType::Payment,
                &nodes(5),
            )
            .await
            .unwrap();

        assert!(round.reached);
        assert_eq!(round.decision, Some(VoteDecision::Approve));
        assert_eq!(round.votes.len(), 5);
        assert!(round.recovery.is_empty());
        assert!((round.confidence - 0.9).abs() < 1e-9);
    }

    #[tokio::test]
    async fn recovery_retries_unresponsive_nodes() {
        // Only 2 of 5 answer the first request; payment needs 4. The first
        // recovery attempt re-requests the 3 missing and 2 more respond.
        let voter = Arc::new(ScriptedVoter::new(0.9));
        voter.respond_on("n2", 2);
        voter.respond_on("n3", 2);
        voter.respond_on("n4", 99);

        let round = coordinator(voter)
            .execute(
                &ExecutionId::new("e2"),
                "step-1",
                OperationType::Payment,
                &nodes(5),
            )
            .await
            .unwrap();

        assert!(round.reached);
        assert_eq!(round.votes.len(), 4);
        assert_eq!(round.recovery.len(), 1);
        assert_eq!(round.recovery[0].action, RecoveryAction::RetryUnresponsive);
        assert!(round.recovery[0].succeeded);
        assert!((round.confidence - 0.9).abs() < 1e-9);
        assert!(!round.fallback_used);
    }

    #[tokio::test]
    async fn expansion_pulls_in_standby_nodes() {
        // Participants are the first 5 of 7 actives; n3 and n4 never
        // answer, so expansion must reach n5/n6.
        let voter = Arc::new(ScriptedVoter::new(0.85));
        voter.respond_on("n3", 99);
        voter.respond_on("n4", 99);

        let round = coordinator(voter)
            .execute(
                &ExecutionId::new("e3"),
                "step-1",
                OperationType::Payment,
                &nodes(7),
            )
            .await
            .unwrap();

        assert!(round.reached);
        assert!(round.votes.len() >= 4);
        assert!(round
            .recovery
            .iter()
            .any(|a| a.action == RecoveryAction::ExpandNodeSet && a.succeeded));
    }

    #[tokio::test]
    async fn fallback_decides_from_collected_votes() {
        // Governance threshold is 3 but only 2 nodes ever answer; the
        // majority fallback decides from what was collected.
        let voter = Arc::new(ScriptedVoter::new(0.9));
        voter.respond_on("n2", 99);
        voter.respond_on("n3", 99);
        voter.respond_on("n4", 99);

        let round = coordinator(voter)
            .execute(
                &ExecutionId::new("e4"),
                "step-1",
                OperationType::Governance,
                &nodes(5),
            )
            .await
            .unwrap();

        assert!(round.reached);
        assert!(round.fallback_used);
        assert_eq!(round.votes.len(), 2);
        assert_eq!(round.recovery.len(), 3);
    }

    #[tokio::test]
    async fn total_silence_exhausts_recovery() {
        let voter = Arc::new(ScriptedVoter::new(0.9));
        for i in 0..5 {
            voter.respond_on(&format!("n{i}"), 99);
        }

        let error = coordinator(voter)
            .execute(
                &ExecutionId::new("e5"),
                "step-1",
                OperationType::Default,
                &nodes(5),
            )
            .await
            .unwrap_err();

        assert!(matches!(error, ConsensusError::RecoveryExhausted { .. }));
        assert_eq!(error.kind(), qinfinity_types::ErrorKind::Exhausted);
    }

    #[tokio::test]
    async fn low_confidence_majority_triggers_recovery() {
        // All five answer, but split 3/2 with low self-confidence:
        // avg 0.6 * (3/5) = 0.36 < 0.8 → recovery, then fallback accepts
        // the majority.
        let voter = Arc::new(ScriptedVoter::new(0.6));
        voter.reject_from("n3");
        voter.reject_from("n4");

        let round = coordinator(voter)
            .execute(
                &ExecutionId::new("e6"),
                "step-1",
                OperationType::Governance,
                &nodes(5),
            )
            .await
            .unwrap();

        assert!(round.reached);
        assert!(round.fallback_used);
        assert_eq!(round.decision, Some(VoteDecision::Approve));
        assert!(!round.recovery.is_empty());
    }
}

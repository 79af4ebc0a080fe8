//! The DAO service: registry, proposal lifecycle, weighted voting, and
//! auto-closure. Closure triggers either at expiry or once quorum is met
//! and one option holds a strict supermajority of the voted weight.

use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;
use qinfinity_ports::{AuditEvent, AuditPort, ClockPort, EventBusPort, IdentityPort, WalletPort};
use qinfinity_types::{
    topics, DaoId, ErrorKind, EventActor, EventEnvelope, IdentityRef, ProposalId, Signature,
    VoteId,
};
use serde_json::json;
use tracing::{info, warn};

use crate::error::{DaoError, DaoResult};
use crate::types::{
    Dao, OptionTally, Proposal, ProposalStatus, Vote, WeightRule,
};

/// Fraction of the voted weight one option must strictly exceed for early
/// closure.
const SUPERMAJORITY: f64 = 0.8;

#[derive(Debug, Clone, Default)]
pub struct DaoConfig {
    /// Q1: accept the fixed sandbox signature format instead of real
    /// verification. Off outside sandbox deployments.
    pub sandbox_mode: bool,
}

pub struct DaoService {
    identity: Arc<dyn IdentityPort>,
    wallet: Arc<dyn WalletPort>,
    clock: Arc<dyn ClockPort>,
    config: DaoConfig,
    bus: Option<Arc<dyn EventBusPort>>,
    audit: Option<Arc<dyn AuditPort>>,
    daos: DashMap<DaoId, Dao>,
    proposals: DashMap<ProposalId, Proposal>,
    votes: DashMap<ProposalId, BTreeMap<IdentityRef, Vote>>,
}

impl DaoService {
    pub fn new(
        identity: Arc<dyn IdentityPort>,
        wallet: Arc<dyn WalletPort>,
        clock: Arc<dyn ClockPort>,
        config: DaoConfig,
    ) -> Self {
        Self {
            identity,
            wallet,
            clock,
            config,
            bus: None,
            audit: None,
            daos: DashMap::new(),
            proposals: DashMap::new(),
            votes: DashMap::new(),
        }
    }

    pub fn with_bus(mut self, bus: Arc<dyn EventBusPort>) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn with_audit(mut self, audit: Arc<dyn AuditPort>) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn register_dao(&self, dao: Dao) -> DaoId {
        let id = dao.id.clone();
        self.daos.insert(id.clone(), dao);
        id
    }

    pub fn dao(&self, dao_id: &DaoId) -> DaoResult<Dao> {
        self.daos
            .get(dao_id)
            .map(|d| d.clone())
            .ok_or_else(|| DaoError::DaoNotFound(dao_id.to_string()))
    }

    pub fn proposal(&self, proposal_id: &ProposalId) -> DaoResult<Proposal> {
        self.proposals
            .get(proposal_id)
            .map(|p| p.clone())
            .ok_or_else(|| DaoError::ProposalNotFound(proposal_id.to_string()))
    }

    pub fn votes_for(&self, proposal_id: &ProposalId) -> Vec<Vote> {
        self.votes
            .get(proposal_id)
            .map(|v| v.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Create a proposal. The creator must be a DAO member and meet the
    /// DAO's token requirement; options must be at least two and unique.
    pub async fn create_proposal(
        &self,
        dao_id: &DaoId,
        creator: IdentityRef,
        title: impl Into<String>,
        description: impl Into<String>,
        options: Vec<String>,
        expires_override_ms: Option<u64>,
        quorum_override: Option<u32>,
    ) -> DaoResult<Proposal> {
        let dao = self.dao(dao_id)?;
        if !dao.is_active {
            return Err(DaoError::DaoInactive(dao_id.to_string()));
        }
        self.require_member(&creator, dao_id)?;

        if let Some(requirement) = &dao.token_requirement {
            let balance = self
                .wallet
                .balance(&creator, requirement.currency)
                .await
                .map_err(|e| DaoError::Wallet(e.to_string()))?;
            if balance < requirement.min_amount {
                self.audit_denied(&creator, &dao_id.to_string(), "token requirement not met");
                return Err(DaoError::TokenRequirementNotMet {
                    required: requirement.min_amount.to_string(),
                    currency: requirement.currency.code().into(),
                    available: balance.to_string(),
                });
            }
        }

        if options.len() < 2 {
            return Err(DaoError::InvalidOptions("fewer than two options".into()));
        }
        let mut seen = std::collections::HashSet::new();
        if !options.iter().all(|o| seen.insert(o.clone())) {
            return Err(DaoError::InvalidOptions("duplicate options".into()));
        }

        let now_ms = self.clock.now_ms();
        let proposal = Proposal {
            id: ProposalId::generate(),
            dao_id: dao_id.clone(),
            title: title.into(),
            description: description.into(),
            results: options
                .iter()
                .map(|o| (o.clone(), OptionTally::default()))
                .collect(),
            options,
            creator: creator.clone(),
            created_at_ms: now_ms,
            expires_at_ms: expires_override_ms.unwrap_or(now_ms + dao.voting_duration_ms),
            status: ProposalStatus::Active,
            quorum: quorum_override.unwrap_or(dao.quorum),
            vote_count: 0,
        };

        self.proposals.insert(proposal.id.clone(), proposal.clone());
        info!(proposal_id = %proposal.id, dao_id = %dao_id, "proposal created");
        self.emit(
            topics::DAO_PROPOSAL_CREATED,
            EventActor::new(creator, "creator"),
            json!({
                "proposal_id": proposal.id.to_string(),
                "dao_id": dao_id.to_string(),
                "options": proposal.options,
                "expires_at_ms": proposal.expires_at_ms,
            }),
            &proposal.id.to_string(),
        );
        Ok(proposal)
    }

    /// Cast a weighted vote. A vote arriving at or after expires-at is
    /// rejected and closes the proposal. Closure rules are evaluated after
    /// every accepted vote.
    pub async fn cast_vote(
        &self,
        proposal_id: &ProposalId,
        voter: IdentityRef,
        option: &str,
        signature: Signature,
    ) -> DaoResult<Vote> {
        let proposal = self.proposal(proposal_id)?;
        if proposal.status == ProposalStatus::Closed {
            return Err(DaoError::ProposalClosed(proposal_id.to_string()));
        }

        let now_ms = self.clock.now_ms();
        if now_ms >= proposal.expires_at_ms {
            self.close_proposal(proposal_id, "expired")?;
            return Err(DaoError::ProposalClosed(proposal_id.to_string()));
        }

        let dao = self.dao(&proposal.dao_id)?;
        self.require_member(&voter, &proposal.dao_id)?;

        if self
            .votes
            .get(proposal_id)
            .is_some_and(|votes| votes.contains_key(&voter))
        {
            return Err(DaoError::DuplicateVote {
                voter: voter.to_string(),
                proposal: proposal_id.to_string(),
            });
        }

        if !proposal.options.iter().any(|o| o == option) {
            return Err(DaoError::UnknownOption(option.to_string()));
        }

        let payload = vote_payload(proposal_id, &voter, option);
        let verified = if signature.is_sandbox() {
            self.config.sandbox_mode
        } else {
            self.identity.verify_signature(&voter, &payload, &signature)
        };
        if !verified {
            warn!(voter = %voter, proposal_id = %proposal_id, "vote signature rejected");
            self.audit_denied(&voter, &proposal_id.to_string(), "signature rejected");
            return Err(DaoError::SignatureRejected(voter.to_string()));
        }

        let weight = self.vote_weight(&dao, &voter).await?;

        let vote = Vote {
            id: VoteId::generate(),
            proposal_id: proposal_id.clone(),
            voter: voter.clone(),
            option: option.to_string(),
            weight,
            signature,
            timestamp_ms: now_ms,
            verified,
        };

        self.votes
            .entry(proposal_id.clone())
            .or_default()
            .insert(voter.clone(), vote.clone());
        {
            let mut entry = self
                .proposals
                .get_mut(proposal_id)
                .ok_or_else(|| DaoError::ProposalNotFound(proposal_id.to_string()))?;
            let tally = entry
                .results
                .entry(option.to_string())
                .or_default();
            tally.count += 1;
            tally.weight += weight;
            entry.vote_count += 1;
        }

        info!(proposal_id = %proposal_id, voter = %voter, weight, "vote cast");
        self.emit(
            topics::DAO_VOTE_CAST,
            EventActor::new(voter, "voter"),
            json!({
                "proposal_id": proposal_id.to_string(),
                "option": option,
                "weight": weight,
            }),
            &proposal_id.to_string(),
        );

        self.evaluate_closure(proposal_id)?;
        Ok(vote)
    }

    /// Vote weight per the DAO's rule, defaulting to: floor(token balance)
    /// under a token requirement, 10 per NFT held, else 1.
    async fn vote_weight(&self, dao: &Dao, voter: &IdentityRef) -> DaoResult<u64> {
        match dao.weight_rule {
            Some(WeightRule::Fixed { weight }) => Ok(weight),
            Some(WeightRule::NftCount { weight_per_nft }) => {
                let nfts = self
                    .wallet
                    .list_nfts(voter)
                    .await
                    .map_err(|e| DaoError::Wallet(e.to_string()))?;
                Ok((nfts.len() as u64 * weight_per_nft).max(1))
            }
            Some(WeightRule::TokenBalance) | None => {
                if let Some(requirement) = dao.token_requirement {
                    let balance = self
                        .wallet
                        .balance(voter, requirement.currency)
                        .await
                        .map_err(|e| DaoError::Wallet(e.to_string()))?;
                    return Ok(balance.whole_units().max(0) as u64);
                }
                let nfts = self
                    .wallet
                    .list_nfts(voter)
                    .await
                    .map_err(|e| DaoError::Wallet(e.to_string()))?;
                if nfts.is_empty() {
                    Ok(1)
                } else {
                    Ok(nfts.len() as u64 * 10)
                }
            }
        }
    }

    /// Closure rules: expiry, or quorum reached with one option holding a
    /// strict supermajority of voted weight. The supermajority trigger
    /// requires a contested tally — at least one other option must carry
    /// weight before an early close.
    fn evaluate_closure(&self, proposal_id: &ProposalId) -> DaoResult<()> {
        let proposal = self.proposal(proposal_id)?;
        if proposal.status == ProposalStatus::Closed {
            return Ok(());
        }

        let now_ms = self.clock.now_ms();
        if now_ms >= proposal.expires_at_ms {
            return self.close_proposal(proposal_id, "expired");
        }

        let total = proposal.total_weight();
        let max = proposal.max_option_weight();
        if proposal.vote_count >= proposal.quorum as u64 && total > max {
            let dominance = max as f64 / total as f64;
            if dominance > SUPERMAJORITY {
                return self.close_proposal(proposal_id, "supermajority");
            }
        }
        Ok(())
    }

    /// Close every expired active proposal; returns the closed ids.
    pub fn close_expired(&self) -> Vec<ProposalId> {
        let now_ms = self.clock.now_ms();
        let expired: Vec<ProposalId> = self
            .proposals
            .iter()
            .filter(|p| p.status == ProposalStatus::Active && now_ms >= p.expires_at_ms)
            .map(|p| p.id.clone())
            .collect();
        for proposal_id in &expired {
            let _ = self.close_proposal(proposal_id, "expired");
        }
        expired
    }

    fn close_proposal(&self, proposal_id: &ProposalId, reason: &str) -> DaoResult<()> {
        {
            let mut entry = self
                .proposals
                .get_mut(proposal_id)
                .ok_or_else(|| DaoError::ProposalNotFound(proposal_id.to_string()))?;
            if entry.status == ProposalStatus::Closed {
                return Ok(());
            }
            entry.status = ProposalStatus::Closed;
        }

        let proposal = self.proposal(proposal_id)?;
        info!(proposal_id = %proposal_id, reason, "proposal closed");
        self.emit(
            topics::DAO_PROPOSAL_CLOSED,
            EventActor::system(),
            json!({
                "proposal_id": proposal_id.to_string(),
                "reason": reason,
                "vote_count": proposal.vote_count,
                "results": proposal.results,
            }),
            &proposal_id.to_string(),
        );
        if let Some(audit) = &self.audit {
            let _ = audit.record(AuditEvent {
                action: "dao.proposal.closed".into(),
                actor: IdentityRef::new("qinfinity-core"),
                resource: proposal_id.to_string(),
                outcome: reason.into(),
                error_kind: None,
                correlation_id: Some(proposal_id.to_string()),
                timestamp_ms: self.clock.now_ms(),
            });
        }
        Ok(())
    }

    fn require_member(&self, identity: &IdentityRef, dao_id: &DaoId) -> DaoResult<()> {
        let member = self
            .identity
            .is_member(identity, &dao_id.to_string())
            .map_err(|e| DaoError::Internal(e.to_string()))?;
        if !member {
            self.audit_denied(identity, &dao_id.to_string(), "not a member");
            return Err(DaoError::NotMember {
                identity: identity.to_string(),
                dao: dao_id.to_string(),
            });
        }
        Ok(())
    }

    fn audit_denied(&self, actor: &IdentityRef, resource: &str, reason: &str) {
        if let Some(audit) = &self.audit {
            let _ = audit.record(AuditEvent {
                action: "dao.denied".into(),
                actor: actor.clone(),
                resource: resource.to_string(),
                outcome: reason.into(),
                error_kind: Some(ErrorKind::AuthorizationDenied),
                correlation_id: None,
                timestamp_ms: self.clock.now_ms(),
            });
        }
    }

    fn emit(
        &self,
        topic: &str,
        actor: EventActor,
        payload: serde_json::Value,
        correlation: &str,
    ) {
        if let Some(bus) = &self.bus {
            let envelope = EventEnvelope::new(topic, self.clock.now_ms(), actor, payload)
                .with_correlation(correlation.to_string());
            let _ = bus.publish(envelope);
        }
    }
}

/// Canonical payload a vote signature covers.
pub fn vote_payload(proposal_id: &ProposalId, voter: &IdentityRef, option: &str) -> Vec<u8> {
    format!("{proposal_id}|{voter}|{option}").into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DaoVisibility, TokenRequirement};
    use qinfinity_ports::{
        CryptoPort, ManualClock, MemoryAuditTrail, MemoryWallet, NftRef, SandboxCrypto,
        StaticIdentityDirectory,
    };
    use qinfinity_types::{Amount, Currency};

    struct Fixture {
        service: DaoService,
        directory: Arc<StaticIdentityDirectory>,
        wallet: Arc<MemoryWallet>,
        crypto: Arc<SandboxCrypto>,
        clock: Arc<ManualClock>,
        audit: Arc<MemoryAuditTrail>,
    }

    fn fixture(sandbox_mode: bool) -> Fixture {
        let crypto = Arc::new(SandboxCrypto::default());
        let directory = Arc::new(StaticIdentityDirectory::new(crypto.clone()));
        let wallet = Arc::new(MemoryWallet::new());
        let clock = Arc::new(ManualClock::new(1_000_000));
        let audit = Arc::new(MemoryAuditTrail::new());
        let service = DaoService::new(
            directory.clone(),
            wallet.clone(),
            clock.clone(),
            DaoConfig { sandbox_mode },
        )
        .with_audit(audit.clone());
        Fixture {
            service,
            directory,
            wallet,
            crypto,
            clock,
            audit,
        }
    }

    fn governance_dao(quorum: u32, token_requirement: Option<TokenRequirement>) -> Dao {
        Dao {
            id: DaoId::generate(),
            name: "governance".into(),
            visibility: DaoVisibility::Public,
            quorum,
            voting_duration_ms: 300_000,
            token_requirement,
            weight_rule: None,
            is_active: true,
        }
    }

    fn member(fixture: &Fixture, dao: &DaoId, name: &str, balance: i64) -> IdentityRef {
        let identity = IdentityRef::new(name);
        fixture.directory.add_member(&dao.to_string(), identity.clone());
        if balance > 0 {
            fixture
                .wallet
                .fund(&identity, Amount::from_units(balance), Currency::QToken);
        }
        identity
    }

    fn requirement() -> Option<TokenRequirement> {
        Some(TokenRequirement {
            currency: Currency::QToken,
            min_amount: Amount::from_units(1),
        })
    }

    async fn proposal_with_options(fixture: &Fixture, dao: &Dao, creator: &IdentityRef) -> Proposal {
        fixture
            .service
            .create_proposal(
                &dao.id,
                creator.clone(),
                "upgrade",
                "upgrade the network",
                vec!["approve".into(), "reject".into()],
                None,
                None,
            )
            .await
            .unwrap()
    }

    fn signed(fixture: &Fixture, proposal: &ProposalId, voter: &IdentityRef, option: &str) -> Signature {
        fixture
            .crypto
            .sign(&vote_payload(proposal, voter, option), voter)
            .unwrap()
    }

    #[tokio::test]
    async fn early_closure_on_quorum_and_supermajority() {
        // Quorum 3; approvals weighted 40, 40, 5 and one reject at 5:
        // after the 4th vote 85/90 ≈ 0.944 > 0.8 closes the proposal.
        let fixture = fixture(false);
        let dao = governance_dao(3, requirement());
        fixture.service.register_dao(dao.clone());

        let creator = member(&fixture, &dao.id, "creator", 40);
        let voters = [
            (creator.clone(), "approve"),
            (member(&fixture, &dao.id, "v2", 40), "approve"),
            (member(&fixture, &dao.id, "v3", 5), "approve"),
            (member(&fixture, &dao.id, "v4", 5), "reject"),
        ];

        let proposal = proposal_with_options(&fixture, &dao, &creator).await;

        for (index, (voter, option)) in voters.iter().enumerate() {
            let signature = signed(&fixture, &proposal.id, voter, option);
            fixture
                .service
                .cast_vote(&proposal.id, voter.clone(), option, signature)
                .await
                .unwrap();

            let state = fixture.service.proposal(&proposal.id).unwrap();
            if index < 3 {
                assert_eq!(state.status, ProposalStatus::Active);
            } else {
                assert_eq!(state.status, ProposalStatus::Closed);
            }
        }

        let closed = fixture.service.proposal(&proposal.id).unwrap();
        assert_eq!(closed.vote_count, 4);
        assert_eq!(closed.results["approve"].weight, 85);
        assert_eq!(closed.results["reject"].weight, 5);
    }

    #[tokio::test]
    async fn exact_eighty_percent_does_not_close() {
        let fixture = fixture(false);
        let dao = governance_dao(2, requirement());
        fixture.service.register_dao(dao.clone());

        let a = member(&fixture, &dao.id, "a", 80);
        let b = member(&fixture, &dao.id, "b", 20);
        let proposal = proposal_with_options(&fixture, &dao, &a).await;

        for (voter, option) in [(a, "approve"), (b, "reject")] {
            let signature = signed(&fixture, &proposal.id, &voter, option);
            fixture
                .service
                .cast_vote(&proposal.id, voter, option, signature)
                .await
                .unwrap();
        }

        // 80/100 = 0.8 exactly: not a strict supermajority.
        let state = fixture.service.proposal(&proposal.id).unwrap();
        assert_eq!(state.status, ProposalStatus::Active);
    }

    #[tokio::test]
    async fn just_over_eighty_percent_closes() {
        let fixture = fixture(false);
        let dao = governance_dao(2, requirement());
        fixture.service.register_dao(dao.clone());

        let a = member(&fixture, &dao.id, "a", 800_001);
        let b = member(&fixture, &dao.id, "b", 199_999);
        let proposal = proposal_with_options(&fixture, &dao, &a).await;

        for (voter, option) in [(a, "approve"), (b, "reject")] {
            let signature = signed(&fixture, &proposal.id, &voter, option);
            fixture
                .service
                .cast_vote(&proposal.id, voter, option, signature)
                .await
                .unwrap();
        }

        let state = fixture.service.proposal(&proposal.id).unwrap();
        assert_eq!(state.status, ProposalStatus::Closed);
    }

    #[tokio::test]
    async fn duplicate_votes_are_conflicts() {
        let fixture = fixture(false);
        let dao = governance_dao(5, requirement());
        fixture.service.register_dao(dao.clone());
        let voter = member(&fixture, &dao.id, "alice", 10);
        let proposal = proposal_with_options(&fixture, &dao, &voter).await;

        let signature = signed(&fixture, &proposal.id, &voter, "approve");
        fixture
            .service
            .cast_vote(&proposal.id, voter.clone(), "approve", signature.clone())
            .await
            .unwrap();

        let error = fixture
            .service
            .cast_vote(&proposal.id, voter.clone(), "reject", signature)
            .await
            .unwrap_err();
        assert!(matches!(error, DaoError::DuplicateVote { .. }));
        assert_eq!(error.kind(), ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn non_members_cannot_vote_or_propose() {
        let fixture = fixture(false);
        let dao = governance_dao(3, None);
        fixture.service.register_dao(dao.clone());
        let outsider = IdentityRef::new("mallory");

        let error = fixture
            .service
            .create_proposal(
                &dao.id,
                outsider.clone(),
                "t",
                "d",
                vec!["a".into(), "b".into()],
                None,
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(error, DaoError::NotMember { .. }));
        assert!(!fixture.audit.events().is_empty());
    }

    #[tokio::test]
    async fn vote_exactly_at_expiry_is_rejected_and_closes() {
        let fixture = fixture(false);
        let dao = governance_dao(3, requirement());
        fixture.service.register_dao(dao.clone());
        let voter = member(&fixture, &dao.id, "alice", 10);
        let proposal = proposal_with_options(&fixture, &dao, &voter).await;

        fixture.clock.set(proposal.expires_at_ms);
        let signature = signed(&fixture, &proposal.id, &voter, "approve");
        let error = fixture
            .service
            .cast_vote(&proposal.id, voter, "approve", signature)
            .await
            .unwrap_err();

        assert!(matches!(error, DaoError::ProposalClosed(_)));
        let state = fixture.service.proposal(&proposal.id).unwrap();
        assert_eq!(state.status, ProposalStatus::Closed);
        assert_eq!(state.vote_count, 0);
    }

    #[tokio::test]
    async fn sandbox_signatures_only_pass_in_sandbox_mode() {
        for (sandbox_mode, expect_ok) in [(true, true), (false, false)] {
            let fixture = fixture(sandbox_mode);
            let dao = governance_dao(5, requirement());
            fixture.service.register_dao(dao.clone());
            let voter = member(&fixture, &dao.id, "alice", 10);
            let proposal = proposal_with_options(&fixture, &dao, &voter).await;

            let result = fixture
                .service
                .cast_vote(
                    &proposal.id,
                    voter,
                    "approve",
                    Signature::new("sandbox_sig_test"),
                )
                .await;
            assert_eq!(result.is_ok(), expect_ok);
        }
    }

    #[tokio::test]
    async fn nft_holders_get_ten_weight_per_nft() {
        let fixture = fixture(false);
        let dao = governance_dao(5, None);
        fixture.service.register_dao(dao.clone());
        let collector = member(&fixture, &dao.id, "collector", 0);
        fixture.wallet.grant_nft(
            &collector,
            NftRef {
                token_id: "nft-1".into(),
                collection: "genesis".into(),
            },
        );
        fixture.wallet.grant_nft(
            &collector,
            NftRef {
                token_id: "nft-2".into(),
                collection: "genesis".into(),
            },
        );
        let plain = member(&fixture, &dao.id, "plain", 0);

        let proposal = proposal_with_options(&fixture, &dao, &collector).await;

        let signature = signed(&fixture, &proposal.id, &collector, "approve");
        let vote = fixture
            .service
            .cast_vote(&proposal.id, collector, "approve", signature)
            .await
            .unwrap();
        assert_eq!(vote.weight, 20);

        let signature = signed(&fixture, &proposal.id, &plain, "approve");
        let vote = fixture
            .service
            .cast_vote(&proposal.id, plain, "approve", signature)
            .await
            .unwrap();
        assert_eq!(vote.weight, 1);
    }

    #[tokio::test]
    async fn unknown_option_is_a_validation_error() {
        let fixture = fixture(false);
        let dao = governance_dao(3, requirement());
        fixture.service.register_dao(dao.clone());
        let voter = member(&fixture, &dao.id, "alice", 10);
        let proposal = proposal_with_options(&fixture, &dao, &voter).await;

        let signature = signed(&fixture, &proposal.id, &voter, "maybe");
        let error = fixture
            .service
            .cast_vote(&proposal.id, voter, "maybe", signature)
            .await
            .unwrap_err();
        assert!(matches!(error, DaoError::UnknownOption(_)));
        assert_eq!(error.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn close_expired_sweeps_overdue_proposals() {
        let fixture = fixture(false);
        let dao = governance_dao(3, requirement());
        fixture.service.register_dao(dao.clone());
        let creator = member(&fixture, &dao.id, "alice", 10);
        let proposal = proposal_with_options(&fixture, &dao, &creator).await;

        fixture.clock.advance(300_001);
        let closed = fixture.service.close_expired();
        assert_eq!(closed, vec![proposal.id.clone()]);
        assert_eq!(
            fixture.service.proposal(&proposal.id).unwrap().status,
            ProposalStatus::Closed
        );
    }
}

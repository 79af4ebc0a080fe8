//! DAO, proposal, and vote shapes.

use qinfinity_types::{Amount, Currency, DaoId, IdentityRef, ProposalId, Signature, VoteId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DaoVisibility {
    Public,
    DaoOnly,
    Private,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRequirement {
    pub currency: Currency,
    pub min_amount: Amount,
}

/// Per-DAO vote-weight override. Absent, the defaults apply: floor of the
/// token balance when a token requirement is set, 10 per NFT when the
/// voter holds NFTs, otherwise 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WeightRule {
    TokenBalance,
    NftCount { weight_per_nft: u64 },
    Fixed { weight: u64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dao {
    pub id: DaoId,
    pub name: String,
    pub visibility: DaoVisibility,
    pub quorum: u32,
    pub voting_duration_ms: u64,
    pub token_requirement: Option<TokenRequirement>,
    pub weight_rule: Option<WeightRule>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProposalStatus {
    Active,
    Closed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionTally {
    pub count: u64,
    pub weight: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    pub id: ProposalId,
    pub dao_id: DaoId,
    pub title: String,
    pub description: String,
    /// Size ≥ 2, unique, stable order.
    pub options: Vec<String>,
    pub creator: IdentityRef,
    pub created_at_ms: u64,
    pub expires_at_ms: u64,
    pub status: ProposalStatus,
    pub quorum: u32,
    pub results: BTreeMap<String, OptionTally>,
    pub vote_count: u64,
}

impl Proposal {
    pub fn total_weight(&self) -> u64 {
        self.results.values().map(|t| t.weight).sum()
    }

    pub fn max_option_weight(&self) -> u64 {
        self.results.values().map(|t| t.weight).max().unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vote {
    pub id: VoteId,
    pub proposal_id: ProposalId,
    pub voter: IdentityRef,
    pub option: String,
    pub weight: u64,
    pub signature: Signature,
    pub timestamp_ms: u64,
    pub verified: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tallies_aggregate_weight() {
        let mut proposal = Proposal {
            id: ProposalId::generate(),
            dao_id: DaoId::generate(),
            title: "t".into(),
            description: "d".into(),
            options: vec!["approve".into(), "reject".into()],
            creator: IdentityRef::new("alice"),
            created_at_ms: 0,
            expires_at_ms: 1,
            status: ProposalStatus::Active,
            quorum: 3,
            results: BTreeMap::new(),
            vote_count: 0,
        };
        proposal
            .results
            .insert("approve".into(), OptionTally { count: 3, weight: 85 });
        proposal
            .results
            .insert("reject".into(), OptionTally { count: 1, weight: 5 });

        assert_eq!(proposal.total_weight(), 90);
        assert_eq!(proposal.max_option_weight(), 85);
    }
}

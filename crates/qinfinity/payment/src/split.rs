//! Revenue distribution. Every split accounts for the full settled amount:
//! named shares plus an explicit treasury remainder, so the per-
//! distribution sum invariant holds exactly rather than within tolerance.

use qinfinity_types::{Amount, DistributionId, IdentityRef, IntentId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::{MarketSplit, SplitTable};
use crate::fees::{FeeBreakdown, Module, ModuleCharge};

pub const TREASURY_LABEL: &str = "treasury";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Share {
    pub label: String,
    pub recipient: Option<IdentityRef>,
    pub amount: Amount,
    /// Share of the distribution total, in [0, 1].
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevenueDistribution {
    pub distribution_id: DistributionId,
    pub intent_id: IntentId,
    pub module: Module,
    pub total: Amount,
    pub shares: Vec<Share>,
    pub created_at_ms: u64,
}

impl RevenueDistribution {
    pub fn share_sum(&self) -> Amount {
        self.shares
            .iter()
            .fold(Amount::ZERO, |acc, s| acc + s.amount)
    }
}

/// Build the distribution for a settled intent. Zero-amount intents
/// produce an empty share list.
pub fn build_distribution(
    intent_id: &IntentId,
    charge: &ModuleCharge,
    breakdown: &FeeBreakdown,
    market_split: &MarketSplit,
    table_for_module: &SplitTable,
    label_recipients: &BTreeMap<String, IdentityRef>,
    created_at_ms: u64,
) -> RevenueDistribution {
    let module = charge.module();
    let total = breakdown.total;

    let mut shares: Vec<Share> = if total.is_zero() {
        Vec::new()
    } else {
        match charge {
            ModuleCharge::Market {
                resale,
                seller,
                original_creator,
                ..
            } => market_shares(
                breakdown,
                market_split,
                *resale,
                seller,
                original_creator.as_ref(),
                label_recipients,
            ),
            _ => table_shares(total, table_for_module, label_recipients),
        }
    };

    if !total.is_zero() {
        let distributed = shares.iter().fold(Amount::ZERO, |acc, s| acc + s.amount);
        let remainder = total - distributed;
        if !remainder.is_zero() {
            shares.push(Share {
                label: TREASURY_LABEL.into(),
                recipient: label_recipients.get(TREASURY_LABEL).cloned(),
                amount: remainder,
                percentage: remainder.to_f64() / total.to_f64(),
            });
        }
    }

    RevenueDistribution {
        distribution_id: DistributionId::generate(),
        intent_id: intent_id.clone(),
        module,
        total,
        shares,
        created_at_ms,
    }
}

/// Market: platform takes its fraction of the fee; seller and creator take
/// theirs of the sale price, with the royalty carved out of the seller's
/// allocation on resales by a different creator.
fn market_shares(
    breakdown: &FeeBreakdown,
    split: &MarketSplit,
    resale: bool,
    seller: &IdentityRef,
    original_creator: Option<&IdentityRef>,
    label_recipients: &BTreeMap<String, IdentityRef>,
) -> Vec<Share> {
    let total = breakdown.total;
    let mut shares = Vec::with_capacity(3);

    let platform_amount = breakdown.fees.mul_fraction(split.platform);
    shares.push(Share {
        label: "platform".into(),
        recipient: label_recipients.get("platform").cloned(),
        amount: platform_amount,
        percentage: ratio(platform_amount, total),
    });

    let royalty_applies =
        resale && original_creator.is_some_and(|creator| creator != seller);

    let seller_fraction = if royalty_applies {
        split.seller - split.creator_royalty
    } else {
        split.seller
    };
    let seller_amount = breakdown.principal.mul_fraction(seller_fraction);
    shares.push(Share {
        label: "seller".into(),
        recipient: Some(seller.clone()),
        amount: seller_amount,
        percentage: ratio(seller_amount, total),
    });

    if royalty_applies {
        let creator_amount = breakdown.principal.mul_fraction(split.creator_royalty);
        shares.push(Share {
            label: "creator".into(),
            recipient: original_creator.cloned(),
            amount: creator_amount,
            percentage: ratio(creator_amount, total),
        });
    }

    shares
}

/// Generic table split over the full amount with largest-remainder
/// rounding, so no micro-unit is lost.
fn table_shares(
    total: Amount,
    table: &SplitTable,
    label_recipients: &BTreeMap<String, IdentityRef>,
) -> Vec<Share> {
    let total_micros = total.as_micros();
    let mut allocations: Vec<(usize, i64, f64)> = table
        .shares
        .iter()
        .enumerate()
        .map(|(index, (_, fraction))| {
            let exact = total_micros as f64 * fraction;
            let floor = exact.floor() as i64;
            (index, floor, exact - exact.floor())
        })
        .collect();

    let assigned: i64 = allocations.iter().map(|(_, floor, _)| floor).sum();
    let mut leftover = total_micros - assigned;

    allocations.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap_or(std::cmp::Ordering::Equal));
    for allocation in allocations.iter_mut() {
        if leftover == 0 {
            break;
        }
        allocation.1 += 1;
        leftover -= 1;
    }
    allocations.sort_by_key(|(index, _, _)| *index);

    allocations
        .into_iter()
        .map(|(index, micros, _)| {
            let (label, _) = &table.shares[index];
            let amount = Amount::from_micros(micros);
            Share {
                label: label.clone(),
                recipient: label_recipients.get(label).cloned(),
                amount,
                percentage: ratio(amount, total),
            }
        })
        .collect()
}

fn ratio(amount: Amount, total: Amount) -> f64 {
    if total.is_zero() {
        0.0
    } else {
        amount.to_f64() / total.to_f64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PaymentConfig;
    use proptest::prelude::*;

    fn recipients() -> BTreeMap<String, IdentityRef> {
        let mut map = BTreeMap::new();
        map.insert("platform".into(), IdentityRef::new("dao-platform"));
        map.insert("network".into(), IdentityRef::new("dao-network"));
        map.insert("providers".into(), IdentityRef::new("dao-providers"));
        map
    }

    fn market_charge(resale: bool, creator: Option<&str>) -> ModuleCharge {
        ModuleCharge::Market {
            sale_price: Amount::from_units(100),
            mint: false,
            resale,
            seller: IdentityRef::new("seller"),
            original_creator: creator.map(IdentityRef::new),
        }
    }

    #[test]
    fn market_resale_royalty_split() {
        // sale 100, fee 2.5: platform 0.625, seller 65, creator 5,
        // treasury takes the remainder so the sum is exact.
        let config = PaymentConfig::default();
        let charge = market_charge(true, Some("creator"));
        let breakdown = FeeBreakdown {
            principal: Amount::from_units(100),
            fees: Amount::from_f64(2.5),
            total: Amount::from_f64(102.5),
        };

        let distribution = build_distribution(
            &IntentId::generate(),
            &charge,
            &breakdown,
            &config.market_split,
            &config.mail_split,
            &recipients(),
            0,
        );

        let by_label: BTreeMap<&str, Amount> = distribution
            .shares
            .iter()
            .map(|s| (s.label.as_str(), s.amount))
            .collect();
        assert_eq!(by_label["platform"], Amount::from_f64(0.625));
        assert_eq!(by_label["seller"], Amount::from_units(65));
        assert_eq!(by_label["creator"], Amount::from_units(5));
        assert_eq!(distribution.share_sum(), distribution.total);
    }

    #[test]
    fn market_first_sale_keeps_seller_whole() {
        let config = PaymentConfig::default();
        let charge = market_charge(false, Some("creator"));
        let breakdown = FeeBreakdown {
            principal: Amount::from_units(100),
            fees: Amount::from_f64(2.5),
            total: Amount::from_f64(102.5),
        };

        let distribution = build_distribution(
            &IntentId::generate(),
            &charge,
            &breakdown,
            &config.market_split,
            &config.mail_split,
            &recipients(),
            0,
        );

        let seller = distribution
            .shares
            .iter()
            .find(|s| s.label == "seller")
            .unwrap();
        assert_eq!(seller.amount, Amount::from_units(70));
        assert!(distribution.shares.iter().all(|s| s.label != "creator"));
    }

    #[test]
    fn seller_reselling_own_creation_pays_no_royalty() {
        let config = PaymentConfig::default();
        let charge = ModuleCharge::Market {
            sale_price: Amount::from_units(100),
            mint: false,
            resale: true,
            seller: IdentityRef::new("seller"),
            original_creator: Some(IdentityRef::new("seller")),
        };
        let breakdown = FeeBreakdown {
            principal: Amount::from_units(100),
            fees: Amount::from_f64(2.5),
            total: Amount::from_f64(102.5),
        };

        let distribution = build_distribution(
            &IntentId::generate(),
            &charge,
            &breakdown,
            &config.market_split,
            &config.mail_split,
            &recipients(),
            0,
        );

        let seller = distribution
            .shares
            .iter()
            .find(|s| s.label == "seller")
            .unwrap();
        assert_eq!(seller.amount, Amount::from_units(70));
    }

    #[test]
    fn mail_split_covers_the_full_amount() {
        let config = PaymentConfig::default();
        let charge = ModuleCharge::Mail {
            recipients: 7,
            attachment_mb: 1.5,
            priority_high: true,
        };
        let total = Amount::from_f64(0.155);
        let breakdown = FeeBreakdown {
            principal: Amount::ZERO,
            fees: total,
            total,
        };

        let distribution = build_distribution(
            &IntentId::generate(),
            &charge,
            &breakdown,
            &config.market_split,
            &config.mail_split,
            &recipients(),
            0,
        );

        assert_eq!(distribution.share_sum(), total);
        assert_eq!(distribution.shares.len(), 2);
        assert_eq!(distribution.shares[0].label, "platform");
    }

    #[test]
    fn zero_amount_distribution_is_empty() {
        let config = PaymentConfig::default();
        let charge = ModuleCharge::Storage {
            used_gb: 0.0,
            bandwidth_gb: 0.0,
            premium_features: vec![],
        };
        let breakdown = FeeBreakdown {
            principal: Amount::ZERO,
            fees: Amount::ZERO,
            total: Amount::ZERO,
        };

        let distribution = build_distribution(
            &IntentId::generate(),
            &charge,
            &breakdown,
            &config.market_split,
            &config.storage_split,
            &recipients(),
            0,
        );

        assert!(distribution.shares.is_empty());
        assert!(distribution.total.is_zero());
    }

    proptest! {
        /// The largest-remainder table split never loses or mints a
        /// micro-unit and never produces a negative share.
        #[test]
        fn table_split_conserves_micros(total_micros in 0i64..10_000_000_000, a in 0.0f64..1.0) {
            let b = 1.0 - a;
            let table = SplitTable::new(vec![("x", a), ("y", b)]);
            let total = Amount::from_micros(total_micros);

            let shares = table_shares(total, &table, &BTreeMap::new());
            let sum: i64 = shares.iter().map(|s| s.amount.as_micros()).sum();
            prop_assert_eq!(sum, total_micros);
            prop_assert!(shares.iter().all(|s| !s.amount.is_negative()));
        }
    }
}

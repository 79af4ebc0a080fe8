//! Fee tables, split tables, and lifecycle intervals. All rates live here;
//! the engine carries no literals.

use qinfinity_types::Amount;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct MailFees {
    pub base_per_message: Amount,
    pub per_mb_attachment: Amount,
    pub priority_multiplier: f64,
}

impl Default for MailFees {
    fn default() -> Self {
        Self {
            base_per_message: Amount::from_f64(0.01),
            per_mb_attachment: Amount::from_f64(0.005),
            priority_multiplier: 2.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MarketFees {
    pub transaction_fee_rate: f64,
    pub mint_fee: Amount,
}

impl Default for MarketFees {
    fn default() -> Self {
        Self {
            transaction_fee_rate: 0.025,
            mint_fee: Amount::from_units(5),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StorageFees {
    pub per_gb_month: Amount,
    pub free_gb: f64,
    pub bandwidth_per_gb: Amount,
}

impl Default for StorageFees {
    fn default() -> Self {
        Self {
            per_gb_month: Amount::from_f64(0.02),
            free_gb: 1.0,
            bandwidth_per_gb: Amount::from_f64(0.001),
        }
    }
}

/// Label → fraction split applied over a distribution base; fractions sum
/// to 1.0.
#[derive(Debug, Clone)]
pub struct SplitTable {
    pub shares: Vec<(String, f64)>,
}

impl SplitTable {
    pub fn new(shares: Vec<(&str, f64)>) -> Self {
        Self {
            shares: shares
                .into_iter()
                .map(|(label, fraction)| (label.to_string(), fraction))
                .collect(),
        }
    }
}

/// Market split semantics: the platform fraction applies to the fee
/// portion, the seller and creator fractions to the sale-price portion,
/// and the creator royalty is carved out of the seller's allocation on
/// resales.
#[derive(Debug, Clone)]
pub struct MarketSplit {
    pub platform: f64,
    pub seller: f64,
    pub creator_royalty: f64,
}

impl Default for MarketSplit {
    fn default() -> Self {
        Self {
            platform: 0.25,
            seller: 0.70,
            creator_royalty: 0.05,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PaymentConfig {
    /// Intent lifetime; expires-at = created-at + this.
    pub intent_ttl: Duration,
    /// Cadence of the background expiry sweeper.
    pub expiry_sweep_interval: Duration,
    /// Reconciliation rounding tolerance in micro-units.
    pub reconcile_tolerance_micros: i64,
    pub mail_fees: MailFees,
    pub market_fees: MarketFees,
    pub storage_fees: StorageFees,
    pub mail_split: SplitTable,
    pub market_split: MarketSplit,
    pub storage_split: SplitTable,
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            intent_ttl: Duration::from_secs(3_600),
            expiry_sweep_interval: Duration::from_secs(300),
            reconcile_tolerance_micros: 1,
            mail_fees: MailFees::default(),
            market_fees: MarketFees::default(),
            storage_fees: StorageFees::default(),
            mail_split: SplitTable::new(vec![("platform", 0.80), ("network", 0.20)]),
            market_split: MarketSplit::default(),
            storage_split: SplitTable::new(vec![("platform", 0.60), ("providers", 0.40)]),
        }
    }
}

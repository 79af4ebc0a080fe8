//! Module-specific fee calculation, driven by the configuration tables.

use qinfinity_types::{Amount, IdentityRef};
use serde::{Deserialize, Serialize};

use crate::config::PaymentConfig;
use crate::error::{PaymentError, PaymentResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Module {
    Mail,
    Market,
    Storage,
}

impl Module {
    pub fn as_str(&self) -> &'static str {
        match self {
            Module::Mail => "qmail",
            Module::Market => "qmarket",
            Module::Storage => "qdrive",
        }
    }
}

/// What is being paid for, per module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ModuleCharge {
    Mail {
        recipients: u32,
        attachment_mb: f64,
        priority_high: bool,
    },
    Market {
        sale_price: Amount,
        mint: bool,
        resale: bool,
        seller: IdentityRef,
        original_creator: Option<IdentityRef>,
    },
    Storage {
        used_gb: f64,
        bandwidth_gb: f64,
        premium_features: Vec<(String, Amount)>,
    },
}

impl ModuleCharge {
    pub fn module(&self) -> Module {
        match self {
            ModuleCharge::Mail { .. } => Module::Mail,
            ModuleCharge::Market { .. } => Module::Market,
            ModuleCharge::Storage { .. } => Module::Storage,
        }
    }

    pub fn purpose(&self) -> &'static str {
        match self {
            ModuleCharge::Mail { .. } => "mail.delivery",
            ModuleCharge::Market { .. } => "market.purchase",
            ModuleCharge::Storage { .. } => "storage.billing",
        }
    }
}

/// The computed charge: the principal that changes hands (sale price) and
/// the fees on top.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeBreakdown {
    pub principal: Amount,
    pub fees: Amount,
    pub total: Amount,
}

pub struct FeeCalculator {
    config: PaymentConfig,
}

impl FeeCalculator {
    pub fn new(config: PaymentConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PaymentConfig {
        &self.config
    }

    pub fn compute(&self, charge: &ModuleCharge) -> PaymentResult<FeeBreakdown> {
        match charge {
            ModuleCharge::Mail {
                recipients,
                attachment_mb,
                priority_high,
            } => {
                if *attachment_mb < 0.0 {
                    return Err(PaymentError::InvalidCharge(
                        "negative attachment size".into(),
                    ));
                }
                let table = &self.config.mail_fees;
                let mut fees = Amount::from_micros(
                    table.base_per_message.as_micros() * *recipients as i64,
                ) + table.per_mb_attachment.mul_fraction(*attachment_mb);
                if *priority_high {
                    fees = fees.mul_fraction(table.priority_multiplier);
                }
                Ok(FeeBreakdown {
                    principal: Amount::ZERO,
                    fees,
                    total: fees,
                })
            }
            ModuleCharge::Market {
                sale_price, mint, ..
            } => {
                if sale_price.is_negative() {
                    return Err(PaymentError::InvalidCharge("negative sale price".into()));
                }
                let table = &self.config.market_fees;
                let mut fees = sale_price.mul_fraction(table.transaction_fee_rate);
                if *mint {
                    fees += table.mint_fee;
                }
                Ok(FeeBreakdown {
                    principal: *sale_price,
                    fees,
                    total: *sale_price + fees,
                })
            }
            ModuleCharge::Storage {
                used_gb,
                bandwidth_gb,
                premium_features,
            } => {
                if *used_gb < 0.0 || *bandwidth_gb < 0.0 {
                    return Err(PaymentError::InvalidCharge("negative usage".into()));
                }
                let table = &self.config.storage_fees;
                let billable_gb = (used_gb - table.free_gb).max(0.0);
                let mut fees = table.per_gb_month.mul_fraction(billable_gb)
                    + table.bandwidth_per_gb.mul_fraction(*bandwidth_gb);
                for (_, premium) in premium_features {
                    fees += *premium;
                }
                Ok(FeeBreakdown {
                    principal: Amount::ZERO,
                    fees,
                    total: fees,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn calculator() -> FeeCalculator {
        FeeCalculator::new(PaymentConfig::default())
    }

    #[test]
    fn mail_fee_scales_with_recipients_and_attachment() {
        let breakdown = calculator()
            .compute(&ModuleCharge::Mail {
                recipients: 3,
                attachment_mb: 2.0,
                priority_high: false,
            })
            .unwrap();
        // 3 * 0.01 + 2 * 0.005 = 0.04
        assert_eq!(breakdown.total, Amount::from_f64(0.04));
        assert_eq!(breakdown.principal, Amount::ZERO);
    }

    #[test]
    fn mail_priority_doubles_the_fee() {
        let breakdown = calculator()
            .compute(&ModuleCharge::Mail {
                recipients: 1,
                attachment_mb: 0.0,
                priority_high: true,
            })
            .unwrap();
        assert_eq!(breakdown.total, Amount::from_f64(0.02));
    }

    #[test]
    fn market_fee_is_rate_times_price() {
        let breakdown = calculator()
            .compute(&ModuleCharge::Market {
                sale_price: Amount::from_units(100),
                mint: false,
                resale: true,
                seller: IdentityRef::new("seller"),
                original_creator: Some(IdentityRef::new("creator")),
            })
            .unwrap();
        assert_eq!(breakdown.fees, Amount::from_f64(2.5));
        assert_eq!(breakdown.total, Amount::from_f64(102.5));
    }

    #[test]
    fn market_mint_fee_is_added() {
        let breakdown = calculator()
            .compute(&ModuleCharge::Market {
                sale_price: Amount::from_units(40),
                mint: true,
                resale: false,
                seller: IdentityRef::new("seller"),
                original_creator: None,
            })
            .unwrap();
        // 40 * 0.025 + 5 = 6
        assert_eq!(breakdown.fees, Amount::from_units(6));
    }

    #[test]
    fn storage_free_tier_is_subtracted() {
        let breakdown = calculator()
            .compute(&ModuleCharge::Storage {
                used_gb: 11.0,
                bandwidth_gb: 10.0,
                premium_features: vec![("versioning".into(), Amount::from_f64(0.5))],
            })
            .unwrap();
        // (11-1) * 0.02 + 10 * 0.001 + 0.5 = 0.71
        assert_eq!(breakdown.total, Amount::from_f64(0.71));
    }

    #[test]
    fn storage_below_free_tier_charges_bandwidth_only() {
        let breakdown = calculator()
            .compute(&ModuleCharge::Storage {
                used_gb: 0.5,
                bandwidth_gb: 2.0,
                premium_features: vec![],
            })
            .unwrap();
        assert_eq!(breakdown.total, Amount::from_f64(0.002));
    }

    #[test]
    fn negative_inputs_are_rejected() {
        let error = calculator()
            .compute(&ModuleCharge::Market {
                sale_price: Amount::from_units(-1),
                mint: false,
                resale: false,
                seller: IdentityRef::new("s"),
                original_creator: None,
            })
            .unwrap_err();
        assert_eq!(error.kind(), qinfinity_types::ErrorKind::Validation);
    }
}

//! Reconciliation: settled totals against distributed totals over a time
//! range, by module and by recipient.

use std::collections::BTreeMap;

use qinfinity_types::{topics, Amount, EventActor, EventEnvelope};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::engine::PaymentEngine;
use crate::fees::Module;
use crate::intent::PaymentStatus;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleTotals {
    pub settled: Amount,
    pub distributed: Amount,
    pub intent_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub from_ms: u64,
    pub to_ms: u64,
    pub module_filter: Option<Module>,
    pub settled_total: Amount,
    pub distributed_total: Amount,
    pub by_module: BTreeMap<String, ModuleTotals>,
    pub by_recipient: BTreeMap<String, Amount>,
    /// |settled − distributed| within the configured rounding tolerance.
    pub balanced: bool,
}

impl PaymentEngine {
    /// Totals by module and by recipient label over [from_ms, to_ms],
    /// optionally filtered to one module.
    pub fn reconcile(
        &self,
        from_ms: u64,
        to_ms: u64,
        module_filter: Option<Module>,
    ) -> ReconciliationReport {
        let mut settled_total = Amount::ZERO;
        let mut by_module: BTreeMap<String, ModuleTotals> = BTreeMap::new();

        for entry in self.inner.intents.iter() {
            let PaymentStatus::Settled { settled_at_ms, .. } = &entry.status else {
                continue;
            };
            if *settled_at_ms < from_ms || *settled_at_ms > to_ms {
                continue;
            }
            if module_filter.is_some_and(|m| m != entry.module) {
                continue;
            }
            settled_total += entry.amount;
            let totals = by_module.entry(entry.module.as_str().to_string()).or_default();
            totals.settled += entry.amount;
            totals.intent_count += 1;
        }

        let mut distributed_total = Amount::ZERO;
        let mut by_recipient: BTreeMap<String, Amount> = BTreeMap::new();

        for entry in self.inner.distributions.iter() {
            if entry.created_at_ms < from_ms || entry.created_at_ms > to_ms {
                continue;
            }
            if module_filter.is_some_and(|m| m != entry.module) {
                continue;
            }
            distributed_total += entry.total;
            by_module
                .entry(entry.module.as_str().to_string())
                .or_default()
                .distributed += entry.total;
            for share in &entry.shares {
                *by_recipient.entry(share.label.clone()).or_default() += share.amount;
            }
        }

        let balanced = settled_total.abs_diff(distributed_total)
            <= self.inner.config.reconcile_tolerance_micros;

        let report = ReconciliationReport {
            from_ms,
            to_ms,
            module_filter,
            settled_total,
            distributed_total,
            by_module,
            by_recipient,
            balanced,
        };

        info!(
            settled = %report.settled_total,
            distributed = %report.distributed_total,
            balanced = report.balanced,
            "settlement reconciliation produced"
        );
        if let Some(bus) = &self.inner.bus {
            let envelope = EventEnvelope::new(
                topics::PAYMENT_SETTLEMENT_REPORTED,
                self.inner.clock.now_ms(),
                EventActor::system(),
                json!({
                    "from_ms": report.from_ms,
                    "to_ms": report.to_ms,
                    "settled_total": report.settled_total,
                    "distributed_total": report.distributed_total,
                    "balanced": report.balanced,
                }),
            );
            let _ = bus.publish(envelope);
        }

        report
    }
}

//! The payment engine: intent creation, atomic sandbox settlement under
//! per-wallet locks, revenue crediting, and the expiry sweeper.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use qinfinity_ports::{AuditEvent, AuditPort, ClockPort, EventBusPort, PortError, WalletPort};
use qinfinity_types::{
    topics, Currency, DistributionId, ErrorKind, EventActor, EventEnvelope, IdentityRef, IntentId,
    TransactionId,
};
use serde_json::json;
use tracing::{info, warn};

use crate::config::PaymentConfig;
use crate::error::{PaymentError, PaymentResult};
use crate::fees::{FeeCalculator, ModuleCharge};
use crate::intent::{PaymentIntent, PaymentStatus};
use crate::split::{build_distribution, RevenueDistribution};

#[derive(Debug, Clone)]
pub struct SettlementOutcome {
    pub transaction_id: TransactionId,
    pub distribution: Option<RevenueDistribution>,
    /// True when the intent was already settled and this call was a no-op.
    pub already_settled: bool,
}

pub(crate) struct EngineInner {
    pub(crate) wallet: Arc<dyn WalletPort>,
    pub(crate) clock: Arc<dyn ClockPort>,
    pub(crate) bus: Option<Arc<dyn EventBusPort>>,
    pub(crate) audit: Option<Arc<dyn AuditPort>>,
    pub(crate) config: PaymentConfig,
    pub(crate) fees: FeeCalculator,
    pub(crate) label_recipients: BTreeMap<String, IdentityRef>,
    pub(crate) intents: DashMap<IntentId, PaymentIntent>,
    pub(crate) distributions: DashMap<DistributionId, RevenueDistribution>,
    pub(crate) by_intent: DashMap<IntentId, DistributionId>,
    wallet_locks: DashMap<IdentityRef, Arc<tokio::sync::Mutex<()>>>,
    sweeper: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

#[derive(Clone)]
pub struct PaymentEngine {
    pub(crate) inner: Arc<EngineInner>,
}

impl PaymentEngine {
    pub fn new(
        wallet: Arc<dyn WalletPort>,
        clock: Arc<dyn ClockPort>,
        config: PaymentConfig,
    ) -> Self {
        let fees = FeeCalculator::new(config.clone());
        Self {
            inner: Arc::new(EngineInner {
                wallet,
                clock,
                bus: None,
                audit: None,
                config,
                fees,
                label_recipients: BTreeMap::new(),
                intents: DashMap::new(),
                distributions: DashMap::new(),
                by_intent: DashMap::new(),
                wallet_locks: DashMap::new(),
                sweeper: Mutex::new(None),
            }),
        }
    }

    pub fn with_bus(mut self, bus: Arc<dyn EventBusPort>) -> Self {
        Arc::get_mut(&mut self.inner)
            .expect("with_bus must be called before the engine is shared")
            .bus = Some(bus);
        self
    }

    pub fn with_audit(mut self, audit: Arc<dyn AuditPort>) -> Self {
        Arc::get_mut(&mut self.inner)
            .expect("with_audit must be called before the engine is shared")
            .audit = Some(audit);
        self
    }

    /// Bind a split-table label (platform, network, providers, treasury)
    /// to the identity credited for that share.
    pub fn with_recipient(mut self, label: &str, identity: IdentityRef) -> Self {
        Arc::get_mut(&mut self.inner)
            .expect("with_recipient must be called before the engine is shared")
            .label_recipients
            .insert(label.to_string(), identity);
        self
    }

    pub fn intent(&self, intent_id: &IntentId) -> PaymentResult<PaymentIntent> {
        self.inner
            .intents
            .get(intent_id)
            .map(|i| i.clone())
            .ok_or_else(|| PaymentError::IntentNotFound(intent_id.to_string()))
    }

    pub fn distribution_for(&self, intent_id: &IntentId) -> Option<RevenueDistribution> {
        let id = self.inner.by_intent.get(intent_id)?;
        self.inner.distributions.get(&id).map(|d| d.clone())
    }

    /// Validate the payer's charge, compute the amount, and open a PENDING
    /// intent expiring one TTL from now.
    pub fn create_intent(
        &self,
        payer: IdentityRef,
        charge: ModuleCharge,
        currency: Currency,
    ) -> PaymentResult<PaymentIntent> {
        if payer.as_str().is_empty() {
            return Err(PaymentError::InvalidCharge("empty payer identity".into()));
        }
        let breakdown = self.inner.fees.compute(&charge)?;
        if breakdown.total.is_negative() {
            return Err(PaymentError::InvalidCharge("negative amount".into()));
        }

        let now_ms = self.inner.clock.now_ms();
        let intent = PaymentIntent {
            intent_id: IntentId::generate(),
            payer: payer.clone(),
            module: charge.module(),
            purpose: charge.purpose().into(),
            charge,
            amount: breakdown.total,
            currency,
            created_at_ms: now_ms,
            status: PaymentStatus::Pending {
                expires_at_ms: now_ms + self.inner.config.intent_ttl.as_millis() as u64,
            },
        };

        self.inner.intents.insert(intent.intent_id.clone(), intent.clone());
        info!(intent_id = %intent.intent_id, amount = %intent.amount, "payment intent created");
        self.emit(
            topics::PAYMENT_INTENT_CREATED,
            EventActor::new(payer, "payer"),
            json!({
                "intent_id": intent.intent_id.to_string(),
                "module": intent.module.as_str(),
                "amount": intent.amount,
                "currency": intent.currency.code(),
            }),
            &intent.intent_id.to_string(),
        );
        Ok(intent)
    }

    /// Settle a PENDING intent: debit the payer, transition, credit every
    /// distribution share. Re-settling a SETTLED intent is a no-op that
    /// returns the original transaction id.
    pub async fn settle(&self, intent_id: &IntentId) -> PaymentResult<SettlementOutcome> {
        let intent = self.intent(intent_id)?;

        match &intent.status {
            PaymentStatus::Settled { transaction_id, .. } => {
                return Ok(SettlementOutcome {
                    transaction_id: transaction_id.clone(),
                    distribution: self.distribution_for(intent_id),
                    already_settled: true,
                });
            }
            PaymentStatus::Expired | PaymentStatus::Failed { .. } => {
                return Err(PaymentError::IntentTerminal {
                    intent_id: intent_id.to_string(),
                    status: intent.status.as_str().into(),
                });
            }
            PaymentStatus::Pending { expires_at_ms } => {
                if self.inner.clock.now_ms() >= *expires_at_ms {
                    self.with_intent_mut(intent_id, |i| i.transition(PaymentStatus::Expired))?;
                    return Err(PaymentError::IntentExpired(intent_id.to_string()));
                }
            }
        }

        let breakdown = self.inner.fees.compute(&intent.charge)?;
        let plan = build_distribution(
            intent_id,
            &intent.charge,
            &breakdown,
            &self.inner.config.market_split,
            self.split_table_for(&intent),
            &self.inner.label_recipients,
            self.inner.clock.now_ms(),
        );

        // Exclusive per-wallet locks, acquired in identity order so
        // concurrent settlements cannot deadlock.
        let mut wallets: Vec<IdentityRef> = std::iter::once(intent.payer.clone())
            .chain(plan.shares.iter().filter_map(|s| s.recipient.clone()))
            .collect();
        wallets.sort();
        wallets.dedup();
        let _guards = self.lock_wallets(&wallets).await;

        // Re-check under the payer lock: a concurrent settle may have won.
        match self.intent(intent_id)?.status {
            PaymentStatus::Settled { transaction_id, .. } => {
                return Ok(SettlementOutcome {
                    transaction_id,
                    distribution: self.distribution_for(intent_id),
                    already_settled: true,
                });
            }
            PaymentStatus::Expired | PaymentStatus::Failed { .. } => {
                return Err(PaymentError::IntentTerminal {
                    intent_id: intent_id.to_string(),
                    status: "terminal".into(),
                });
            }
            PaymentStatus::Pending { .. } => {}
        }

        let balance = self
            .inner
            .wallet
            .balance(&intent.payer, intent.currency)
            .await
            .map_err(|e| PaymentError::Wallet(e.to_string()))?;
        if balance < intent.amount {
            self.audit_failure(&intent, ErrorKind::AuthorizationDenied, "insufficient funds");
            return Err(PaymentError::InsufficientFunds {
                required: intent.amount.to_string(),
                available: balance.to_string(),
            });
        }

        let transaction_id = TransactionId::generate();
        self.inner
            .wallet
            .debit(&intent.payer, intent.amount, intent.currency, &transaction_id)
            .await
            .map_err(|e| match e {
                PortError::InsufficientFunds { required, available } => {
                    PaymentError::InsufficientFunds { required, available }
                }
                other => PaymentError::Wallet(other.to_string()),
            })?;

        let settled_at_ms = self.inner.clock.now_ms();
        self.with_intent_mut(intent_id, |i| {
            i.transition(PaymentStatus::Settled {
                transaction_id: transaction_id.clone(),
                settled_at_ms,
            })
        })?;

        info!(
            intent_id = %intent_id,
            transaction_id = %transaction_id,
            amount = %intent.amount,
            "payment settled"
        );
        self.emit(
            topics::PAYMENT_SETTLED,
            EventActor::new(intent.payer.clone(), "payer"),
            json!({
                "intent_id": intent_id.to_string(),
                "transaction_id": transaction_id.to_string(),
                "amount": intent.amount,
                "module": intent.module.as_str(),
            }),
            &intent_id.to_string(),
        );

        let distribution = if intent.amount.is_zero() {
            None
        } else {
            self.credit_shares(&plan, intent.currency, &transaction_id)
                .await?;
            self.inner
                .by_intent
                .insert(intent_id.clone(), plan.distribution_id.clone());
            self.inner
                .distributions
                .insert(plan.distribution_id.clone(), plan.clone());
            Some(plan)
        };

        Ok(SettlementOutcome {
            transaction_id,
            distribution,
            already_settled: false,
        })
    }

    async fn credit_shares(
        &self,
        distribution: &RevenueDistribution,
        currency: Currency,
        settlement_tx: &TransactionId,
    ) -> PaymentResult<()> {
        for share in &distribution.shares {
            let Some(recipient) = &share.recipient else {
                continue;
            };
            if share.amount.is_zero() {
                continue;
            }
            // Deterministic per-share transaction id keeps credits
            // idempotent if the settlement is retried.
            let tx = TransactionId::new(format!("{}/{}", settlement_tx.as_str(), share.label));
            self.inner
                .wallet
                .credit(recipient, share.amount, currency, &tx)
                .await
                .map_err(|e| {
                    warn!(recipient = %recipient, %e, "revenue credit failed");
                    PaymentError::Wallet(e.to_string())
                })?;
        }
        Ok(())
    }

    fn split_table_for(&self, intent: &PaymentIntent) -> &crate::config::SplitTable {
        match intent.module {
            crate::fees::Module::Mail => &self.inner.config.mail_split,
            // Market uses MarketSplit; the table argument is unused there.
            crate::fees::Module::Market => &self.inner.config.mail_split,
            crate::fees::Module::Storage => &self.inner.config.storage_split,
        }
    }

    async fn lock_wallets(
        &self,
        wallets: &[IdentityRef],
    ) -> Vec<tokio::sync::OwnedMutexGuard<()>> {
        let mut guards = Vec::with_capacity(wallets.len());
        for wallet in wallets {
            let lock = self
                .inner
                .wallet_locks
                .entry(wallet.clone())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
                .clone();
            guards.push(lock.lock_owned().await);
        }
        guards
    }

    fn with_intent_mut<T>(
        &self,
        intent_id: &IntentId,
        f: impl FnOnce(&mut PaymentIntent) -> PaymentResult<T>,
    ) -> PaymentResult<T> {
        let mut entry = self
            .inner
            .intents
            .get_mut(intent_id)
            .ok_or_else(|| PaymentError::IntentNotFound(intent_id.to_string()))?;
        f(&mut entry)
    }

    /// Transition every overdue PENDING intent to EXPIRED; returns the
    /// expired ids. The background sweeper calls this on its interval.
    pub fn expire_overdue(&self) -> Vec<IntentId> {
        let now_ms = self.inner.clock.now_ms();
        let overdue: Vec<IntentId> = self
            .inner
            .intents
            .iter()
            .filter(|entry| {
                matches!(entry.status, PaymentStatus::Pending { expires_at_ms } if now_ms >= expires_at_ms)
            })
            .map(|entry| entry.intent_id.clone())
            .collect();

        let mut expired = Vec::with_capacity(overdue.len());
        for intent_id in overdue {
            if self
                .with_intent_mut(&intent_id, |i| i.transition(PaymentStatus::Expired))
                .is_ok()
            {
                info!(intent_id = %intent_id, "payment intent expired");
                expired.push(intent_id);
            }
        }
        expired
    }

    /// Start the expiry sweeper. Lifecycle-bound: `stop()` cancels it.
    pub fn start(&self) -> PaymentResult<()> {
        let mut sweeper = self
            .inner
            .sweeper
            .lock()
            .map_err(|_| PaymentError::Internal("sweeper handle poisoned".into()))?;
        if sweeper.is_some() {
            return Err(PaymentError::Internal("sweeper already running".into()));
        }

        let engine = self.clone();
        *sweeper = Some(tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(engine.inner.config.expiry_sweep_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                engine.expire_overdue();
            }
        }));
        Ok(())
    }

    pub fn stop(&self) {
        if let Ok(mut sweeper) = self.inner.sweeper.lock() {
            if let Some(task) = sweeper.take() {
                task.abort();
            }
        }
    }

    fn audit_failure(&self, intent: &PaymentIntent, kind: ErrorKind, reason: &str) {
        if let Some(audit) = &self.inner.audit {
            let _ = audit.record(AuditEvent {
                action: "payment.settle.denied".into(),
                actor: intent.payer.clone(),
                resource: intent.intent_id.to_string(),
                outcome: reason.into(),
                error_kind: Some(kind),
                correlation_id: Some(intent.intent_id.to_string()),
                timestamp_ms: self.inner.clock.now_ms(),
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
        if let Some(bus) = &self.inner.bus {
            let envelope =
                EventEnvelope::new(topic, self.inner.clock.now_ms(), actor, payload)
                    .with_correlation(correlation.to_string());
            let _ = bus.publish(envelope);
        }
    }
}

//! Wallet capability port (Qwallet-shaped). All mutating operations are
//! idempotent on a caller-generated transaction id.

use async_trait::async_trait;
use dashmap::DashMap;
use qinfinity_types::{Amount, Currency, IdentityRef, TransactionId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Mutex;

use crate::error::{PortError, PortResult};

/// Reference to an NFT held by an identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NftRef {
    pub token_id: String,
    pub collection: String,
}

#[async_trait]
pub trait WalletPort: Send + Sync {
    async fn balance(&self, identity: &IdentityRef, currency: Currency) -> PortResult<Amount>;

    /// Debit `amount`. Re-applying a transaction id that was already applied
    /// is a no-op returning `Ok`.
    async fn debit(
        &self,
        identity: &IdentityRef,
        amount: Amount,
        currency: Currency,
        tx: &TransactionId,
    ) -> PortResult<()>;

    /// Credit `amount`, idempotent on `tx` like `debit`.
    async fn credit(
        &self,
        identity: &IdentityRef,
        amount: Amount,
        currency: Currency,
        tx: &TransactionId,
    ) -> PortResult<()>;

    async fn list_nfts(&self, identity: &IdentityRef) -> PortResult<Vec<NftRef>>;
}

/// In-memory wallet with an applied-transaction log for idempotence.
pub struct MemoryWallet {
    balances: DashMap<(IdentityRef, Currency), i64>,
    nfts: DashMap<IdentityRef, Vec<NftRef>>,
    applied: Mutex<HashSet<String>>,
}

impl MemoryWallet {
    pub fn new() -> Self {
        Self {
            balances: DashMap::new(),
            nfts: DashMap::new(),
            applied: Mutex::new(HashSet::new()),
        }
    }

    pub fn fund(&self, identity: &IdentityRef, amount: Amount, currency: Currency) {
        *self
            .balances
            .entry((identity.clone(), currency))
            .or_insert(0) += amount.as_micros();
    }

    pub fn grant_nft(&self, identity: &IdentityRef, nft: NftRef) {
        self.nfts.entry(identity.clone()).or_default().push(nft);
    }

    /// Marks `tx` applied; returns false when it had already been applied.
    fn mark_applied(&self, tx: &TransactionId, op: &str) -> PortResult<bool> {
        let mut applied = self
            .applied
            .lock()
            .map_err(|_| PortError::Internal("wallet transaction log poisoned".into()))?;
        Ok(applied.insert(format!("{op}:{tx}")))
    }
}

impl Default for MemoryWallet {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WalletPort for MemoryWallet {
    async fn balance(&self, identity: &IdentityRef, currency: Currency) -> PortResult<Amount> {
        Ok(Amount::from_micros(
            self.balances
                .get(&(identity.clone(), currency))
                .map(|b| *b)
                .unwrap_or(0),
        ))
    }

    async fn debit(
        &self,
        identity: &IdentityRef,
        amount: Amount,
        currency: Currency,
        tx: &TransactionId,
    ) -> PortResult<()> {
        if amount.is_negative() {
            return Err(PortError::Internal("negative debit amount".into()));
        }
        if !self.mark_applied(tx, "debit")? {
            return Ok(());
        }

        let mut balance = self
            .balances
            .entry((identity.clone(), currency))
            .or_insert(0);
        if *balance < amount.as_micros() {
            return Err(PortError::InsufficientFunds {
                required: amount.to_string(),
                available: Amount::from_micros(*balance).to_string(),
            });
        }
        *balance -= amount.as_micros();
        Ok(())
    }

    async fn credit(
        &self,
        identity: &IdentityRef,
        amount: Amount,
        currency: Currency,
        tx: &TransactionId,
    ) -> PortResult<()> {
        if amount.is_negative() {
            return Err(PortError::Internal("negative credit amount".into()));
        }
        if !self.mark_applied(tx, "credit")? {
            return Ok(());
        }

        *self
            .balances
            .entry((identity.clone(), currency))
            .or_insert(0) += amount.as_micros();
        Ok(())
    }

    async fn list_nfts(&self, identity: &IdentityRef) -> PortResult<Vec<NftRef>> {
        Ok(self
            .nfts
            .get(identity)
            .map(|list| list.clone())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> IdentityRef {
        IdentityRef::new("alice")
    }

    #[tokio::test]
    async fn debit_and_credit_move_balance() {
        let wallet = MemoryWallet::new();
        wallet.fund(&alice(), Amount::from_units(1000), Currency::QToken);

        wallet
            .debit(
                &alice(),
                Amount::from_f64(102.5),
                Currency::QToken,
                &TransactionId::new("tx-1"),
            )
            .await
            .unwrap();

        let balance = wallet.balance(&alice(), Currency::QToken).await.unwrap();
        assert_eq!(balance, Amount::from_f64(897.5));
    }

    #[tokio::test]
    async fn debit_rejects_insufficient_funds() {
        let wallet = MemoryWallet::new();
        wallet.fund(&alice(), Amount::from_units(10), Currency::QToken);

        let result = wallet
            .debit(
                &alice(),
                Amount::from_units(11),
                Currency::QToken,
                &TransactionId::new("tx-1"),
            )
            .await;
        assert!(matches!(result, Err(PortError::InsufficientFunds { .. })));
    }

    #[tokio::test]
    async fn operations_are_idempotent_on_transaction_id() {
        let wallet = MemoryWallet::new();
        wallet.fund(&alice(), Amount::from_units(100), Currency::QToken);
        let tx = TransactionId::new("tx-same");

        wallet
            .debit(&alice(), Amount::from_units(40), Currency::QToken, &tx)
            .await
            .unwrap();
        wallet
            .debit(&alice(), Amount::from_units(40), Currency::QToken, &tx)
            .await
            .unwrap();

        let balance = wallet.balance(&alice(), Currency::QToken).await.unwrap();
        assert_eq!(balance, Amount::from_units(60));
    }

    #[tokio::test]
    async fn currencies_are_isolated() {
        let wallet = MemoryWallet::new();
        wallet.fund(&alice(), Amount::from_units(5), Currency::Pi);

        let qtoken = wallet.balance(&alice(), Currency::QToken).await.unwrap();
        assert!(qtoken.is_zero());
    }

    #[tokio::test]
    async fn nft_listing_defaults_empty() {
        let wallet = MemoryWallet::new();
        assert!(wallet.list_nfts(&alice()).await.unwrap().is_empty());

        wallet.grant_nft(
            &alice(),
            NftRef {
                token_id: "nft-1".into(),
                collection: "genesis".into(),
            },
        );
        assert_eq!(wallet.list_nfts(&alice()).await.unwrap().len(), 1);
    }
}

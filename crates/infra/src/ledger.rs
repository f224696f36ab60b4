//! Balance mutation protocol (application-level orchestration).
//!
//! `BalanceLedger` turns a deposit/withdraw request into one unit of work against a
//! [`BalanceStore`]:
//!
//! ```text
//! change_balance(wallet, operation, amount)
//!   ↓
//! 1. Map operation to a signed delta (no storage touched)
//!   ↓
//! 2. Begin unit of work, take the wallet's serialization token
//!   ↓
//! 3. Insert the wallet row with balance 0 if absent
//!   ↓
//! 4. Conditional add guarded by `balance + delta >= 0`
//!   ↓
//! 5. Commit (or roll back on any failure, lazy insert included)
//! ```
//!
//! The ledger holds no state and no in-process locks. All serialization comes from the
//! store's per-wallet token, which lives exactly as long as the unit of work. Nothing
//! is retried here: two deposits of the same amount are two deposits.

use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use wallet_core::{Amount, LockKey, OperationType, WalletBalance, WalletId};

use crate::balance_store::{BalanceStore, StoreError, UnitOfWork};

/// Ledger operation error.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LedgerError {
    /// Operation tag outside {DEPOSIT, WITHDRAW}; rejected before any side effect.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// The withdrawal would drive the balance negative; nothing was changed.
    #[error("insufficient funds in wallet {0}")]
    InsufficientFunds(WalletId),

    /// Session pool exhausted or closed; nothing was committed, safe to retry.
    #[error("resource unavailable: {0}")]
    ResourceUnavailable(String),

    /// Any other storage failure; the unit of work was rolled back.
    #[error("store failure: {0}")]
    StoreFailure(StoreError),
}

impl LedgerError {
    /// Errors the caller can fix by changing the request.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            LedgerError::InvalidOperation(_) | LedgerError::InsufficientFunds(_)
        )
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::ResourceUnavailable(_))
    }
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::ResourceUnavailable(msg) => LedgerError::ResourceUnavailable(msg),
            other => LedgerError::StoreFailure(other),
        }
    }
}

/// Per-wallet balance ledger over an injected store.
#[derive(Debug, Clone)]
pub struct BalanceLedger<S> {
    store: S,
}

impl<S> BalanceLedger<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<S: BalanceStore> BalanceLedger<S> {
    /// Apply `operation` of `amount` to `wallet_id`, returning the committed balance.
    ///
    /// Calls for the same wallet are totally ordered by the store's serialization
    /// token; calls for different wallets proceed independently. Dropping the returned
    /// future rolls back whatever the unit of work had written.
    #[instrument(
        skip_all,
        fields(
            wallet_id = %wallet_id,
            operation = %operation,
            amount = %amount
        ),
        err(level = "debug")
    )]
    pub async fn change_balance(
        &self,
        wallet_id: WalletId,
        operation: OperationType,
        amount: Amount,
    ) -> Result<i64, LedgerError> {
        let delta = operation.delta(amount);

        let mut uow = self.store.begin().await?;
        match apply_delta(&mut uow, wallet_id, delta).await {
            Ok(new_balance) => {
                uow.commit().await?;
                debug!(new_balance, "balance change committed");
                Ok(new_balance)
            }
            Err(err) => {
                if let Err(rollback_err) = uow.rollback().await {
                    warn!(error = %rollback_err, "rollback failed");
                }
                match &err {
                    LedgerError::InsufficientFunds(_) => info!("insufficient funds"),
                    other => warn!(error = %other, "balance change aborted"),
                }
                Err(err)
            }
        }
    }

    /// Like [`Self::change_balance`], taking the operation as its wire tag.
    ///
    /// Unknown tags fail with [`LedgerError::InvalidOperation`] before a unit of work
    /// is opened.
    pub async fn change_balance_tagged(
        &self,
        wallet_id: WalletId,
        operation: &str,
        amount: Amount,
    ) -> Result<i64, LedgerError> {
        let operation = operation
            .parse::<OperationType>()
            .map_err(|_| LedgerError::InvalidOperation(operation.to_string()))?;
        self.change_balance(wallet_id, operation, amount).await
    }

    /// Committed balance of `wallet_id`, 0 for a wallet that was never mutated.
    ///
    /// Takes no serialization token, so it never waits behind in-flight changes.
    pub async fn get_balance(&self, wallet_id: WalletId) -> Result<i64, LedgerError> {
        Ok(self
            .get_wallet(wallet_id)
            .await?
            .map_or(0, |wallet| wallet.balance))
    }

    /// Full committed record, without materializing one.
    pub async fn get_wallet(
        &self,
        wallet_id: WalletId,
    ) -> Result<Option<WalletBalance>, LedgerError> {
        Ok(self.store.read_record(wallet_id).await?)
    }
}

async fn apply_delta<U: UnitOfWork>(
    uow: &mut U,
    wallet_id: WalletId,
    delta: i64,
) -> Result<i64, LedgerError> {
    uow.acquire_serialization(LockKey::for_wallet(&wallet_id)).await?;
    uow.upsert_if_absent(wallet_id, 0).await?;
    uow.conditional_add(wallet_id, delta, 0)
        .await?
        .ok_or(LedgerError::InsufficientFunds(wallet_id))
}

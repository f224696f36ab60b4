use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use wallet_core::{LockKey, WalletBalance, WalletId};

/// Balance store operation error.
///
/// These are **infrastructure errors** as opposed to domain outcomes such as
/// insufficient funds, which the ledger derives from [`UnitOfWork::conditional_add`]
/// returning `None`.
///
/// ## Error Categories
///
/// - **ResourceUnavailable**: session pool exhausted, acquire timed out, pool closed.
///   Nothing was committed; the caller may retry.
/// - **Constraint**: the backend refused a write (check constraint, integer overflow).
/// - **Backend**: any other storage failure (network, protocol, poisoned state).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("resource unavailable: {0}")]
    ResourceUnavailable(String),

    #[error("constraint violated: {0}")]
    Constraint(String),

    #[error("storage backend failure: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::ResourceUnavailable(_))
    }
}

/// Durable owner of wallet balance records.
///
/// The store hands out [`UnitOfWork`]s: atomic, isolated sessions that either fully
/// commit or fully roll back. It is injected into the ledger as a value so tests can
/// substitute the in-memory implementation for Postgres.
///
/// ## Implementation Requirements
///
/// Implementations must:
/// - bound the number of concurrently open sessions and report exhaustion as
///   [`StoreError::ResourceUnavailable`] instead of waiting forever
/// - roll back a unit of work that is dropped without `commit` (cancellation)
/// - serve `read_record` from committed state only, without taking any
///   serialization token
#[async_trait]
pub trait BalanceStore: Send + Sync {
    type UnitOfWork: UnitOfWork;

    /// Open a new unit of work (acquires one pooled session).
    async fn begin(&self) -> Result<Self::UnitOfWork, StoreError>;

    /// Read the committed record, `None` if the wallet was never materialized.
    async fn read_record(&self, wallet_id: WalletId) -> Result<Option<WalletBalance>, StoreError>;
}

/// One transactional session against the store.
///
/// Everything written through a unit of work becomes visible to others only after
/// [`UnitOfWork::commit`]. Serialization tokens taken with
/// [`UnitOfWork::acquire_serialization`] are released on commit, rollback or drop,
/// never earlier.
#[async_trait]
pub trait UnitOfWork: Send {
    /// Block until the exclusive token for `key` is held by this unit of work.
    ///
    /// Re-acquiring a key already held by the same unit of work is a no-op.
    async fn acquire_serialization(&mut self, key: LockKey) -> Result<(), StoreError>;

    /// Insert `{wallet_id, initial_balance}` unless a record already exists.
    async fn upsert_if_absent(
        &mut self,
        wallet_id: WalletId,
        initial_balance: i64,
    ) -> Result<(), StoreError>;

    /// Add `delta` to the balance iff `balance + delta >= floor`, as one storage step.
    ///
    /// Returns the new balance, or `None` when the record is missing or the guard
    /// rejected the change (nothing is written in that case).
    async fn conditional_add(
        &mut self,
        wallet_id: WalletId,
        delta: i64,
        floor: i64,
    ) -> Result<Option<i64>, StoreError>;

    async fn commit(self) -> Result<(), StoreError>;

    async fn rollback(self) -> Result<(), StoreError>;
}

#[async_trait]
impl<S> BalanceStore for Arc<S>
where
    S: BalanceStore + ?Sized,
{
    type UnitOfWork = S::UnitOfWork;

    async fn begin(&self) -> Result<Self::UnitOfWork, StoreError> {
        (**self).begin().await
    }

    async fn read_record(&self, wallet_id: WalletId) -> Result<Option<WalletBalance>, StoreError> {
        (**self).read_record(wallet_id).await
    }
}

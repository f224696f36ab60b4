use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard, OwnedSemaphorePermit, Semaphore};

use wallet_core::{LockKey, WalletBalance, WalletId};

use super::r#trait::{BalanceStore, StoreError, UnitOfWork};

/// Default session count, matching the Postgres pool's `max_connections`.
pub const DEFAULT_SESSIONS: usize = 50;

/// Default wait for a free session before reporting exhaustion.
pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug)]
struct Shared {
    records: RwLock<HashMap<WalletId, WalletBalance>>,
    // Coarse lock over the key -> mutex table; never held across an await.
    locks: Mutex<HashMap<LockKey, Arc<AsyncMutex<()>>>>,
    sessions: Arc<Semaphore>,
    acquire_timeout: Duration,
}

/// In-memory transactional balance store.
///
/// Intended for tests/dev. Mirrors the Postgres store's behaviour: a bounded session
/// pool, per-key exclusive tokens held until the unit of work ends, and writes staged
/// per unit of work until commit.
#[derive(Debug, Clone)]
pub struct InMemoryBalanceStore {
    shared: Arc<Shared>,
}

impl InMemoryBalanceStore {
    pub fn new() -> Self {
        Self::with_sessions(DEFAULT_SESSIONS, DEFAULT_ACQUIRE_TIMEOUT)
    }

    pub fn with_sessions(max_sessions: usize, acquire_timeout: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                records: RwLock::new(HashMap::new()),
                locks: Mutex::new(HashMap::new()),
                sessions: Arc::new(Semaphore::new(max_sessions)),
                acquire_timeout,
            }),
        }
    }

    /// Stop handing out sessions. Open units of work finish normally.
    pub fn close(&self) {
        self.shared.sessions.close();
    }

    /// Whether a committed record exists for `wallet_id`.
    pub fn contains(&self, wallet_id: &WalletId) -> bool {
        self.shared
            .records
            .read()
            .map(|records| records.contains_key(wallet_id))
            .unwrap_or(false)
    }

    /// Number of serialization tokens currently held or awaited.
    pub fn active_locks(&self) -> usize {
        self.shared.locks.lock().map(|locks| locks.len()).unwrap_or(0)
    }

    async fn acquire_session(&self) -> Result<OwnedSemaphorePermit, StoreError> {
        let acquire = self.shared.sessions.clone().acquire_owned();
        match tokio::time::timeout(self.shared.acquire_timeout, acquire).await {
            Ok(Ok(permit)) => Ok(permit),
            Ok(Err(_)) => Err(StoreError::ResourceUnavailable("session pool closed".to_string())),
            Err(_) => Err(StoreError::ResourceUnavailable(format!(
                "no session available within {:?}",
                self.shared.acquire_timeout
            ))),
        }
    }
}

impl Default for InMemoryBalanceStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BalanceStore for InMemoryBalanceStore {
    type UnitOfWork = InMemoryUnitOfWork;

    async fn begin(&self) -> Result<Self::UnitOfWork, StoreError> {
        let session = self.acquire_session().await?;
        Ok(InMemoryUnitOfWork {
            shared: self.shared.clone(),
            _session: session,
            held: Vec::new(),
            staged: HashMap::new(),
        })
    }

    async fn read_record(&self, wallet_id: WalletId) -> Result<Option<WalletBalance>, StoreError> {
        let _session = self.acquire_session().await?;
        let records = self.shared.records.read().map_err(|_| poisoned())?;
        Ok(records.get(&wallet_id).cloned())
    }
}

/// Unit of work over [`InMemoryBalanceStore`].
///
/// Dropping it without `commit` discards staged writes and releases its tokens and
/// session, which is what a cancelled future does.
#[derive(Debug)]
pub struct InMemoryUnitOfWork {
    shared: Arc<Shared>,
    _session: OwnedSemaphorePermit,
    held: Vec<(LockKey, OwnedMutexGuard<()>)>,
    staged: HashMap<WalletId, WalletBalance>,
}

impl InMemoryUnitOfWork {
    fn current(&self, wallet_id: &WalletId) -> Result<Option<WalletBalance>, StoreError> {
        if let Some(staged) = self.staged.get(wallet_id) {
            return Ok(Some(staged.clone()));
        }
        let records = self.shared.records.read().map_err(|_| poisoned())?;
        Ok(records.get(wallet_id).cloned())
    }

    fn release_locks(&mut self) {
        if self.held.is_empty() {
            return;
        }
        self.held.clear();
        // Entries with no holder and no waiter are only referenced by the table.
        if let Ok(mut locks) = self.shared.locks.lock() {
            locks.retain(|_, mutex| Arc::strong_count(mutex) > 1);
        }
    }
}

#[async_trait]
impl UnitOfWork for InMemoryUnitOfWork {
    async fn acquire_serialization(&mut self, key: LockKey) -> Result<(), StoreError> {
        if self.held.iter().any(|(held, _)| *held == key) {
            return Ok(());
        }

        let mutex = {
            let mut locks = self.shared.locks.lock().map_err(|_| poisoned())?;
            locks.entry(key).or_default().clone()
        };
        let guard = mutex.lock_owned().await;
        self.held.push((key, guard));
        Ok(())
    }

    async fn upsert_if_absent(
        &mut self,
        wallet_id: WalletId,
        initial_balance: i64,
    ) -> Result<(), StoreError> {
        if self.current(&wallet_id)?.is_none() {
            let mut record = WalletBalance::opened(wallet_id, Utc::now());
            record.balance = initial_balance;
            self.staged.insert(wallet_id, record);
        }
        Ok(())
    }

    async fn conditional_add(
        &mut self,
        wallet_id: WalletId,
        delta: i64,
        floor: i64,
    ) -> Result<Option<i64>, StoreError> {
        let Some(mut record) = self.current(&wallet_id)? else {
            return Ok(None);
        };

        let candidate = record.balance.checked_add(delta).ok_or_else(|| {
            StoreError::Constraint(format!(
                "balance {} + {} out of range for i64",
                record.balance, delta
            ))
        })?;
        if candidate < floor {
            return Ok(None);
        }

        record.balance = candidate;
        record.updated_at = Utc::now();
        self.staged.insert(wallet_id, record);
        Ok(Some(candidate))
    }

    async fn commit(mut self) -> Result<(), StoreError> {
        let staged = std::mem::take(&mut self.staged);
        {
            let mut records = self.shared.records.write().map_err(|_| poisoned())?;
            records.extend(staged);
        }
        self.release_locks();
        Ok(())
    }

    async fn rollback(mut self) -> Result<(), StoreError> {
        self.staged.clear();
        self.release_locks();
        Ok(())
    }
}

impl Drop for InMemoryUnitOfWork {
    fn drop(&mut self) {
        self.release_locks();
    }
}

fn poisoned() -> StoreError {
    StoreError::Backend("lock poisoned".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn staged_writes_are_invisible_until_commit() {
        let store = InMemoryBalanceStore::new();
        let id = WalletId::new();

        let mut uow = store.begin().await.unwrap();
        uow.upsert_if_absent(id, 0).await.unwrap();
        assert_eq!(uow.conditional_add(id, 30, 0).await.unwrap(), Some(30));
        assert_eq!(store.read_record(id).await.unwrap(), None);

        uow.commit().await.unwrap();
        assert_eq!(store.read_record(id).await.unwrap().unwrap().balance, 30);
    }

    #[tokio::test]
    async fn upsert_never_overwrites() {
        let store = InMemoryBalanceStore::new();
        let id = WalletId::new();

        let mut uow = store.begin().await.unwrap();
        uow.upsert_if_absent(id, 0).await.unwrap();
        uow.conditional_add(id, 7, 0).await.unwrap();
        uow.commit().await.unwrap();

        let mut uow = store.begin().await.unwrap();
        uow.upsert_if_absent(id, 0).await.unwrap();
        uow.upsert_if_absent(id, 0).await.unwrap();
        uow.commit().await.unwrap();

        assert_eq!(store.read_record(id).await.unwrap().unwrap().balance, 7);
    }

    #[tokio::test]
    async fn guard_rejection_writes_nothing() {
        let store = InMemoryBalanceStore::new();
        let id = WalletId::new();

        let mut uow = store.begin().await.unwrap();
        uow.upsert_if_absent(id, 0).await.unwrap();
        uow.conditional_add(id, 5, 0).await.unwrap();
        assert_eq!(uow.conditional_add(id, -6, 0).await.unwrap(), None);
        assert_eq!(uow.conditional_add(id, -5, 0).await.unwrap(), Some(0));
        uow.commit().await.unwrap();

        assert_eq!(store.read_record(id).await.unwrap().unwrap().balance, 0);
    }

    #[tokio::test]
    async fn conditional_add_on_missing_record_is_none() {
        let store = InMemoryBalanceStore::new();
        let mut uow = store.begin().await.unwrap();
        assert_eq!(uow.conditional_add(WalletId::new(), 1, 0).await.unwrap(), None);
    }

    #[tokio::test]
    async fn overflow_is_a_constraint_error() {
        let store = InMemoryBalanceStore::new();
        let id = WalletId::new();
        let mut uow = store.begin().await.unwrap();
        uow.upsert_if_absent(id, i64::MAX).await.unwrap();

        let err = uow.conditional_add(id, 1, 0).await.unwrap_err();
        assert!(matches!(err, StoreError::Constraint(_)));
    }

    #[tokio::test]
    async fn drop_releases_tokens_and_discards_writes() {
        let store = InMemoryBalanceStore::new();
        let id = WalletId::new();
        let key = LockKey::for_wallet(&id);

        {
            let mut uow = store.begin().await.unwrap();
            uow.acquire_serialization(key).await.unwrap();
            uow.acquire_serialization(key).await.unwrap();
            uow.upsert_if_absent(id, 0).await.unwrap();
            assert_eq!(store.active_locks(), 1);
        }

        assert_eq!(store.active_locks(), 0);
        assert!(!store.contains(&id));
    }

    #[tokio::test]
    async fn exhausted_sessions_report_resource_unavailable() {
        let store = InMemoryBalanceStore::with_sessions(1, Duration::from_millis(20));
        let _held = store.begin().await.unwrap();

        let err = store.begin().await.unwrap_err();
        assert!(err.is_retryable());
        let err = store.read_record(WalletId::new()).await.unwrap_err();
        assert!(matches!(err, StoreError::ResourceUnavailable(_)));
    }

    #[tokio::test]
    async fn closed_store_refuses_sessions() {
        let store = InMemoryBalanceStore::new();
        store.close();
        let err = store.begin().await.unwrap_err();
        assert_eq!(err, StoreError::ResourceUnavailable("session pool closed".to_string()));
    }
}

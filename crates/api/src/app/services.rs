//! Store selection and the service handle the routes call into.

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;

use wallet_core::{Amount, WalletId};
use wallet_infra::{
    BalanceLedger, BalanceStore, InMemoryBalanceStore, LedgerError, PostgresBalanceStore,
    db::PoolConfig,
};

use crate::config::AppConfig;

/// What the HTTP layer needs from the ledger, independent of the backing store.
#[async_trait]
pub trait WalletService: Send + Sync {
    /// Apply a wire-tagged operation and return the committed balance.
    async fn change_balance(
        &self,
        wallet_id: WalletId,
        operation: &str,
        amount: Amount,
    ) -> Result<i64, LedgerError>;

    async fn get_balance(&self, wallet_id: WalletId) -> Result<i64, LedgerError>;
}

#[async_trait]
impl<S> WalletService for BalanceLedger<S>
where
    S: BalanceStore + 'static,
{
    async fn change_balance(
        &self,
        wallet_id: WalletId,
        operation: &str,
        amount: Amount,
    ) -> Result<i64, LedgerError> {
        BalanceLedger::change_balance_tagged(self, wallet_id, operation, amount).await
    }

    async fn get_balance(&self, wallet_id: WalletId) -> Result<i64, LedgerError> {
        BalanceLedger::get_balance(self, wallet_id).await
    }
}

#[derive(Debug, Clone)]
enum StoreBackend {
    InMemory(InMemoryBalanceStore),
    Postgres(PostgresBalanceStore),
}

/// Wired ledger plus the store handle needed to shut it down.
#[derive(Clone)]
pub struct AppServices {
    wallets: Arc<dyn WalletService>,
    backend: StoreBackend,
}

impl std::fmt::Debug for AppServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppServices")
            .field("backend", &self.backend)
            .finish_non_exhaustive()
    }
}

impl AppServices {
    /// Ledger over the given in-memory store (dev/test).
    pub fn in_memory(store: InMemoryBalanceStore) -> Self {
        Self {
            wallets: Arc::new(BalanceLedger::new(store.clone())),
            backend: StoreBackend::InMemory(store),
        }
    }

    pub fn postgres(store: PostgresBalanceStore) -> Self {
        Self {
            wallets: Arc::new(BalanceLedger::new(store.clone())),
            backend: StoreBackend::Postgres(store),
        }
    }

    pub fn wallet_service(&self) -> Arc<dyn WalletService> {
        self.wallets.clone()
    }

    pub fn backend_name(&self) -> &'static str {
        match self.backend {
            StoreBackend::InMemory(_) => "in-memory",
            StoreBackend::Postgres(_) => "postgres",
        }
    }

    /// Stop accepting new units of work and release pooled resources.
    pub async fn shutdown(&self) {
        match &self.backend {
            StoreBackend::InMemory(store) => store.close(),
            StoreBackend::Postgres(store) => store.close().await,
        }
    }
}

/// Build services from configuration, connecting to Postgres unless the in-memory
/// store was requested.
pub async fn build_services(config: &AppConfig) -> anyhow::Result<AppServices> {
    if config.use_in_memory_store {
        tracing::warn!("USE_IN_MEMORY_STORE=true; balances will not survive a restart");
        return Ok(build_in_memory_services(&config.pool));
    }

    let url = config
        .database_url
        .as_deref()
        .context("DATABASE_URL must be set when the in-memory store is disabled")?;
    build_persistent_services(url, &config.pool).await
}

fn build_in_memory_services(pool: &PoolConfig) -> AppServices {
    let sessions = usize::try_from(pool.max_connections).unwrap_or(usize::MAX);
    AppServices::in_memory(InMemoryBalanceStore::with_sessions(
        sessions,
        pool.acquire_timeout,
    ))
}

async fn build_persistent_services(url: &str, pool: &PoolConfig) -> anyhow::Result<AppServices> {
    let pg = wallet_infra::db::connect(url, pool)
        .await
        .context("failed to connect to Postgres")?;
    let store = PostgresBalanceStore::new(pg);
    store
        .ensure_schema()
        .await
        .context("failed to prepare wallets table")?;

    tracing::info!(
        max_connections = pool.max_connections,
        min_connections = pool.min_connections,
        "connected to Postgres"
    );
    Ok(AppServices::postgres(store))
}

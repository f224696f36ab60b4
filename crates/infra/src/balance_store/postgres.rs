//! Postgres-backed balance store.
//!
//! One row per wallet in the `wallets` table. A unit of work is a database
//! transaction; the per-wallet serialization token is a transaction-scoped advisory
//! lock (`pg_advisory_xact_lock(int4, int4)`), released by Postgres on commit or
//! rollback.
//!
//! ## Error Mapping
//!
//! SQLx errors are mapped to `StoreError` as follows:
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError | Scenario |
//! |------------|----------------------|------------|----------|
//! | PoolTimedOut | N/A | `ResourceUnavailable` | All pooled connections busy for `acquire_timeout` |
//! | PoolClosed | N/A | `ResourceUnavailable` | Pool closed during shutdown |
//! | Database | `53300` too_many_connections | `ResourceUnavailable` | Server connection limit reached |
//! | Database | `57P03` cannot_connect_now | `ResourceUnavailable` | Server starting up / shutting down |
//! | Database | `23514` check_violation | `Constraint` | `balance >= 0` check refused a write |
//! | Database | `22003` numeric_value_out_of_range | `Constraint` | `balance + delta` overflowed BIGINT |
//! | Database (other) | Any other | `Backend` | Other database errors |
//! | Other | N/A | `Backend` | Network errors, protocol errors, decode errors |
//!
//! ## Thread Safety
//!
//! `PostgresBalanceStore` is `Send + Sync` and cheap to clone; the SQLx pool handles
//! connection management.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, Row, Transaction};
use tracing::instrument;

use wallet_core::{LockKey, WalletBalance, WalletId};

use super::r#trait::{BalanceStore, StoreError, UnitOfWork};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS wallets (
    id UUID PRIMARY KEY,
    balance BIGINT NOT NULL DEFAULT 0 CHECK (balance >= 0),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
)
"#;

/// Postgres-backed balance store.
#[derive(Debug, Clone)]
pub struct PostgresBalanceStore {
    pool: Arc<PgPool>,
}

impl PostgresBalanceStore {
    /// Create a new PostgresBalanceStore with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Create the `wallets` table if it does not exist.
    #[instrument(skip(self), err)]
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        Ok(())
    }

    /// Close the pool, waiting for checked-out connections to be returned.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl BalanceStore for PostgresBalanceStore {
    type UnitOfWork = PostgresUnitOfWork;

    #[instrument(level = "debug", skip_all, err)]
    async fn begin(&self) -> Result<Self::UnitOfWork, StoreError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        Ok(PostgresUnitOfWork { tx })
    }

    #[instrument(skip(self), fields(wallet_id = %wallet_id), err)]
    async fn read_record(&self, wallet_id: WalletId) -> Result<Option<WalletBalance>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, balance, updated_at
            FROM wallets
            WHERE id = $1
            "#,
        )
        .bind(wallet_id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("read_record", e))?;

        match row {
            Some(row) => {
                let wallet = WalletRow::from_row(&row)
                    .map_err(|e| StoreError::Backend(format!("failed to decode wallet row: {e}")))?;
                Ok(Some(wallet.into()))
            }
            None => Ok(None),
        }
    }
}

/// A Postgres transaction acting as a unit of work.
///
/// Dropping it without `commit` rolls the transaction back (SQLx issues the
/// `ROLLBACK` when the connection returns to the pool), which also releases any
/// advisory locks taken inside it.
pub struct PostgresUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

impl std::fmt::Debug for PostgresUnitOfWork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresUnitOfWork").finish_non_exhaustive()
    }
}

#[async_trait]
impl UnitOfWork for PostgresUnitOfWork {
    #[instrument(
        level = "debug",
        skip_all,
        fields(key_high = key.high, key_low = key.low),
        err
    )]
    async fn acquire_serialization(&mut self, key: LockKey) -> Result<(), StoreError> {
        sqlx::query("SELECT pg_advisory_xact_lock($1, $2)")
            .bind(key.high)
            .bind(key.low)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("acquire_serialization", e))?;
        Ok(())
    }

    #[instrument(level = "debug", skip_all, fields(wallet_id = %wallet_id), err)]
    async fn upsert_if_absent(
        &mut self,
        wallet_id: WalletId,
        initial_balance: i64,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO wallets (id, balance)
            VALUES ($1, $2)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(wallet_id.as_uuid())
        .bind(initial_balance)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("upsert_if_absent", e))?;
        Ok(())
    }

    #[instrument(
        level = "debug",
        skip_all,
        fields(wallet_id = %wallet_id, delta = delta, floor = floor),
        err
    )]
    async fn conditional_add(
        &mut self,
        wallet_id: WalletId,
        delta: i64,
        floor: i64,
    ) -> Result<Option<i64>, StoreError> {
        let row = sqlx::query(
            r#"
            UPDATE wallets
            SET balance = balance + $2, updated_at = now()
            WHERE id = $1 AND balance + $2 >= $3
            RETURNING balance
            "#,
        )
        .bind(wallet_id.as_uuid())
        .bind(delta)
        .bind(floor)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("conditional_add", e))?;

        row.map(|row| row.try_get::<i64, _>("balance"))
            .transpose()
            .map_err(|e| StoreError::Backend(format!("failed to read balance: {e}")))
    }

    #[instrument(level = "debug", skip_all, err)]
    async fn commit(self) -> Result<(), StoreError> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    #[instrument(level = "debug", skip_all, err)]
    async fn rollback(self) -> Result<(), StoreError> {
        self.tx
            .rollback()
            .await
            .map_err(|e| map_sqlx_error("rollback", e))
    }
}

/// Map SQLx errors to StoreError.
pub(crate) fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::PoolTimedOut => StoreError::ResourceUnavailable(format!(
            "timed out acquiring a connection in {operation}"
        )),
        sqlx::Error::PoolClosed => {
            StoreError::ResourceUnavailable(format!("connection pool closed in {operation}"))
        }
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("53300") | Some("57P03") => StoreError::ResourceUnavailable(msg),
                Some("23514") | Some("22003") => StoreError::Constraint(msg),
                _ => StoreError::Backend(msg),
            }
        }
        _ => StoreError::Backend(format!("sqlx error in {}: {}", operation, err)),
    }
}

// SQLx row types

#[derive(Debug)]
struct WalletRow {
    id: uuid::Uuid,
    balance: i64,
    updated_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for WalletRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(WalletRow {
            id: row.try_get("id")?,
            balance: row.try_get("balance")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl From<WalletRow> for WalletBalance {
    fn from(row: WalletRow) -> Self {
        WalletBalance {
            id: WalletId::from_uuid(row.id),
            balance: row.balance,
            updated_at: row.updated_at,
        }
    }
}

//! Infrastructure layer: balance stores, connection pool, and the ledger that runs
//! the balance mutation protocol over them.

pub mod balance_store;
pub mod db;
pub mod ledger;


pub use balance_store::{
    BalanceStore, InMemoryBalanceStore, PostgresBalanceStore, StoreError, UnitOfWork,
};
pub use ledger::{BalanceLedger, LedgerError};

//! Transactional balance store boundary.
//!
//! This module defines the storage abstraction the ledger runs against (units of
//! work, advisory serialization, conditional updates) and its two implementations.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::{InMemoryBalanceStore, InMemoryUnitOfWork};
pub use postgres::{PostgresBalanceStore, PostgresUnitOfWork};
pub use r#trait::{BalanceStore, StoreError, UnitOfWork};

//! `wallet-core` — domain building blocks for the balance ledger.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod amount;
pub mod error;
pub mod id;
pub mod lock_key;
pub mod operation;
pub mod wallet;

pub use amount::Amount;
pub use error::{DomainError, DomainResult};
pub use id::WalletId;
pub use lock_key::LockKey;
pub use operation::OperationType;
pub use wallet::WalletBalance;

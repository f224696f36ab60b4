//! Committed wallet balance record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::WalletId;

/// One wallet row as committed by the store.
///
/// `balance >= 0` holds for every committed record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletBalance {
    pub id: WalletId,
    pub balance: i64,
    /// Time of the last successful mutation (informational only).
    pub updated_at: DateTime<Utc>,
}

impl WalletBalance {
    /// A freshly materialized record with zero balance.
    pub fn opened(id: WalletId, at: DateTime<Utc>) -> Self {
        Self {
            id,
            balance: 0,
            updated_at: at,
        }
    }
}

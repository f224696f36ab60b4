//! Advisory-lock key derivation.
//!
//! Advisory lock primitives (e.g. `pg_advisory_xact_lock(int4, int4)`) accept a pair of
//! 32-bit integers, narrower than a 128-bit wallet id. The id is split into its two
//! 64-bit halves and each half is folded into an `i32` by xor-ing its 32-bit words, so
//! every bit of the id contributes to the key.
//!
//! Collisions are tolerated: two wallets sharing a key serialize against each other,
//! which is safe but slower.

use crate::id::WalletId;

/// Composite advisory-lock key derived from a [`WalletId`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LockKey {
    pub high: i32,
    pub low: i32,
}

impl LockKey {
    /// Deterministic key for a wallet.
    pub fn for_wallet(wallet_id: &WalletId) -> Self {
        let bytes = wallet_id.as_bytes();
        let (hi, lo) = bytes.split_at(8);
        Self {
            high: fold_half(hi),
            low: fold_half(lo),
        }
    }
}

impl From<&WalletId> for LockKey {
    fn from(value: &WalletId) -> Self {
        Self::for_wallet(value)
    }
}

fn fold_half(half: &[u8]) -> i32 {
    let word = |chunk: &[u8]| u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
    (word(&half[0..4]) ^ word(&half[4..8])) as i32
}

use serde::{Deserialize, Serialize};

use wallet_core::WalletId;

// -------------------------
// Request DTOs
// -------------------------

/// Body of `POST /api/v1/wallet`.
///
/// `valletId` is accepted as an alias of `walletId`; older clients still send it.
/// The operation and amount stay raw here so the handler can report each problem
/// with its own error code.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeBalanceRequest {
    #[serde(alias = "valletId")]
    pub wallet_id: String,
    pub operation_type: String,
    pub amount: i64,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceResponse {
    pub wallet_id: WalletId,
    pub balance: i64,
}

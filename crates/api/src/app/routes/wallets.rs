use std::future::Future;

use axum::{
    Json,
    extract::{Extension, Path, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};

use wallet_core::{Amount, WalletId};
use wallet_infra::LedgerError;

use crate::app::{AppState, dto, errors};

pub async fn change_balance(
    Extension(state): Extension<AppState>,
    body: Result<Json<dto::ChangeBalanceRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => {
            return errors::json_error(
                StatusCode::BAD_REQUEST,
                "invalid_json",
                rejection.body_text(),
            );
        }
    };

    let wallet_id = match parse_wallet_id(&body.wallet_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let amount = match Amount::new(body.amount) {
        Ok(amount) => amount,
        Err(e) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_amount", e.to_string());
        }
    };

    let call = state
        .wallets
        .change_balance(wallet_id, &body.operation_type, amount);
    match with_timeout(&state, call).await {
        Ok(balance) => (
            StatusCode::OK,
            Json(dto::BalanceResponse { wallet_id, balance }),
        )
            .into_response(),
        Err(resp) => resp,
    }
}

pub async fn get_balance(
    Extension(state): Extension<AppState>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let wallet_id = match parse_wallet_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match with_timeout(&state, state.wallets.get_balance(wallet_id)).await {
        Ok(balance) => Json(dto::BalanceResponse { wallet_id, balance }).into_response(),
        Err(resp) => resp,
    }
}

fn parse_wallet_id(raw: &str) -> Result<WalletId, axum::response::Response> {
    raw.parse::<WalletId>().map_err(|e| {
        errors::json_error(StatusCode::BAD_REQUEST, "invalid_wallet_id", e.to_string())
    })
}

/// Run a ledger call under the request deadline. On expiry the call's future is
/// dropped, which rolls back its unit of work.
async fn with_timeout<T>(
    state: &AppState,
    call: impl Future<Output = Result<T, LedgerError>>,
) -> Result<T, axum::response::Response> {
    match tokio::time::timeout(state.request_timeout, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(errors::ledger_error_to_response(e)),
        Err(_) => {
            tracing::warn!(timeout = ?state.request_timeout, "ledger call timed out");
            Err(errors::timeout_response())
        }
    }
}

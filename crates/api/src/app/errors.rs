use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use wallet_infra::LedgerError;

pub fn ledger_error_to_response(err: LedgerError) -> axum::response::Response {
    match err {
        LedgerError::InvalidOperation(op) => json_error(
            StatusCode::BAD_REQUEST,
            "invalid_operation",
            format!("operationType must be one of: DEPOSIT, WITHDRAW (got {op:?})"),
        ),
        LedgerError::InsufficientFunds(_) => json_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "insufficient_funds",
            "insufficient funds",
        ),
        LedgerError::ResourceUnavailable(msg) => {
            tracing::warn!(error = %msg, "ledger unavailable");
            json_error(
                StatusCode::SERVICE_UNAVAILABLE,
                "resource_unavailable",
                "service temporarily unavailable, retry later",
            )
        }
        LedgerError::StoreFailure(e) => {
            tracing::error!(error = %e, "store failure");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "store_error",
                "internal server error",
            )
        }
    }
}

pub fn timeout_response() -> axum::response::Response {
    json_error(
        StatusCode::SERVICE_UNAVAILABLE,
        "timeout",
        "request timed out, retry later",
    )
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

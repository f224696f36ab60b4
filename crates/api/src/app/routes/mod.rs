use axum::{
    Router,
    routing::{get, post},
};

pub mod system;
pub mod wallets;

/// Router for the versioned wallet endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/wallet", post(wallets::change_balance))
        .route("/wallets/:id", get(wallets::get_balance))
}

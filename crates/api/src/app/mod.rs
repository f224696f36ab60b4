//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: store selection and the ledger handle
//! - `routes/`: HTTP routes + handlers
//! - `dto.rs`: request/response DTOs
//! - `errors.rs`: consistent error responses

use std::sync::Arc;
use std::time::Duration;

use axum::{Extension, Router, routing::get};
use tower::ServiceBuilder;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

use services::WalletService;

/// Per-request state shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub wallets: Arc<dyn WalletService>,
    /// Bound on one ledger call; expiry drops the call, which rolls it back.
    pub request_timeout: Duration,
}

impl AppState {
    pub fn new(wallets: Arc<dyn WalletService>, request_timeout: Duration) -> Self {
        Self {
            wallets,
            request_timeout,
        }
    }
}

/// Build the full HTTP router (public entrypoint used by `main.rs` and the tests).
pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::system::health))
        .nest("/api/v1", routes::router())
        .layer(ServiceBuilder::new().layer(Extension(state)))
}

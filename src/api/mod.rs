//! API module for all HTTP handlers

pub mod error;
pub mod handlers;
pub mod webhook;

use axum::{Router, routing};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;

use crate::SharedState;

// Re-export handlers
pub use error::ApiError;
pub use handlers::{health, not_found, root};
pub use webhook::handle_webhook;

/// Builds the application router. Wrong methods on known paths are 404s,
/// same as unknown paths.
pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", routing::get(root).fallback(not_found))
        .route("/health", routing::get(health).fallback(not_found))
        .route("/webhook", routing::post(handle_webhook).fallback(not_found))
        .fallback(not_found)
        .layer(CatchPanicLayer::custom(error::handle_panic))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

//! Route definitions

use axum::{
    Router,
    routing::{get, post},
};

use crate::handlers::{health, send_message};
use crate::server::AppState;

/// Create the API router
pub fn routes() -> Router<AppState> {
    Router::new()
        // Health check
        .route("/health", get(health))
        // Outbound message
        .route("/send", post(send_message))
}

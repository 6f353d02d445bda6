//! wa-api: HTTP API for wa-relay
//!
//! `POST /send` relays a text message through the WhatsApp session,
//! `GET /health` reports whether the session is connected.
//! Built with axum for async HTTP handling.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod server;

pub use error::{ApiError, Result};
pub use server::{AppState, app, start_server};

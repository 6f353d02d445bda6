//! HTTP API Server
//!
//! Starts and manages the axum-based HTTP server.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use wa_core::SessionClient;

use crate::routes::routes;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub client: Arc<SessionClient>,
}

/// Build the router with middleware and state
pub fn app(client: Arc<SessionClient>) -> Router {
    Router::new()
        .merge(routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(AppState { client })
}

/// Start the HTTP API server and serve until `shutdown` resolves
pub async fn start_server<F>(port: u16, client: Arc<SessionClient>, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("WhatsApp relay running on port {}", port);

    axum::serve(listener, app(client))
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}

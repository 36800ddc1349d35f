//! HTTP status server: `/health` (JSON snapshot) and `/metrics` (Prometheus).
//!
//! Runs on its own tokio task and stops with the shutdown broadcast.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::relay::Relay;
use crate::status::StatusSnapshot;

/// Handler for GET /metrics - returns Prometheus metrics in text format.
async fn metrics_handler() -> String {
    crate::metrics::gather_metrics()
}

async fn health_handler(State(relay): State<Arc<Relay>>) -> Json<StatusSnapshot> {
    Json(relay.status())
}

pub fn router(relay: Arc<Relay>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(relay)
}

/// Serve the status endpoints on `addr` until shutdown.
pub async fn run_http_server(
    addr: SocketAddr,
    relay: Arc<Relay>,
    mut shutdown: broadcast::Receiver<()>,
) {
    let listener = match TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(%addr, error = %e, "Failed to bind status server");
            return;
        }
    };
    tracing::info!(%addr, "Status server listening");

    let serve = axum::serve(listener, router(relay)).with_graceful_shutdown(async move {
        let _ = shutdown.recv().await;
    });
    if let Err(e) = serve.await {
        tracing::error!(error = %e, "Status server error");
    }
}

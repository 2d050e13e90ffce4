//! Router assembly and the listening loop.
//!
//! Bind a `TcpListener`, serve with `into_make_service_with_connect_info`,
//! and await a shutdown signal before returning. The signal is the
//! orchestrator's own `CancellationToken` (top-down cancellation rather
//! than Ctrl-C/SIGTERM), and the wait is itself bounded to the 5 s grace
//! period instead of running unbounded.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tokio_util::sync::CancellationToken;
use tower_http::timeout::TimeoutLayer;

use crate::handler::{handle_webhook, health};
use crate::state::WebhookServerState;

/// Overall per-request timeout standing in for the combined read/write
/// budget; axum has no separate socket-level read/write timeouts to
/// bind those independently (see `DESIGN.md`).
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const GRACEFUL_SHUTDOWN: Duration = Duration::from_secs(5);

pub fn build_router(state: Arc<WebhookServerState>) -> Router {
    Router::new()
        .route("/webhook/{external_id}", post(handle_webhook))
        .route("/health", get(health))
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .with_state(state)
}

/// Binds `addr` and serves until `cancel` fires, then waits up to
/// [`GRACEFUL_SHUTDOWN`] for in-flight requests to drain.
pub async fn serve(addr: SocketAddr, state: Arc<WebhookServerState>, cancel: CancellationToken) -> std::io::Result<()> {
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "webhook ingress listening");

    let shutdown_trigger = cancel.clone();
    let server = axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(async move { shutdown_trigger.cancelled().await });
    let handle = tokio::spawn(server);

    cancel.cancelled().await;
    match tokio::time::timeout(GRACEFUL_SHUTDOWN, handle).await {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(err))) => tracing::error!(%err, "webhook server error"),
        Ok(Err(err)) => tracing::error!(%err, "webhook server task panicked"),
        Err(_) => tracing::warn!("webhook server did not stop within the graceful shutdown grace period"),
    }
    tracing::info!("webhook ingress stopped");
    Ok(())
}

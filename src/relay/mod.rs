//! WebSocket Relay Server
//!
//! Serves `/ws` for live notification clients. A connection is admitted only
//! with a valid bearer token, gets a [`crate::hub::ChannelSink`] registered
//! with the hub, and from then on receives every broadcast as a UTF-8 text
//! frame until it disconnects, goes silent, or falls too far behind.

mod handler;

use axum::extract::State;
use axum::http::StatusCode;
use axum::middleware;
use axum::routing::get;
use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;

use crate::auth::JwtService;
use crate::hub::HubHandle;
use crate::metrics;

/// Relay server configuration
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub host: String,
    pub port: u16,
    /// Outbound queue capacity per client; a client this many frames behind
    /// is dropped
    pub send_buffer: usize,
    /// How often the write path probes the client with a ping
    pub ping_interval: Duration,
    /// How long the read path waits for any inbound frame (pong included)
    /// before declaring the client dead
    pub read_deadline: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8081,
            send_buffer: 256,
            ping_interval: Duration::from_secs(45),
            read_deadline: Duration::from_secs(60),
        }
    }
}

impl RelayConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Shared state for relay handlers
pub struct RelayState {
    pub hub: HubHandle,
    pub jwt: JwtService,
    pub config: RelayConfig,
}

/// Build the relay router.
pub fn build_router(state: RelayState) -> Router {
    let shared = Arc::new(state);

    Router::new()
        .route("/ws", get(handler::websocket_handler))
        .route("/metrics", get(metrics::metrics_handler))
        .route("/health/live", get(liveness))
        .route("/health/ready", get(readiness))
        .layer(middleware::from_fn(metrics::record_request))
        .layer(TraceLayer::new_for_http())
        .with_state(shared)
}

/// Start the relay server with graceful shutdown.
pub async fn serve(state: RelayState, config: &RelayConfig) -> std::io::Result<()> {
    let addr = config.addr();
    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("relay listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(crate::api::shutdown_signal())
        .await?;

    tracing::info!("relay shut down gracefully");
    Ok(())
}

async fn liveness() -> StatusCode {
    StatusCode::OK
}

async fn readiness(State(state): State<Arc<RelayState>>) -> StatusCode {
    // Serves as a round trip through the hub task.
    let _ = state.hub.client_count().await;
    StatusCode::OK
}

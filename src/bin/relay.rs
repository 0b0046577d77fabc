//! Cakehub Relay Server
//!
//! Run with: cargo run --bin cakehub-relay
//!
//! # Configuration
//!
//! Environment variables:
//! - `CAKEHUB_RELAY_HOST`: Host to bind to (default: 0.0.0.0)
//! - `CAKEHUB_RELAY_PORT`: Port to listen on (default: 8081)
//! - `CAKEHUB_JWT_SECRET`: HMAC secret for tokens (required)
//! - `KAFKA_BROKERS`: Broker list to consume from (default: localhost:9092)
//! - `CAKEHUB_EVENTS_TOPIC`: Notification topic (default: default)
//! - `CAKEHUB_GROUP_ID`: Consumer group (default: cakehub-relay)
//! - `CAKEHUB_BRIDGE_MAX_RETRIES`: Broker reconnect attempts (default: 10)
//! - `CAKEHUB_WS_SEND_BUFFER`: Frames buffered per client (default: 256)
//! - `CAKEHUB_PING_INTERVAL_SECS`: Liveness probe interval (default: 45)
//! - `CAKEHUB_READ_DEADLINE_SECS`: Inbound silence tolerated (default: 60)
//! - `CAKEHUB_HEARTBEAT_SECS`: Heartbeat broadcast interval, 0 disables
//!   (default: 30)
//! - `RUST_LOG`: Log level (default: info)

use anyhow::{anyhow, Context};
use cakehub::auth::JwtService;
use cakehub::bridge::{BridgeConfig, QueueBridge};
use cakehub::heartbeat::Heartbeat;
use cakehub::hub::Hub;
use cakehub::relay::{self, RelayConfig, RelayState};
use std::time::Duration;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cakehub=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting cakehub relay v{}", env!("CARGO_PKG_VERSION"));

    let relay_config = load_relay_config();
    let bridge_config = load_bridge_config();
    let heartbeat_interval = load_heartbeat_interval();
    let jwt = load_jwt_service()?;

    let (hub, handle) = Hub::new();
    let hub_task = tokio::spawn(hub.run());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let bridge = QueueBridge::new(bridge_config, handle.clone(), shutdown_rx.clone());
    let mut bridge_task = tokio::spawn(bridge.run());

    let heartbeat_task = heartbeat_interval.map(|interval| {
        tracing::info!(secs = interval.as_secs(), "heartbeat enabled");
        let beat = Heartbeat::new(interval, handle.clone(), shutdown_rx.clone());
        tokio::spawn(beat.run())
    });

    let state = RelayState {
        hub: handle.clone(),
        jwt,
        config: relay_config.clone(),
    };

    let server = relay::serve(state, &relay_config);
    tokio::pin!(server);

    // A dead bridge leaves the hub permanently silent, so it takes the
    // process down with it and lets supervision restart us.
    tokio::select! {
        result = &mut server => result?,
        result = &mut bridge_task => {
            let error = match result {
                Ok(Err(e)) => anyhow!(e),
                Ok(Ok(())) => anyhow!("bridge stopped unexpectedly"),
                Err(e) => anyhow!(e),
            };
            tracing::error!(error = %error, "bridge died, shutting down");
            shutdown_tx.send_replace(true);
            return Err(error);
        }
    }

    // Normal shutdown: stop the producers, then let the hub close every
    // remaining client.
    shutdown_tx.send_replace(true);
    if let Ok(Err(e)) = bridge_task.await {
        tracing::warn!(error = %e, "bridge ended with error during shutdown");
    }
    if let Some(task) = heartbeat_task {
        task.await?;
    }
    drop(handle);
    hub_task.await?;

    tracing::info!("cakehub relay stopped");
    Ok(())
}

/// Load relay server configuration from environment
fn load_relay_config() -> RelayConfig {
    let defaults = RelayConfig::default();

    let host = std::env::var("CAKEHUB_RELAY_HOST").unwrap_or(defaults.host);

    let port = std::env::var("CAKEHUB_RELAY_PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(defaults.port);

    let send_buffer = std::env::var("CAKEHUB_WS_SEND_BUFFER")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(defaults.send_buffer);

    let ping_interval = std::env::var("CAKEHUB_PING_INTERVAL_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .map(Duration::from_secs)
        .unwrap_or(defaults.ping_interval);

    let read_deadline = std::env::var("CAKEHUB_READ_DEADLINE_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .map(Duration::from_secs)
        .unwrap_or(defaults.read_deadline);

    RelayConfig {
        host,
        port,
        send_buffer,
        ping_interval,
        read_deadline,
    }
}

/// Load bridge configuration from environment
fn load_bridge_config() -> BridgeConfig {
    let defaults = BridgeConfig::default();

    let brokers = std::env::var("KAFKA_BROKERS").unwrap_or(defaults.brokers);

    let topic = std::env::var("CAKEHUB_EVENTS_TOPIC").unwrap_or(defaults.topic);

    let group_id = std::env::var("CAKEHUB_GROUP_ID").unwrap_or(defaults.group_id);

    let max_retries = std::env::var("CAKEHUB_BRIDGE_MAX_RETRIES")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(defaults.max_retries);

    BridgeConfig {
        brokers,
        topic,
        group_id,
        max_retries,
        base_backoff: defaults.base_backoff,
    }
}

/// Heartbeat interval; `None` disables the producer
fn load_heartbeat_interval() -> Option<Duration> {
    let secs: u64 = std::env::var("CAKEHUB_HEARTBEAT_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(30);

    (secs > 0).then(|| Duration::from_secs(secs))
}

/// Build the token service from environment
fn load_jwt_service() -> anyhow::Result<JwtService> {
    let secret =
        std::env::var("CAKEHUB_JWT_SECRET").context("CAKEHUB_JWT_SECRET must be set")?;

    let ttl_hours = std::env::var("CAKEHUB_JWT_TTL_HOURS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(72);

    Ok(JwtService::new(&secret, ttl_hours))
}

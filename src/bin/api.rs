//! Cakehub API Server
//!
//! Run with: cargo run --bin cakehub-api
//!
//! # Configuration
//!
//! Environment variables:
//! - `CAKEHUB_API_HOST`: Host to bind to (default: 0.0.0.0)
//! - `CAKEHUB_API_PORT`: Port to listen on (default: 8080)
//! - `CAKEHUB_JWT_SECRET`: HMAC secret for tokens (required)
//! - `CAKEHUB_JWT_TTL_HOURS`: Token lifetime (default: 72)
//! - `KAFKA_BROKERS`: Broker list for notifications (default: localhost:9092)
//! - `CAKEHUB_EVENTS_TOPIC`: Notification topic (default: default)
//! - `CAKE_ADMIN_EMAIL` / `CAKE_ADMIN_PASSWORD`: Seed a superadmin (optional)
//! - `RUST_LOG`: Log level (default: info)

use anyhow::Context;
use cakehub::api::{self, ApiConfig, AppState};
use cakehub::auth::{JwtService, PasswordHasher};
use cakehub::notify::{EventPublisher, Notifier, NotifyConfig};
use cakehub::users::{Role, User, UserStore};
use std::sync::Arc;
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

    tracing::info!("Starting cakehub API server v{}", env!("CARGO_PKG_VERSION"));

    let api_config = load_api_config();
    let notify_config = load_notify_config();
    let jwt = load_jwt_service()?;

    let store = Arc::new(UserStore::new());
    seed_superadmin(&store).await?;

    let (notifier, events) = Notifier::channel();
    let publisher =
        EventPublisher::new(&notify_config, events).context("failed to create event publisher")?;
    let publisher_task = tokio::spawn(publisher.run());

    let state = AppState::new(store, jwt, notifier, api_config.clone());
    api::serve(state, &api_config).await?;

    // The server dropped its notifier with the router; the publisher drains
    // whatever is still queued and stops.
    publisher_task.await?;

    tracing::info!("cakehub API server stopped");
    Ok(())
}

/// Load API configuration from environment
fn load_api_config() -> ApiConfig {
    let host = std::env::var("CAKEHUB_API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

    let port = std::env::var("CAKEHUB_API_PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(8080);

    ApiConfig { host, port }
}

/// Load notification publisher configuration from environment
fn load_notify_config() -> NotifyConfig {
    let brokers = std::env::var("KAFKA_BROKERS").unwrap_or_else(|_| "localhost:9092".to_string());

    let topic = std::env::var("CAKEHUB_EVENTS_TOPIC").unwrap_or_else(|_| "default".to_string());

    NotifyConfig { brokers, topic }
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

/// Seed a superadmin account when the admin credential pair is configured
async fn seed_superadmin(store: &UserStore) -> anyhow::Result<()> {
    let (Ok(email), Ok(password)) = (
        std::env::var("CAKE_ADMIN_EMAIL"),
        std::env::var("CAKE_ADMIN_PASSWORD"),
    ) else {
        tracing::info!("no superadmin configured (set CAKE_ADMIN_EMAIL and CAKE_ADMIN_PASSWORD)");
        return Ok(());
    };

    let password_hash = PasswordHasher::new().hash(&password)?;
    store
        .add(User {
            email: email.clone(),
            password_hash,
            role: Role::Superadmin,
            favorite_cake: "supercake".to_string(),
        })
        .await?;

    tracing::info!(email = %email, "superadmin seeded");
    Ok(())
}

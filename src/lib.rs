//! # Cakehub
//!
//! User accounts over HTTP with a live account-event feed over WebSocket.
//!
//! Two binaries share this crate:
//!
//! - **cakehub-api**: registration, JWT login, profile and ban management.
//!   Every account-lifecycle change publishes a one-line notification to a
//!   broker topic.
//! - **cakehub-relay**: consumes that topic and fans each payload out to all
//!   connected WebSocket clients through the broadcast [`hub`].
//!
//! ## Modules
//!
//! - [`hub`]: broadcast router and client sinks (the core)
//! - [`relay`]: WebSocket server in front of the hub
//! - [`bridge`]: broker consumer feeding the hub
//! - [`heartbeat`]: interval producer feeding the hub
//! - [`api`]: REST API server with Axum
//! - [`users`]: accounts, validation, ban history
//! - [`auth`]: JWT and password hashing
//! - [`notify`]: account-event publisher
//!
//! ## Delivery model
//!
//! Best-effort, at-most-once: the hub never blocks on a slow client, it
//! drops it. Clients are expected to detect a dead feed through missing
//! heartbeats and reconnect.

pub mod api;
pub mod auth;
pub mod bridge;
pub mod heartbeat;
pub mod hub;
pub mod metrics;
pub mod notify;
pub mod relay;
pub mod users;

// Re-export top-level types for convenience
pub use api::{build_router, serve, ApiConfig, ApiError, AppState};

pub use auth::{AuthError, Claims, JwtService, PasswordHasher};

pub use bridge::{BridgeConfig, BridgeError, QueueBridge};

pub use heartbeat::Heartbeat;

pub use hub::{ChannelSink, ClientSink, EnqueueError, Hub, HubHandle, Outbound, SinkId};

pub use notify::{EventPublisher, Notifier, NotifyConfig};

pub use relay::{RelayConfig, RelayState};

pub use users::{BanRecord, Role, StoreError, User, UserStore, ValidationError};

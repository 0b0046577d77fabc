//! Application State
//!
//! Shared state accessible by all API handlers.
//! Wrapped in Arc for thread-safe sharing across async tasks.

use std::sync::Arc;
use std::time::Instant;

use crate::auth::{JwtService, PasswordHasher};
use crate::notify::Notifier;
use crate::users::UserStore;

/// Shared application state for all handlers
#[derive(Clone)]
pub struct AppState {
    /// Account repository
    pub store: Arc<UserStore>,
    /// Token issuing and validation
    pub jwt: JwtService,
    /// Password hashing
    pub hasher: PasswordHasher,
    /// Account-event notification channel
    pub notifier: Notifier,
    /// API configuration
    pub config: Arc<ApiConfig>,
    /// Server start time for uptime tracking
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        store: Arc<UserStore>,
        jwt: JwtService,
        notifier: Notifier,
        config: ApiConfig,
    ) -> Self {
        Self {
            store,
            jwt,
            hasher: PasswordHasher::new(),
            notifier,
            config: Arc::new(config),
            start_time: Instant::now(),
        }
    }

    /// Get server uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl ApiConfig {
    /// Get the socket address string
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

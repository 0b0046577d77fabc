//! Authentication
//!
//! JWT issuing/validation and Argon2id password hashing. The relay and the
//! API share the same token scheme: a token issued by `/user/jwt` is what
//! admits a WebSocket client.

mod jwt;
mod password;

pub use jwt::{Claims, JwtService};
pub use password::PasswordHasher;

use thiserror::Error;

/// Authentication layer errors
#[derive(Debug, Error)]
pub enum AuthError {
    /// Token missing, malformed, expired, or signed with another key
    #[error("unauthorized")]
    InvalidToken,

    /// Token could not be created
    #[error("failed to sign token: {0}")]
    TokenCreation(#[source] jsonwebtoken::errors::Error),

    /// Password hashing or verification failed internally
    #[error("password hashing failed: {0}")]
    Hashing(String),
}

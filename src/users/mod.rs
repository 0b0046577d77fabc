//! User Accounts
//!
//! Account records, role ordering, ban history, validation rules, and the
//! in-memory repository backing the API.

mod store;
mod validate;

pub use store::{StoreError, UserStore};
pub use validate::{validate_cake, validate_email, validate_password, ValidationError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Account privilege level. Ordering matters: an actor may only act on
/// accounts with a strictly lower role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
    Superadmin,
}

/// One stored account
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub email: String,
    /// Argon2id PHC string
    pub password_hash: String,
    pub role: Role,
    pub favorite_cake: String,
}

/// One entry in an account's ban history.
///
/// The account is currently banned iff its latest record has no
/// `unbanned_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BanRecord {
    pub banned_at: DateTime<Utc>,
    pub banned_by: String,
    pub reason: String,
    pub unbanned_at: Option<DateTime<Utc>>,
    pub unbanned_by: Option<String>,
}

impl BanRecord {
    fn open(banned_by: &str, reason: &str) -> Self {
        Self {
            banned_at: Utc::now(),
            banned_by: banned_by.to_string(),
            reason: reason.to_string(),
            unbanned_at: None,
            unbanned_by: None,
        }
    }

    /// True while the ban has not been lifted
    pub fn is_active(&self) -> bool {
        self.unbanned_at.is_none()
    }
}

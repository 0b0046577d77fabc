//! In-memory user repository.
//!
//! Accounts keyed by email, per-account ban history, and the set of revoked
//! tokens. All access goes through one async RwLock; handlers hold it only
//! for the duration of a single operation.

use std::collections::{HashMap, HashSet};
use thiserror::Error;
use tokio::sync::RwLock;

use super::{BanRecord, User};

/// Repository errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("user with this email is already registered")]
    AlreadyRegistered,

    #[error("there is no such user")]
    NotFound,

    #[error("user is already banned")]
    AlreadyBanned,

    #[error("user is not banned")]
    NotBanned,

    #[error("user has no ban history")]
    HistoryEmpty,

    #[error("user is banned: {reason} (by {banned_by})")]
    Banned { reason: String, banned_by: String },

    #[error("token has been revoked")]
    TokenRevoked,
}

#[derive(Default)]
struct Inner {
    users: HashMap<String, User>,
    ban_history: HashMap<String, Vec<BanRecord>>,
    revoked_tokens: HashSet<String>,
}

/// Thread-safe in-memory account storage
#[derive(Default)]
pub struct UserStore {
    inner: RwLock<Inner>,
}

impl UserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new account; the email must not be taken.
    pub async fn add(&self, user: User) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if inner.users.contains_key(&user.email) {
            return Err(StoreError::AlreadyRegistered);
        }
        inner.users.insert(user.email.clone(), user);
        Ok(())
    }

    pub async fn get(&self, email: &str) -> Result<User, StoreError> {
        let inner = self.inner.read().await;
        inner.users.get(email).cloned().ok_or(StoreError::NotFound)
    }

    /// Replace an existing account record, keyed by `user.email`.
    pub async fn update(&self, user: User) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if !inner.users.contains_key(&user.email) {
            return Err(StoreError::NotFound);
        }
        inner.users.insert(user.email.clone(), user);
        Ok(())
    }

    /// Re-key an account under a new email, atomically.
    pub async fn change_email(&self, old: &str, new: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if inner.users.contains_key(new) {
            return Err(StoreError::AlreadyRegistered);
        }
        let mut user = inner.users.remove(old).ok_or(StoreError::NotFound)?;
        user.email = new.to_string();
        inner.users.insert(new.to_string(), user);
        Ok(())
    }

    /// Mark a token as no longer acceptable. Idempotent.
    pub async fn revoke_token(&self, token: &str) {
        let mut inner = self.inner.write().await;
        inner.revoked_tokens.insert(token.to_string());
    }

    pub async fn ensure_token_valid(&self, token: &str) -> Result<(), StoreError> {
        let inner = self.inner.read().await;
        if inner.revoked_tokens.contains(token) {
            return Err(StoreError::TokenRevoked);
        }
        Ok(())
    }

    /// Fail with the active ban's details if the account is banned.
    pub async fn ensure_not_banned(&self, email: &str) -> Result<(), StoreError> {
        let inner = self.inner.read().await;
        match inner.ban_history.get(email).and_then(|h| h.last()) {
            Some(last) if last.is_active() => Err(StoreError::Banned {
                reason: last.reason.clone(),
                banned_by: last.banned_by.clone(),
            }),
            _ => Ok(()),
        }
    }

    /// Open a new ban record; fails if one is already active.
    pub async fn ban(&self, email: &str, by: &str, reason: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let history = inner.ban_history.entry(email.to_string()).or_default();
        if history.last().is_some_and(BanRecord::is_active) {
            return Err(StoreError::AlreadyBanned);
        }
        history.push(BanRecord::open(by, reason));
        Ok(())
    }

    /// Close the active ban record; fails if there is none.
    pub async fn unban(&self, email: &str, by: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let history = inner
            .ban_history
            .get_mut(email)
            .ok_or(StoreError::HistoryEmpty)?;

        match history.last_mut() {
            Some(last) if last.is_active() => {
                last.unbanned_at = Some(chrono::Utc::now());
                last.unbanned_by = Some(by.to_string());
                Ok(())
            }
            _ => Err(StoreError::NotBanned),
        }
    }

    pub async fn ban_history(&self, email: &str) -> Result<Vec<BanRecord>, StoreError> {
        let inner = self.inner.read().await;
        inner
            .ban_history
            .get(email)
            .filter(|h| !h.is_empty())
            .cloned()
            .ok_or(StoreError::HistoryEmpty)
    }
}

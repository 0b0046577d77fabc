//! `AuthUser` extractor — pulls the bearer token from the Authorization
//! header, validates it, and loads the acting account.
//!
//! Checks run in a fixed order: token signature/expiry, active ban,
//! token revocation, account lookup. Every failure is a 401.

use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts};
use std::sync::Arc;

use super::error::ApiError;
use super::state::AppState;
use crate::users::User;

/// Extracted authenticated account available in handlers.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: User,
    /// The exact token presented, kept so handlers can revoke it
    pub token: String,
}

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(ApiError::Unauthorized)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(ApiError::Unauthorized)?;

        let claims = state.jwt.verify(token)?;

        state.store.ensure_not_banned(&claims.sub).await?;
        state.store.ensure_token_valid(token).await?;

        let user = state
            .store
            .get(&claims.sub)
            .await
            .map_err(|_| ApiError::Unauthorized)?;

        Ok(AuthUser {
            user,
            token: token.to_string(),
        })
    }
}

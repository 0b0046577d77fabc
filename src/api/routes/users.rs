//! Registration and Login Routes
//!
//! - POST /user/register - Create an account
//! - POST /user/jwt - Exchange credentials for a token

use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use crate::api::dto::{LoginRequest, MessageResponse, RegisterRequest, TokenResponse};
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::metrics;
use crate::users::{validate_cake, validate_email, validate_password, Role, User};

/// POST /user/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<MessageResponse>)> {
    validate_email(&req.email)?;
    validate_password(&req.password)?;
    validate_cake(&req.favorite_cake)?;

    let password_hash = state
        .hasher
        .hash(&req.password)
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    state
        .store
        .add(User {
            email: req.email.clone(),
            password_hash,
            role: Role::User,
            favorite_cake: req.favorite_cake,
        })
        .await?;

    metrics::REGISTERED_USERS.inc();
    state.notifier.send(format!("registered: {}", req.email));
    tracing::info!(email = %req.email, "user registered");

    Ok((StatusCode::CREATED, Json(MessageResponse::new("registered"))))
}

/// POST /user/jwt
///
/// Both an unknown email and a wrong password collapse to the same
/// rejection, so the endpoint reveals nothing about which accounts exist.
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<TokenResponse>> {
    let user = state
        .store
        .get(&req.email)
        .await
        .map_err(|_| ApiError::InvalidLogin)?;

    let password_ok = state
        .hasher
        .verify(&req.password, &user.password_hash)
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    if !password_ok {
        return Err(ApiError::InvalidLogin);
    }

    let token = state.jwt.issue(&user.email)?;
    Ok(Json(TokenResponse { token }))
}

//! Authenticated Self-Service Routes
//!
//! - GET /user/me - The account's favorite cake
//! - PUT /user/favorite_cake
//! - PUT /user/password - Also revokes the presenting token
//! - PUT /user/email

use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use crate::api::dto::{
    CakeResponse, CakeUpdateRequest, EmailUpdateRequest, MessageResponse, PasswordUpdateRequest,
};
use crate::api::error::{ApiError, ApiResult};
use crate::api::extract::AuthUser;
use crate::api::state::AppState;
use crate::metrics;
use crate::users::{validate_cake, validate_email, validate_password};

/// GET /user/me
pub async fn me(auth: AuthUser) -> Json<CakeResponse> {
    metrics::CAKES_GIVEN.inc();
    Json(CakeResponse {
        favorite_cake: auth.user.favorite_cake,
    })
}

/// PUT /user/favorite_cake
pub async fn update_cake(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(req): Json<CakeUpdateRequest>,
) -> ApiResult<(StatusCode, Json<MessageResponse>)> {
    validate_cake(&req.favorite_cake)?;

    let mut user = auth.user;
    user.favorite_cake = req.favorite_cake;
    let email = user.email.clone();
    state.store.update(user).await?;

    state.notifier.send(format!("updated cake: {email}"));
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new("favorite cake changed")),
    ))
}

/// PUT /user/password
///
/// The token used for this request stops working: a stolen token cannot
/// outlive a password change.
pub async fn update_password(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(req): Json<PasswordUpdateRequest>,
) -> ApiResult<(StatusCode, Json<MessageResponse>)> {
    validate_password(&req.password)?;

    let mut user = auth.user;
    user.password_hash = state
        .hasher
        .hash(&req.password)
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    let email = user.email.clone();
    state.store.update(user).await?;
    state.store.revoke_token(&auth.token).await;

    state.notifier.send(format!("updated password: {email}"));
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new("password changed")),
    ))
}

/// PUT /user/email
pub async fn update_email(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(req): Json<EmailUpdateRequest>,
) -> ApiResult<(StatusCode, Json<MessageResponse>)> {
    validate_email(&req.email)?;

    let old_email = auth.user.email;
    state.store.change_email(&old_email, &req.email).await?;

    state
        .notifier
        .send(format!("updated email: {old_email} -> {}", req.email));
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new("email changed")),
    ))
}

//! Ban Management Routes
//!
//! - POST /admin/ban
//! - POST /admin/unban
//! - GET /admin/inspect?email=
//!
//! Every operation requires the actor's role to be strictly above the
//! target's, so admins cannot touch each other and nobody touches a
//! superadmin.

use axum::extract::{Query, State};
use axum::{http::StatusCode, Json};
use std::sync::Arc;

use crate::api::dto::{BanRequest, InspectQuery, MessageResponse, UnbanRequest};
use crate::api::error::{ApiError, ApiResult};
use crate::api::extract::AuthUser;
use crate::api::state::AppState;
use crate::users::{BanRecord, User};

fn ensure_dominates(actor: &User, target: &User) -> Result<(), ApiError> {
    if actor.role <= target.role {
        return Err(ApiError::Forbidden);
    }
    Ok(())
}

/// POST /admin/ban
pub async fn ban(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(req): Json<BanRequest>,
) -> ApiResult<(StatusCode, Json<MessageResponse>)> {
    let target = state.store.get(&req.email).await?;
    ensure_dominates(&auth.user, &target)?;

    state
        .store
        .ban(&req.email, &auth.user.email, &req.reason)
        .await?;

    state.notifier.send(format!("banned: {}", req.email));
    tracing::info!(target = %req.email, by = %auth.user.email, reason = %req.reason, "user banned");

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new(format!(
            "user \"{}\" is banned with reason \"{}\" by \"{}\"",
            req.email, req.reason, auth.user.email
        ))),
    ))
}

/// POST /admin/unban
pub async fn unban(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(req): Json<UnbanRequest>,
) -> ApiResult<(StatusCode, Json<MessageResponse>)> {
    let target = state.store.get(&req.email).await?;
    ensure_dominates(&auth.user, &target)?;

    state.store.unban(&req.email, &auth.user.email).await?;

    state.notifier.send(format!("unbanned: {}", req.email));
    tracing::info!(target = %req.email, by = %auth.user.email, "user unbanned");

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new(format!(
            "user \"{}\" is unbanned by \"{}\"",
            req.email, auth.user.email
        ))),
    ))
}

/// GET /admin/inspect?email=
pub async fn inspect(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Query(query): Query<InspectQuery>,
) -> ApiResult<Json<Vec<BanRecord>>> {
    let target = state.store.get(&query.email).await?;
    ensure_dominates(&auth.user, &target)?;

    let history = state.store.ban_history(&query.email).await?;
    Ok(Json(history))
}

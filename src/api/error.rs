//! API Error Types
//!
//! Maps layer errors onto HTTP responses. The externally visible contract
//! follows the service's original behavior: domain and validation failures
//! are 422 with a message, authentication failures are 401.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::auth::AuthError;
use crate::users::{StoreError, ValidationError};

/// API error types
#[derive(Error, Debug)]
pub enum ApiError {
    /// Request parameter validation failed
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// User repository rejected the operation
    #[error("{0}")]
    Store(#[from] StoreError),

    /// Missing, invalid, revoked, or banned credentials
    #[error("unauthorized")]
    Unauthorized,

    /// Actor's role does not dominate the target's
    #[error("not enough privileges")]
    Forbidden,

    /// Email/password pair did not check out
    #[error("invalid login params")]
    InvalidLogin,

    /// Internal server error
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::InvalidToken => ApiError::Unauthorized,
            other => ApiError::Internal(other.to_string()),
        }
    }
}

/// Error response body
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
    pub request_id: String,
}

/// Error details
#[derive(Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ApiError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
            ApiError::Store(e) => match e {
                // Auth-path rejections surface as 401 like any other
                // credential failure.
                StoreError::Banned { .. } | StoreError::TokenRevoked => {
                    (StatusCode::UNAUTHORIZED, "UNAUTHORIZED")
                }
                _ => (StatusCode::UNPROCESSABLE_ENTITY, "USER_ERROR"),
            },
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            ApiError::Forbidden => (StatusCode::UNPROCESSABLE_ENTITY, "FORBIDDEN"),
            ApiError::InvalidLogin => (StatusCode::UNPROCESSABLE_ENTITY, "LOGIN_ERROR"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        let request_id = uuid::Uuid::new_v4().to_string();

        tracing::error!(
            request_id = %request_id,
            error_code = %code,
            error_message = %self,
            "API error occurred"
        );

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message: self.to_string(),
            },
            request_id,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type for API operations
pub type ApiResult<T> = Result<T, ApiError>;

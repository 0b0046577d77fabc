//! Data Transfer Objects
//!
//! Request and response types for the API endpoints.
//! These types are serialized/deserialized to/from JSON.

use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub favorite_cake: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
}

/// Generic confirmation body
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CakeResponse {
    pub favorite_cake: String,
}

#[derive(Debug, Deserialize)]
pub struct CakeUpdateRequest {
    pub favorite_cake: String,
}

#[derive(Debug, Deserialize)]
pub struct PasswordUpdateRequest {
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct EmailUpdateRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct BanRequest {
    pub email: String,
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct UnbanRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct InspectQuery {
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_seconds: u64,
    pub version: String,
}

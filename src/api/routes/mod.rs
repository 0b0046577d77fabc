//! API Route Handlers
//!
//! Organized by area:
//! - `users`: registration and login
//! - `profile`: authenticated self-service endpoints
//! - `admin`: ban management
//! - `health`: probes

pub mod admin;
pub mod health;
pub mod profile;
pub mod users;

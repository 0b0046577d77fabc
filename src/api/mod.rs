//! User-Service REST API
//!
//! HTTP API layer, built with Axum.
//!
//! # Endpoints
//!
//! ## Accounts
//! - `POST /user/register` - Create an account
//! - `POST /user/jwt` - Exchange credentials for a token
//! - `GET /user/me` - The account's favorite cake
//! - `PUT /user/favorite_cake` - Change favorite cake
//! - `PUT /user/password` - Change password (revokes the presenting token)
//! - `PUT /user/email` - Change email
//!
//! ## Admin
//! - `POST /admin/ban` - Ban an account
//! - `POST /admin/unban` - Lift an active ban
//! - `GET /admin/inspect?email=` - Ban history
//!
//! ## Operations
//! - `GET /health/live`, `GET /health/ready`, `GET /health` - Probes
//! - `GET /metrics` - Prometheus exposition
//!
//! Every account-lifecycle change additionally emits one notification line
//! through [`crate::notify::Notifier`], which ends up on the broker topic
//! the relay broadcasts from.

pub mod dto;
pub mod error;
pub mod extract;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use state::{ApiConfig, AppState};

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::metrics;

/// Build the API router with all routes and middleware
pub fn build_router(state: AppState) -> Router {
    let user_routes = Router::new()
        .route("/register", post(routes::users::register))
        .route("/jwt", post(routes::users::login))
        .route("/me", get(routes::profile::me))
        .route("/favorite_cake", put(routes::profile::update_cake))
        .route("/password", put(routes::profile::update_password))
        .route("/email", put(routes::profile::update_email));

    let admin_routes = Router::new()
        .route("/ban", post(routes::admin::ban))
        .route("/unban", post(routes::admin::unban))
        .route("/inspect", get(routes::admin::inspect));

    let health_routes = Router::new()
        .route("/live", get(routes::health::liveness))
        .route("/ready", get(routes::health::readiness))
        .route("/", get(routes::health::full_health));

    let shared_state = Arc::new(state);

    Router::new()
        .nest("/user", user_routes)
        .nest("/admin", admin_routes)
        .nest("/health", health_routes)
        .route("/metrics", get(metrics::metrics_handler))
        .layer(middleware::from_fn(metrics::record_request))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(shared_state)
}

/// Start the API server
pub async fn serve(state: AppState, config: &ApiConfig) -> std::io::Result<()> {
    let router = build_router(state);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("API listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("API shut down gracefully");
    Ok(())
}

/// Wait for SIGINT/SIGTERM. Shared by both servers.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{JwtService, PasswordHasher};
    use crate::notify::Notifier;
    use crate::users::{Role, User, UserStore};
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tokio::sync::mpsc;
    use tower::util::ServiceExt;

    fn create_test_app() -> (Router, mpsc::UnboundedReceiver<String>, Arc<UserStore>) {
        let store = Arc::new(UserStore::new());
        let (notifier, events) = Notifier::channel();
        let state = AppState::new(
            Arc::clone(&store),
            JwtService::new("test-secret", 1),
            notifier,
            ApiConfig::default(),
        );
        (build_router(state), events, store)
    }

    async fn seed_user(store: &UserStore, email: &str, password: &str, role: Role) {
        let password_hash = PasswordHasher::new().hash(password).unwrap();
        store
            .add(User {
                email: email.to_string(),
                password_hash,
                role,
                favorite_cake: "supercake".to_string(),
            })
            .await
            .unwrap();
    }

    async fn request(
        app: &Router,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {token}"));
        }

        let request = match body {
            Some(body) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn login(app: &Router, email: &str, password: &str) -> String {
        let (status, body) = request(
            app,
            "POST",
            "/user/jwt",
            None,
            Some(json!({"email": email, "password": password})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        body["token"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn register_creates_account_and_notifies() {
        let (app, mut events, _store) = create_test_app();

        let (status, body) = request(
            &app,
            "POST",
            "/user/register",
            None,
            Some(json!({
                "email": "new@user.com",
                "password": "longenough",
                "favorite_cake": "brownie"
            })),
        )
        .await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["message"], "registered");
        assert_eq!(events.recv().await.unwrap(), "registered: new@user.com");
    }

    #[tokio::test]
    async fn register_rejects_invalid_params() {
        let (app, _events, _store) = create_test_app();

        let cases = [
            json!({"email": "not-an-email", "password": "longenough", "favorite_cake": "brownie"}),
            json!({"email": "a@b.com", "password": "short", "favorite_cake": "brownie"}),
            json!({"email": "a@b.com", "password": "longenough", "favorite_cake": ""}),
            json!({"email": "a@b.com", "password": "longenough", "favorite_cake": "red velvet"}),
        ];

        for body in cases {
            let (status, _) = request(&app, "POST", "/user/register", None, Some(body)).await;
            assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        }
    }

    #[tokio::test]
    async fn register_rejects_duplicate_email() {
        let (app, _events, store) = create_test_app();
        seed_user(&store, "a@b.com", "longenough", Role::User).await;

        let (status, _) = request(
            &app,
            "POST",
            "/user/register",
            None,
            Some(json!({
                "email": "a@b.com",
                "password": "longenough",
                "favorite_cake": "brownie"
            })),
        )
        .await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn login_and_fetch_cake() {
        let (app, _events, store) = create_test_app();
        seed_user(&store, "a@b.com", "longenough", Role::User).await;

        let token = login(&app, "a@b.com", "longenough").await;
        let (status, body) = request(&app, "GET", "/user/me", Some(&token), None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["favorite_cake"], "supercake");
    }

    #[tokio::test]
    async fn login_rejects_wrong_password() {
        let (app, _events, store) = create_test_app();
        seed_user(&store, "a@b.com", "longenough", Role::User).await;

        let (status, _) = request(
            &app,
            "POST",
            "/user/jwt",
            None,
            Some(json!({"email": "a@b.com", "password": "not-the-one"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn me_requires_valid_token() {
        let (app, _events, _store) = create_test_app();

        let (status, _) = request(&app, "GET", "/user/me", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = request(&app, "GET", "/user/me", Some("garbage"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn password_change_revokes_presenting_token() {
        let (app, _events, store) = create_test_app();
        seed_user(&store, "a@b.com", "longenough", Role::User).await;

        let token = login(&app, "a@b.com", "longenough").await;
        let (status, _) = request(
            &app,
            "PUT",
            "/user/password",
            Some(&token),
            Some(json!({"password": "evenlonger"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        // The old token is dead, the new password works.
        let (status, _) = request(&app, "GET", "/user/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let fresh = login(&app, "a@b.com", "evenlonger").await;
        let (status, _) = request(&app, "GET", "/user/me", Some(&fresh), None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn cake_update_round_trip() {
        let (app, mut events, store) = create_test_app();
        seed_user(&store, "a@b.com", "longenough", Role::User).await;
        let token = login(&app, "a@b.com", "longenough").await;

        let (status, _) = request(
            &app,
            "PUT",
            "/user/favorite_cake",
            Some(&token),
            Some(json!({"favorite_cake": "cheesecake"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(events.recv().await.unwrap(), "updated cake: a@b.com");

        let (_, body) = request(&app, "GET", "/user/me", Some(&token), None).await;
        assert_eq!(body["favorite_cake"], "cheesecake");
    }

    #[tokio::test]
    async fn email_change_rekeys_and_notifies() {
        let (app, mut events, store) = create_test_app();
        seed_user(&store, "old@b.com", "longenough", Role::User).await;
        let token = login(&app, "old@b.com", "longenough").await;

        let (status, _) = request(
            &app,
            "PUT",
            "/user/email",
            Some(&token),
            Some(json!({"email": "new@b.com"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(
            events.recv().await.unwrap(),
            "updated email: old@b.com -> new@b.com"
        );

        // The token still names the old subject, which no longer exists.
        let (status, _) = request(&app, "GET", "/user/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(store.get("new@b.com").await.is_ok());
    }

    #[tokio::test]
    async fn ban_locks_out_and_unban_restores() {
        let (app, mut events, store) = create_test_app();
        seed_user(&store, "root@b.com", "rootpassword", Role::Superadmin).await;
        seed_user(&store, "victim@b.com", "longenough", Role::User).await;

        let admin_token = login(&app, "root@b.com", "rootpassword").await;
        let victim_token = login(&app, "victim@b.com", "longenough").await;

        let (status, body) = request(
            &app,
            "POST",
            "/admin/ban",
            Some(&admin_token),
            Some(json!({"email": "victim@b.com", "reason": "spam"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(
            body["message"],
            "user \"victim@b.com\" is banned with reason \"spam\" by \"root@b.com\""
        );
        assert_eq!(events.recv().await.unwrap(), "banned: victim@b.com");

        let (status, _) = request(&app, "GET", "/user/me", Some(&victim_token), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = request(
            &app,
            "POST",
            "/admin/unban",
            Some(&admin_token),
            Some(json!({"email": "victim@b.com"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(events.recv().await.unwrap(), "unbanned: victim@b.com");

        let (status, _) = request(&app, "GET", "/user/me", Some(&victim_token), None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn ban_requires_strictly_higher_role() {
        let (app, _events, store) = create_test_app();
        seed_user(&store, "root@b.com", "rootpassword", Role::Superadmin).await;
        seed_user(&store, "peon@b.com", "longenough", Role::User).await;

        let peon_token = login(&app, "peon@b.com", "longenough").await;
        let (status, _) = request(
            &app,
            "POST",
            "/admin/ban",
            Some(&peon_token),
            Some(json!({"email": "root@b.com", "reason": "coup"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn inspect_returns_ban_history() {
        let (app, _events, store) = create_test_app();
        seed_user(&store, "root@b.com", "rootpassword", Role::Superadmin).await;
        seed_user(&store, "victim@b.com", "longenough", Role::User).await;
        store
            .ban("victim@b.com", "root@b.com", "spam")
            .await
            .unwrap();

        let admin_token = login(&app, "root@b.com", "rootpassword").await;
        let (status, body) = request(
            &app,
            "GET",
            "/admin/inspect?email=victim@b.com",
            Some(&admin_token),
            None,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let history = body.as_array().unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0]["reason"], "spam");
        assert_eq!(history[0]["banned_by"], "root@b.com");
    }

    #[tokio::test]
    async fn health_endpoints_respond() {
        let (app, _events, _store) = create_test_app();

        let (status, _) = request(&app, "GET", "/health/live", None, None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = request(&app, "GET", "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }
}

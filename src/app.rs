//! Router assembly shared by the server binary and the integration tests.

use crate::auth::{api as auth_api, auth_middleware, AuthState, SessionManager};
use crate::journal::{api as journal_api, JournalState};
use crate::middleware::request_logging;
use anyhow::{Context, Result};
use axum::{
    http::{header, HeaderValue, Method},
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

pub fn build_router(
    sessions: Arc<SessionManager>,
    journal: JournalState,
    cors: CorsLayer,
) -> Router {
    let auth_router = Router::new()
        .route("/login", post(auth_api::login))
        .route("/logout", post(auth_api::logout))
        .route("/verify-token", post(auth_api::verify_token))
        .route("/refresh-token", post(auth_api::refresh_token))
        .with_state(AuthState::new(sessions.clone()));

    // Behind the access guard
    let protected_routes = Router::new()
        .route("/buddies", post(journal_api::add_buddy))
        .route(
            "/fcm/register-token",
            post(journal_api::register_device_token),
        )
        .route("/posts", post(journal_api::create_post))
        .route_layer(middleware::from_fn_with_state(sessions, auth_middleware))
        .with_state(journal.clone());

    let public_routes = Router::new()
        .route("/health", get(health_check))
        .route("/users", post(journal_api::register_user))
        .with_state(journal);

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(auth_router)
        .layer(middleware::from_fn(request_logging))
        .layer(cors)
}

pub fn cors_layer(origin: &str) -> Result<CorsLayer> {
    let origin = HeaderValue::from_str(origin)
        .with_context(|| format!("Invalid CORS origin: {}", origin))?;

    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]))
}

async fn health_check() -> &'static str {
    "ok"
}

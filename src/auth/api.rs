//! Authentication API Endpoints
//! Login, logout, token refresh and access token verification

use crate::auth::{
    middleware::{authorize, AuthError},
    models::{LoginRequest, LoginResponse, RefreshResponse, RefreshTokenRequest},
    session::{ErrorClass, SessionError, SessionManager},
};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tracing::error;

/// Shared auth state
#[derive(Clone)]
pub struct AuthState {
    pub sessions: Arc<SessionManager>,
}

impl AuthState {
    pub fn new(sessions: Arc<SessionManager>) -> Self {
        Self { sessions }
    }
}

/// Login endpoint - POST /login
pub async fn login(
    State(state): State<AuthState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, AuthApiError> {
    let Json(req) = payload.map_err(|_| AuthApiError::InvalidRequest)?;

    // bcrypt is deliberately slow; keep it off the async workers
    let sessions = state.sessions.clone();
    let outcome = tokio::task::spawn_blocking(move || sessions.login(&req.email, &req.password))
        .await
        .map_err(|e| {
            error!(error = %e, "Login task failed");
            AuthApiError::Internal
        })??;

    Ok(Json(LoginResponse {
        access_token: outcome.access_token,
        refresh_token: outcome.refresh_token,
        user_id: outcome.account.id.to_string(),
        username: outcome.account.username,
        display_name: outcome.account.display_name,
    }))
}

/// Refresh endpoint - POST /refresh-token
pub async fn refresh_token(
    State(state): State<AuthState>,
    payload: Result<Json<RefreshTokenRequest>, JsonRejection>,
) -> Result<Json<RefreshResponse>, AuthApiError> {
    let Json(req) = payload.map_err(|_| AuthApiError::InvalidRequest)?;

    let outcome = state.sessions.refresh(&req.refresh_token)?;

    Ok(Json(RefreshResponse {
        access_token: outcome.access_token,
        refresh_token: outcome.refresh_token,
    }))
}

/// Logout endpoint - POST /logout
pub async fn logout(
    State(state): State<AuthState>,
    payload: Result<Json<RefreshTokenRequest>, JsonRejection>,
) -> Result<(StatusCode, &'static str), AuthApiError> {
    let Json(req) = payload.map_err(|_| AuthApiError::InvalidRequest)?;

    state.sessions.logout(&req.refresh_token)?;

    Ok((StatusCode::OK, "Logged out successfully"))
}

/// Access token check - POST /verify-token
pub async fn verify_token(
    State(state): State<AuthState>,
    headers: HeaderMap,
) -> Result<(StatusCode, &'static str), AuthError> {
    authorize(&state.sessions, &headers)?;
    Ok((StatusCode::OK, "Token is valid"))
}

/// Auth API errors
#[derive(Debug)]
pub enum AuthApiError {
    InvalidRequest,
    Session(SessionError),
    Internal,
}

impl From<SessionError> for AuthApiError {
    fn from(e: SessionError) -> Self {
        AuthApiError::Session(e)
    }
}

pub fn status_for(class: ErrorClass) -> StatusCode {
    match class {
        ErrorClass::Input => StatusCode::BAD_REQUEST,
        ErrorClass::Credential => StatusCode::UNAUTHORIZED,
        ErrorClass::Resource => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AuthApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthApiError::InvalidRequest => (StatusCode::BAD_REQUEST, "Invalid request"),
            AuthApiError::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error"),
            AuthApiError::Session(e) => {
                let message = match &e {
                    SessionError::InvalidCredentials => "Invalid email or password",
                    SessionError::InvalidRefreshToken => "Invalid or expired refresh token",
                    SessionError::RefreshTokenNotRecognized => "Refresh token not recognized",
                    SessionError::MissingToken => "Missing refresh token",
                    SessionError::TokenNotFound => "Refresh token not found",
                    SessionError::Unauthorized => "Invalid or expired token",
                    // Detail was logged where it happened
                    SessionError::SessionPersist(_)
                    | SessionError::Signing(_)
                    | SessionError::StoreUnavailable(_) => "Internal server error",
                };
                (status_for(e.class()), message)
            }
        };

        (status, message).into_response()
    }
}

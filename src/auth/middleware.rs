//! Authentication Middleware
//! Gate protected routes on a valid access token

use crate::auth::{models::AuthenticatedUser, session::SessionManager};
use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::headers::{authorization::Bearer, Authorization, HeaderMapExt};
use std::sync::Arc;
use tracing::debug;

/// Auth middleware that validates access tokens
pub async fn auth_middleware(
    State(sessions): State<Arc<SessionManager>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let email = authorize(&sessions, req.headers())?;

    // Downstream handlers read the caller from request extensions
    req.extensions_mut().insert(AuthenticatedUser { email });

    Ok(next.run(req).await)
}

/// Check the `Authorization: Bearer` header and return the token subject
pub fn authorize(sessions: &SessionManager, headers: &HeaderMap) -> Result<String, AuthError> {
    let token = bearer_token(headers).ok_or_else(|| {
        debug!("Request without bearer token");
        AuthError::MissingAuthHeader
    })?;

    // The session layer logs the precise cause; callers only ever see 401.
    sessions
        .verify(&token)
        .map_err(|_| AuthError::Unauthorized)
}

pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .typed_get::<Authorization<Bearer>>()
        .map(|auth| auth.token().to_string())
}

/// Auth error types
#[derive(Debug, PartialEq, Eq)]
pub enum AuthError {
    MissingAuthHeader,
    Unauthorized,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let message = match self {
            AuthError::MissingAuthHeader => "Missing Authorization header",
            AuthError::Unauthorized => "Invalid or expired token",
        };

        (StatusCode::UNAUTHORIZED, message).into_response()
    }
}

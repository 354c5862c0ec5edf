//! Journal API Endpoints
//! Account registration plus the authenticated write paths

use crate::auth::{models::AuthenticatedUser, user_store::AccountDirectory, user_store::UserStore};
use crate::clock::Clock;
use crate::db::is_unique_violation;
use crate::journal::store::{JournalStore, Post};
use crate::notify::{NewPostNotification, NotificationDispatcher};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, warn};

const MAX_POST_CHARS: usize = 280;
const MIN_PASSWORD_LEN: usize = 8;

#[derive(Clone)]
pub struct JournalState {
    pub users: Arc<UserStore>,
    pub journal: Arc<JournalStore>,
    pub notifier: NotificationDispatcher,
    pub clock: Arc<dyn Clock>,
}

impl JournalState {
    /// Resolve the authenticated email to an account id
    fn caller_id(&self, user: &AuthenticatedUser) -> Result<i64, JournalError> {
        self.users
            .lookup_by_email(&user.email)
            .map_err(internal)?
            .map(|account| account.id)
            // Valid access token for an account that no longer exists
            .ok_or(JournalError::UnknownCaller)
    }
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    #[serde(default)]
    pub display_name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    pub display_name: String,
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct AddBuddyRequest {
    pub buddy_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct DeviceTokenRequest {
    #[serde(default)]
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct CreatePostRequest {
    #[serde(default)]
    pub template_id: i64,
    #[serde(default)]
    pub text: String,
    pub photo_path: Option<String>,
}

/// Register account - POST /users
pub async fn register_user(
    State(state): State<JournalState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<UserResponse>), JournalError> {
    let Json(req) = payload.map_err(|_| JournalError::InvalidRequest("Invalid request body"))?;

    if req.username.trim().is_empty() || req.email.trim().is_empty() {
        return Err(JournalError::InvalidRequest("username and email are required"));
    }
    if req.password.len() < MIN_PASSWORD_LEN {
        return Err(JournalError::WeakPassword);
    }
    let display_name = if req.display_name.trim().is_empty() {
        req.username.clone()
    } else {
        req.display_name.clone()
    };

    let users = state.users.clone();
    let account = tokio::task::spawn_blocking(move || {
        users.create_user(&req.username, &display_name, &req.email, &req.password)
    })
    .await
    .map_err(|e| internal(e.into()))?
    .map_err(|e| {
        if is_unique_violation(&e) {
            JournalError::AlreadyExists
        } else {
            internal(e)
        }
    })?;

    Ok((
        StatusCode::CREATED,
        Json(UserResponse {
            id: account.id,
            username: account.username,
            display_name: account.display_name,
            email: account.email,
        }),
    ))
}

/// Link a buddy - POST /buddies
pub async fn add_buddy(
    State(state): State<JournalState>,
    Extension(user): Extension<AuthenticatedUser>,
    payload: Result<Json<AddBuddyRequest>, JsonRejection>,
) -> Result<StatusCode, JournalError> {
    let Json(req) = payload.map_err(|_| JournalError::InvalidRequest("Invalid request body"))?;
    let caller = state.caller_id(&user)?;

    if req.buddy_id <= 0 || req.buddy_id == caller {
        return Err(JournalError::InvalidRequest("Valid buddy_id is required"));
    }
    if !state.users.user_exists(req.buddy_id).map_err(internal)? {
        return Err(JournalError::UserNotFound);
    }

    let created = state
        .journal
        .add_buddy(caller, req.buddy_id)
        .map_err(internal)?;

    Ok(if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    })
}

/// Register push device token - POST /fcm/register-token
pub async fn register_device_token(
    State(state): State<JournalState>,
    Extension(user): Extension<AuthenticatedUser>,
    payload: Result<Json<DeviceTokenRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, JournalError> {
    let Json(req) = payload.map_err(|_| JournalError::InvalidRequest("Invalid request body"))?;
    if req.token.is_empty() {
        return Err(JournalError::InvalidRequest("Token is required"));
    }
    let caller = state.caller_id(&user)?;

    state
        .journal
        .register_device_token(caller, &req.token)
        .map_err(internal)?;

    info!(user_id = caller, "✅ Device token registered");
    Ok(Json(json!({ "message": "FCM token registered successfully" })))
}

/// Create the daily post - POST /posts
pub async fn create_post(
    State(state): State<JournalState>,
    Extension(user): Extension<AuthenticatedUser>,
    payload: Result<Json<CreatePostRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Post>), JournalError> {
    let Json(req) = payload.map_err(|_| JournalError::InvalidRequest("Invalid request body"))?;

    if req.template_id <= 0 {
        return Err(JournalError::InvalidRequest("template_id is required"));
    }
    if req.text.is_empty() {
        return Err(JournalError::InvalidRequest("text is required"));
    }
    if req.text.chars().count() > MAX_POST_CHARS {
        return Err(JournalError::InvalidRequest(
            "text must be at most 280 characters",
        ));
    }
    let caller = state.caller_id(&user)?;

    let post = state
        .journal
        .create_post(
            caller,
            req.template_id,
            &req.text,
            req.photo_path.as_deref(),
            state.clock.now(),
        )
        .map_err(internal)?
        .ok_or(JournalError::DailyLimitReached)?;

    // Fire and forget: the post is committed whatever happens to delivery.
    if !state.notifier.enqueue(NewPostNotification {
        author_id: caller,
        text: post.text.clone(),
    }) {
        warn!(post_id = post.id, "Buddy notification not queued");
    }

    Ok((StatusCode::CREATED, Json(post)))
}

fn internal(e: anyhow::Error) -> JournalError {
    error!(error = %e, "Journal store failure");
    JournalError::Internal
}

#[derive(Debug, PartialEq, Eq)]
pub enum JournalError {
    InvalidRequest(&'static str),
    WeakPassword,
    AlreadyExists,
    UnknownCaller,
    UserNotFound,
    DailyLimitReached,
    Internal,
}

impl IntoResponse for JournalError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            JournalError::InvalidRequest(message) => (StatusCode::BAD_REQUEST, message),
            JournalError::WeakPassword => (
                StatusCode::BAD_REQUEST,
                "Password must be at least 8 characters",
            ),
            JournalError::AlreadyExists => {
                (StatusCode::CONFLICT, "Username or email already exists")
            }
            JournalError::UnknownCaller => (StatusCode::UNAUTHORIZED, "Invalid or expired token"),
            JournalError::UserNotFound => (StatusCode::NOT_FOUND, "User not found"),
            JournalError::DailyLimitReached => (
                StatusCode::FORBIDDEN,
                "Daily post limit reached (1 post per day)",
            ),
            JournalError::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error"),
        };

        (status, message).into_response()
    }
}

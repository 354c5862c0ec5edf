//! Authentication Models
//! Wire formats and records for the session lifecycle

use serde::{Deserialize, Serialize};

/// Account record as seen by the session layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    pub username: String,
    pub display_name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // bcrypt hash - never serialize
}

/// Which signing key a credential belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    Access,
    Refresh,
}

impl KeyKind {
    pub fn as_str(&self) -> &str {
        match self {
            KeyKind::Access => "access",
            KeyKind::Refresh => "refresh",
        }
    }
}

/// JWT Claims payload
#[derive(Debug, Clone, Serialize)]
pub struct Claims {
    pub email: String, // subject
    pub exp: i64,
    pub iat: i64,
    pub jti: String,
}

/// A freshly signed credential and the instant it stops being valid
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: i64, // unix seconds
}

/// Login request body
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Login response
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub user_id: String,
    pub username: String,
    pub display_name: String,
}

/// Body shared by `/refresh-token` and `/logout`
#[derive(Debug, Deserialize)]
pub struct RefreshTokenRequest {
    #[serde(default)]
    pub refresh_token: String,
}

/// Refresh response; `refresh_token` is only present when rotation is on
#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub access_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

/// Identity attached to a request by the access guard
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub email: String,
}

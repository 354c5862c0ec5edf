//! Session Manager
//!
//! Login, refresh, logout and access verification on top of the token signer,
//! the account directory and the refresh token store.
//!
//! A refresh credential is honored only when its signature and expiry check
//! out *and* its record is still in the store. Access credentials are
//! stateless: an access token minted before a logout stays valid until its
//! own expiry.

use crate::auth::{
    jwt::{SignerError, TokenSigner},
    models::{Account, KeyKind},
    token_store::RefreshTokenStore,
    user_store::AccountDirectory,
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Externally visible error class; the HTTP layer maps these to status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Input,
    Credential,
    Resource,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("could not persist session: {0}")]
    SessionPersist(#[source] anyhow::Error),
    #[error("invalid or expired refresh token")]
    InvalidRefreshToken,
    #[error("refresh token not recognized")]
    RefreshTokenNotRecognized,
    #[error("missing refresh token")]
    MissingToken,
    #[error("refresh token not found")]
    TokenNotFound,
    #[error("invalid or expired access token")]
    Unauthorized,
    #[error("signing failed: {0}")]
    Signing(#[source] SignerError),
    #[error("store unavailable: {0}")]
    StoreUnavailable(#[source] anyhow::Error),
}

impl SessionError {
    pub fn class(&self) -> ErrorClass {
        match self {
            SessionError::MissingToken => ErrorClass::Input,
            SessionError::InvalidCredentials
            | SessionError::InvalidRefreshToken
            | SessionError::RefreshTokenNotRecognized
            | SessionError::TokenNotFound
            | SessionError::Unauthorized => ErrorClass::Credential,
            SessionError::SessionPersist(_)
            | SessionError::Signing(_)
            | SessionError::StoreUnavailable(_) => ErrorClass::Resource,
        }
    }
}

/// Credentials handed out by a successful login
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub access_token: String,
    pub refresh_token: String,
    pub account: Account,
}

#[derive(Debug, Clone)]
pub struct RefreshOutcome {
    pub access_token: String,
    /// Replacement refresh token, only when rotation is enabled
    pub refresh_token: Option<String>,
}

pub struct SessionManager {
    signer: Arc<TokenSigner>,
    accounts: Arc<dyn AccountDirectory>,
    tokens: Arc<dyn RefreshTokenStore>,
    rotate_refresh_tokens: bool,
}

impl SessionManager {
    pub fn new(
        signer: Arc<TokenSigner>,
        accounts: Arc<dyn AccountDirectory>,
        tokens: Arc<dyn RefreshTokenStore>,
    ) -> Self {
        Self {
            signer,
            accounts,
            tokens,
            rotate_refresh_tokens: false,
        }
    }

    /// Replace the presented refresh token on every refresh
    pub fn with_refresh_rotation(mut self, enabled: bool) -> Self {
        self.rotate_refresh_tokens = enabled;
        self
    }

    pub fn login(&self, email: &str, password: &str) -> Result<LoginOutcome, SessionError> {
        let account = self
            .accounts
            .authenticate(email, password)
            .map_err(|e| {
                error!(error = %e, "Account lookup failed during login");
                SessionError::StoreUnavailable(e)
            })?
            .ok_or_else(|| {
                warn!("❌ Failed login attempt");
                SessionError::InvalidCredentials
            })?;

        let access = self
            .signer
            .issue_access(&account.email)
            .map_err(signing_failed)?;
        let refresh = self
            .signer
            .issue_refresh(&account.email)
            .map_err(signing_failed)?;

        // Tokens are dropped on failure: never hand out a refresh token we cannot revoke.
        self.tokens
            .persist(account.id, &refresh.token, refresh.expires_at)
            .map_err(|e| {
                error!(user_id = account.id, error = %e, "Could not save refresh token");
                SessionError::SessionPersist(e)
            })?;

        info!(user_id = account.id, "✅ Login successful");

        Ok(LoginOutcome {
            access_token: access.token,
            refresh_token: refresh.token,
            account,
        })
    }

    pub fn refresh(&self, refresh_token: &str) -> Result<RefreshOutcome, SessionError> {
        let subject = self
            .signer
            .verify(refresh_token, KeyKind::Refresh)
            .map_err(|e| {
                debug!(cause = %e, "Refresh token failed verification");
                SessionError::InvalidRefreshToken
            })?;

        if !self.exists(refresh_token)? {
            debug!("Refresh token not in store");
            return Err(SessionError::RefreshTokenNotRecognized);
        }

        let access = self
            .signer
            .issue_access(&subject)
            .map_err(signing_failed)?;

        if !self.rotate_refresh_tokens {
            return Ok(RefreshOutcome {
                access_token: access.token,
                refresh_token: None,
            });
        }

        let replacement = self.rotate(refresh_token, &subject)?;
        Ok(RefreshOutcome {
            access_token: access.token,
            refresh_token: Some(replacement),
        })
    }

    /// Persist a fresh refresh token, then retire the presented one.
    fn rotate(&self, presented: &str, subject: &str) -> Result<String, SessionError> {
        let account = self
            .accounts
            .lookup_by_email(subject)
            .map_err(store_unavailable)?
            .ok_or(SessionError::RefreshTokenNotRecognized)?;

        let next = self
            .signer
            .issue_refresh(subject)
            .map_err(signing_failed)?;
        self.tokens
            .persist(account.id, &next.token, next.expires_at)
            .map_err(|e| {
                error!(user_id = account.id, error = %e, "Could not save rotated refresh token");
                SessionError::SessionPersist(e)
            })?;

        match self.tokens.revoke(presented) {
            Ok(0) => {
                // Lost a race with a logout or another refresh of the same token.
                if let Err(e) = self.tokens.revoke(&next.token) {
                    error!(error = %e, "Could not discard rotated refresh token");
                }
                Err(SessionError::RefreshTokenNotRecognized)
            }
            Ok(_) => {
                debug!(user_id = account.id, "Refresh token rotated");
                Ok(next.token)
            }
            Err(e) => {
                if let Err(e) = self.tokens.revoke(&next.token) {
                    error!(error = %e, "Could not discard rotated refresh token");
                }
                Err(store_unavailable(e))
            }
        }
    }

    pub fn logout(&self, refresh_token: &str) -> Result<(), SessionError> {
        if refresh_token.is_empty() {
            return Err(SessionError::MissingToken);
        }

        self.signer
            .verify(refresh_token, KeyKind::Refresh)
            .map_err(|e| {
                debug!(cause = %e, "Logout token failed verification");
                SessionError::InvalidRefreshToken
            })?;

        let rows_affected = self
            .tokens
            .revoke(refresh_token)
            .map_err(store_unavailable)?;
        if rows_affected == 0 {
            debug!("Logout for refresh token with no record");
            return Err(SessionError::TokenNotFound);
        }

        info!("👋 Logged out");
        Ok(())
    }

    /// Validate an access token; returns its subject
    pub fn verify(&self, access_token: &str) -> Result<String, SessionError> {
        self.signer
            .verify(access_token, KeyKind::Access)
            .map_err(|e| {
                debug!(cause = %e, "Access token rejected");
                SessionError::Unauthorized
            })
    }

    fn exists(&self, token: &str) -> Result<bool, SessionError> {
        self.tokens.exists(token).map_err(store_unavailable)
    }
}

fn signing_failed(e: SignerError) -> SessionError {
    error!(error = %e, "Token signing failed");
    SessionError::Signing(e)
}

fn store_unavailable(e: anyhow::Error) -> SessionError {
    error!(error = %e, "Token store unavailable");
    SessionError::StoreUnavailable(e)
}

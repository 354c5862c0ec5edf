//! JWT Token Signer
//! Issues and verifies access and refresh credentials under separate HMAC keys

use crate::auth::models::{Claims, IssuedToken, KeyKind};
use crate::clock::Clock;
use anyhow::bail;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::Duration;
use jsonwebtoken::{
    decode, decode_header, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header,
    Validation,
};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

pub const ACCESS_TOKEN_TTL_SECS: i64 = 15 * 60;
pub const REFRESH_TOKEN_TTL_SECS: i64 = 7 * 24 * 60 * 60;

const HMAC_ALGORITHMS: [Algorithm; 3] = [Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];

/// Key material for both credential kinds, loaded once at startup
#[derive(Clone)]
pub struct SignerKeys {
    pub access: Vec<u8>,
    pub refresh: Vec<u8>,
}

impl fmt::Debug for SignerKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignerKeys")
            .field("access", &"<redacted>")
            .field("refresh", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SignerError {
    #[error("failed to sign token: {0}")]
    Signing(String),
    #[error("token signature or algorithm rejected")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
    #[error("token could not be parsed")]
    Malformed,
    #[error("token is missing claim `{0}`")]
    MissingClaim(&'static str),
}

struct KeyPair {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl KeyPair {
    fn from_secret(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }
}

/// Stateless signer; safe to share behind an `Arc` across request handlers
pub struct TokenSigner {
    access: KeyPair,
    refresh: KeyPair,
    access_ttl: Duration,
    refresh_ttl: Duration,
    validation: Validation,
    clock: Arc<dyn Clock>,
}

impl TokenSigner {
    /// Create a signer. Empty or identical keys are a startup error.
    pub fn new(keys: SignerKeys, clock: Arc<dyn Clock>) -> anyhow::Result<Self> {
        Self::with_ttls(
            keys,
            clock,
            Duration::seconds(ACCESS_TOKEN_TTL_SECS),
            Duration::seconds(REFRESH_TOKEN_TTL_SECS),
        )
    }

    pub fn with_ttls(
        keys: SignerKeys,
        clock: Arc<dyn Clock>,
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> anyhow::Result<Self> {
        if keys.access.is_empty() || keys.refresh.is_empty() {
            bail!("access and refresh signing secrets must both be set");
        }
        if keys.access == keys.refresh {
            bail!("access and refresh signing secrets must differ");
        }

        // Signature and algorithm only; claims are checked by hand against our clock.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.algorithms = HMAC_ALGORITHMS.to_vec();
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.required_spec_claims = HashSet::new();

        Ok(Self {
            access: KeyPair::from_secret(&keys.access),
            refresh: KeyPair::from_secret(&keys.refresh),
            access_ttl,
            refresh_ttl,
            validation,
            clock,
        })
    }

    pub fn issue_access(&self, subject: &str) -> Result<IssuedToken, SignerError> {
        self.issue(subject, KeyKind::Access)
    }

    pub fn issue_refresh(&self, subject: &str) -> Result<IssuedToken, SignerError> {
        self.issue(subject, KeyKind::Refresh)
    }

    fn keys(&self, kind: KeyKind) -> &KeyPair {
        match kind {
            KeyKind::Access => &self.access,
            KeyKind::Refresh => &self.refresh,
        }
    }

    fn issue(&self, subject: &str, kind: KeyKind) -> Result<IssuedToken, SignerError> {
        let ttl = match kind {
            KeyKind::Access => self.access_ttl,
            KeyKind::Refresh => self.refresh_ttl,
        };
        let now = self.clock.now();
        let expires_at = now
            .checked_add_signed(ttl)
            .ok_or_else(|| SignerError::Signing("expiry out of range".to_string()))?
            .timestamp();

        let claims = Claims {
            email: subject.to_string(),
            exp: expires_at,
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &self.keys(kind).encoding,
        )
        .map_err(|e| SignerError::Signing(e.to_string()))?;

        debug!(kind = kind.as_str(), expires_at, "Issued token");

        Ok(IssuedToken { token, expires_at })
    }

    /// Validate `token` against the key for `kind` and return its subject
    pub fn verify(&self, token: &str, kind: KeyKind) -> Result<String, SignerError> {
        let header = decode_header(token).map_err(|_| unparsed_header_error(token))?;
        if !HMAC_ALGORITHMS.contains(&header.alg) {
            debug!(alg = ?header.alg, "Rejected token with non-HMAC algorithm");
            return Err(SignerError::InvalidSignature);
        }

        let data = decode::<Map<String, Value>>(token, &self.keys(kind).decoding, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                    SignerError::InvalidSignature
                }
                _ => SignerError::Malformed,
            })?;
        let claims = data.claims;

        let subject = claims
            .get("email")
            .and_then(Value::as_str)
            .ok_or(SignerError::MissingClaim("email"))?;
        let exp = claims
            .get("exp")
            .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f as i64)))
            .ok_or(SignerError::MissingClaim("exp"))?;

        if self.clock.now().timestamp() > exp {
            return Err(SignerError::Expired);
        }

        Ok(subject.to_string())
    }
}

/// jsonwebtoken only parses algorithms it knows, so `none` and friends fail
/// header decoding. A readable header declaring a foreign `alg` is still an
/// algorithm rejection; anything else is malformed.
fn unparsed_header_error(token: &str) -> SignerError {
    let declared_alg = token
        .split('.')
        .next()
        .and_then(|segment| URL_SAFE_NO_PAD.decode(segment).ok())
        .and_then(|bytes| serde_json::from_slice::<Value>(&bytes).ok())
        .and_then(|header| header.get("alg").and_then(Value::as_str).map(str::to_string));

    match declared_alg {
        Some(alg) if !["HS256", "HS384", "HS512"].contains(&alg.as_str()) => {
            debug!(%alg, "Rejected token with unsupported algorithm");
            SignerError::InvalidSignature
        }
        _ => SignerError::Malformed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::{TimeZone, Utc};

    fn test_keys() -> SignerKeys {
        SignerKeys {
            access: b"access-secret-for-tests".to_vec(),
            refresh: b"refresh-secret-for-tests".to_vec(),
        }
    }

    fn create_test_signer() -> (TokenSigner, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap(),
        ));
        let signer = TokenSigner::new(test_keys(), clock.clone()).unwrap();
        (signer, clock)
    }

    fn sign_raw(header: &str, payload: &Value, secret: &[u8]) -> String {
        let header = URL_SAFE_NO_PAD.encode(header);
        let payload = URL_SAFE_NO_PAD.encode(payload.to_string());
        let signature = jsonwebtoken::crypto::sign(
            format!("{header}.{payload}").as_bytes(),
            &EncodingKey::from_secret(secret),
            Algorithm::HS256,
        )
        .unwrap();
        format!("{header}.{payload}.{signature}")
    }

    #[test]
    fn test_issue_and_verify_both_kinds() {
        let (signer, _clock) = create_test_signer();

        let access = signer.issue_access("a@x.com").unwrap();
        assert_eq!(
            signer.verify(&access.token, KeyKind::Access).unwrap(),
            "a@x.com"
        );

        let refresh = signer.issue_refresh("a@x.com").unwrap();
        assert_eq!(
            signer.verify(&refresh.token, KeyKind::Refresh).unwrap(),
            "a@x.com"
        );
    }

    #[test]
    fn test_access_token_expires_after_fifteen_minutes() {
        let (signer, clock) = create_test_signer();
        let issued_at = clock.now();
        let access = signer.issue_access("a@x.com").unwrap();
        let ttl = Duration::seconds(ACCESS_TOKEN_TTL_SECS);
        assert_eq!(access.expires_at, (issued_at + ttl).timestamp());

        clock.set(issued_at + ttl);
        assert!(signer.verify(&access.token, KeyKind::Access).is_ok());

        clock.advance(Duration::seconds(1));
        assert_eq!(
            signer.verify(&access.token, KeyKind::Access),
            Err(SignerError::Expired)
        );
    }

    #[test]
    fn test_refresh_token_lives_seven_days() {
        let (signer, clock) = create_test_signer();
        let issued_at = clock.now();
        let refresh = signer.issue_refresh("a@x.com").unwrap();

        clock.set(issued_at + Duration::days(6));
        assert!(signer.verify(&refresh.token, KeyKind::Refresh).is_ok());

        clock.set(issued_at + Duration::seconds(REFRESH_TOKEN_TTL_SECS));
        assert!(signer.verify(&refresh.token, KeyKind::Refresh).is_ok());

        clock.set(issued_at + Duration::seconds(REFRESH_TOKEN_TTL_SECS + 1));
        assert_eq!(
            signer.verify(&refresh.token, KeyKind::Refresh),
            Err(SignerError::Expired)
        );
    }

    #[test]
    fn test_keys_are_not_interchangeable() {
        let (signer, _clock) = create_test_signer();

        let access = signer.issue_access("a@x.com").unwrap();
        let refresh = signer.issue_refresh("a@x.com").unwrap();

        assert_eq!(
            signer.verify(&access.token, KeyKind::Refresh),
            Err(SignerError::InvalidSignature)
        );
        assert_eq!(
            signer.verify(&refresh.token, KeyKind::Access),
            Err(SignerError::InvalidSignature)
        );
    }

    #[test]
    fn test_tokens_are_unique_within_one_second() {
        let (signer, _clock) = create_test_signer();
        let first = signer.issue_refresh("a@x.com").unwrap();
        let second = signer.issue_refresh("a@x.com").unwrap();
        assert_ne!(first.token, second.token);
    }

    #[test]
    fn test_non_hmac_algorithm_rejected() {
        let (signer, clock) = create_test_signer();
        let payload = serde_json::json!({
            "email": "a@x.com",
            "exp": clock.now().timestamp() + 600,
        });
        // Valid HMAC signature under the right key, but the header lies about the algorithm.
        for alg in ["RS256", "EdDSA", "none", "None", "HS1"] {
            let token = sign_raw(
                &format!(r#"{{"alg":"{alg}","typ":"JWT"}}"#),
                &payload,
                b"access-secret-for-tests",
            );
            assert_eq!(
                signer.verify(&token, KeyKind::Access),
                Err(SignerError::InvalidSignature),
                "alg {alg}"
            );
        }

        // Unsigned form of the same token.
        let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"none"}"#);
        let body = URL_SAFE_NO_PAD.encode(payload.to_string());
        assert_eq!(
            signer.verify(&format!("{header}.{body}."), KeyKind::Access),
            Err(SignerError::InvalidSignature)
        );
    }

    #[test]
    fn test_unreadable_header_is_malformed() {
        let (signer, _clock) = create_test_signer();
        let body = URL_SAFE_NO_PAD.encode(r#"{"email":"a@x.com"}"#);

        // Header without an algorithm at all
        let no_alg = URL_SAFE_NO_PAD.encode(r#"{"typ":"JWT"}"#);
        assert_eq!(
            signer.verify(&format!("{no_alg}.{body}.sig"), KeyKind::Access),
            Err(SignerError::Malformed)
        );

        let not_json = URL_SAFE_NO_PAD.encode("alg=none");
        assert_eq!(
            signer.verify(&format!("{not_json}.{body}.sig"), KeyKind::Access),
            Err(SignerError::Malformed)
        );
    }

    #[test]
    fn test_garbage_is_malformed() {
        let (signer, _clock) = create_test_signer();
        assert_eq!(
            signer.verify("invalid.token.here", KeyKind::Access),
            Err(SignerError::Malformed)
        );
        assert_eq!(
            signer.verify("", KeyKind::Refresh),
            Err(SignerError::Malformed)
        );
    }

    #[test]
    fn test_missing_or_non_string_subject() {
        let (signer, clock) = create_test_signer();
        let exp = clock.now().timestamp() + 600;

        let no_subject = sign_raw(
            r#"{"alg":"HS256","typ":"JWT"}"#,
            &serde_json::json!({ "exp": exp }),
            b"access-secret-for-tests",
        );
        assert_eq!(
            signer.verify(&no_subject, KeyKind::Access),
            Err(SignerError::MissingClaim("email"))
        );

        let numeric_subject = sign_raw(
            r#"{"alg":"HS256","typ":"JWT"}"#,
            &serde_json::json!({ "email": 42, "exp": exp }),
            b"access-secret-for-tests",
        );
        assert_eq!(
            signer.verify(&numeric_subject, KeyKind::Access),
            Err(SignerError::MissingClaim("email"))
        );
    }

    #[test]
    fn test_missing_expiry_rejected() {
        let (signer, _clock) = create_test_signer();
        let token = sign_raw(
            r#"{"alg":"HS256","typ":"JWT"}"#,
            &serde_json::json!({ "email": "a@x.com" }),
            b"refresh-secret-for-tests",
        );
        assert_eq!(
            signer.verify(&token, KeyKind::Refresh),
            Err(SignerError::MissingClaim("exp"))
        );
    }

    #[test]
    fn test_other_hmac_variants_accepted() {
        let (signer, clock) = create_test_signer();
        let claims = Claims {
            email: "a@x.com".to_string(),
            exp: clock.now().timestamp() + 60,
            iat: clock.now().timestamp(),
            jti: "fixed".to_string(),
        };
        let token = encode(
            &Header::new(Algorithm::HS512),
            &claims,
            &EncodingKey::from_secret(b"access-secret-for-tests"),
        )
        .unwrap();

        assert_eq!(signer.verify(&token, KeyKind::Access).unwrap(), "a@x.com");
    }

    #[test]
    fn test_rejects_bad_key_configuration() {
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(Utc::now()));

        let same = SignerKeys {
            access: b"same".to_vec(),
            refresh: b"same".to_vec(),
        };
        assert!(TokenSigner::new(same, clock.clone()).is_err());

        let empty = SignerKeys {
            access: Vec::new(),
            refresh: b"refresh".to_vec(),
        };
        assert!(TokenSigner::new(empty, clock).is_err());
    }

    #[test]
    fn test_debug_redacts_keys() {
        let rendered = format!("{:?}", test_keys());
        assert!(!rendered.contains("access-secret-for-tests"));
        assert!(rendered.contains("<redacted>"));
    }
}

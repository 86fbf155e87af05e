//! Session token generation and validation
//!
//! Implements the signed-token codec with HMAC-SHA256. Access and refresh
//! tokens share one claim layout and differ only in the `type` claim and
//! their lifetime. The codec is stateless; revocation lives elsewhere.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use pacta_core::PactaError;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use uuid::Uuid;

/// Token kind embedded in the `type` claim.
///
/// An access token authorizes API calls directly; a refresh token is only
/// ever exchanged for a new token pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Access => write!(f, "access"),
            Self::Refresh => write!(f, "refresh"),
        }
    }
}

/// Claims embedded in every session token.
///
/// All fields are required; a token missing any of them fails decoding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject - user ID
    pub sub: String,
    /// Unique token identifier, minted per issuance (revocation key)
    pub jti: String,
    /// Issued at timestamp (Unix epoch seconds)
    pub iat: u64,
    /// Expiration timestamp (Unix epoch seconds)
    pub exp: u64,
    /// Token kind (access or refresh)
    #[serde(rename = "type")]
    pub kind: TokenKind,
}

/// Token generation and validation errors
#[derive(Debug, Error)]
pub enum JwtError {
    #[error("Failed to encode token: {0}")]
    EncodingError(#[from] jsonwebtoken::errors::Error),

    #[error("Invalid token format")]
    InvalidToken,

    #[error("Token has expired")]
    ExpiredToken,

    #[error("Invalid token signature")]
    InvalidSignature,

    #[error("Wrong token type: expected {expected}")]
    WrongKind { expected: TokenKind },

    #[error("System time error: {0}")]
    SystemTimeError(#[from] std::time::SystemTimeError),
}

impl From<JwtError> for PactaError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::EncodingError(e) => PactaError::Internal(format!("token encoding: {e}")),
            JwtError::SystemTimeError(e) => PactaError::Internal(format!("system time: {e}")),
            other => PactaError::invalid_token(other.to_string()),
        }
    }
}

/// Token signing configuration
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Secret key for HMAC signing (must be at least 256 bits)
    pub secret: String,
    /// Access token lifetime in seconds
    pub access_ttl_secs: u64,
    /// Refresh token lifetime in seconds
    pub refresh_ttl_secs: u64,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: "development-secret-key-change-in-production".to_string(),
            access_ttl_secs: 900,      // 15 minutes
            refresh_ttl_secs: 604_800, // 7 days
        }
    }
}

impl JwtConfig {
    pub fn from_app_config(auth: &pacta_core::AuthConfig) -> Self {
        Self {
            secret: auth.secret.clone(),
            access_ttl_secs: auth.access_token_ttl_secs,
            refresh_ttl_secs: auth.refresh_token_ttl_secs,
        }
    }

    fn ttl(&self, kind: TokenKind) -> u64 {
        match kind {
            TokenKind::Access => self.access_ttl_secs,
            TokenKind::Refresh => self.refresh_ttl_secs,
        }
    }
}

/// A freshly issued token plus the bookkeeping the caller needs.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// Encoded, signed token
    pub token: String,
    /// The token's unique identifier
    pub jti: String,
    /// Lifetime in seconds, for cache TTLs and client `expires_in` fields
    pub expires_in: u64,
}

fn unix_now() -> Result<u64, JwtError> {
    Ok(SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs())
}

/// Issue a signed token of the given kind for a subject.
///
/// Mints a fresh `jti` per call; two tokens issued for the same subject in
/// the same second still get distinct identifiers.
pub fn issue_token(
    config: &JwtConfig,
    subject: &str,
    kind: TokenKind,
) -> Result<IssuedToken, JwtError> {
    let now = unix_now()?;
    let expires_in = config.ttl(kind);

    let claims = Claims {
        sub: subject.to_string(),
        jti: Uuid::new_v4().to_string(),
        iat: now,
        exp: now + expires_in,
        kind,
    };

    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )?;

    Ok(IssuedToken {
        token,
        jti: claims.jti,
        expires_in,
    })
}

/// Validate a token's signature, shape, kind, and expiry, returning its claims.
///
/// Expiry is strict: a token whose `exp` equals the current second is
/// already expired.
pub fn decode_token(
    config: &JwtConfig,
    token: &str,
    expected_kind: TokenKind,
) -> Result<Claims, JwtError> {
    let claims = decode_claims(config, token, expected_kind)?;

    if claims.exp <= unix_now()? {
        return Err(JwtError::ExpiredToken);
    }

    Ok(claims)
}

/// Like [`decode_token`] but tolerates an expired token.
///
/// Used only by sign-out, where an expired token simply yields a zero
/// remaining TTL. Signature, shape, and kind checks still apply.
pub fn decode_token_allow_expired(
    config: &JwtConfig,
    token: &str,
    expected_kind: TokenKind,
) -> Result<Claims, JwtError> {
    decode_claims(config, token, expected_kind)
}

fn decode_claims(
    config: &JwtConfig,
    token: &str,
    expected_kind: TokenKind,
) -> Result<Claims, JwtError> {
    let mut validation = Validation::new(Algorithm::HS256);
    // Expiry is checked by hand for the strict boundary; jsonwebtoken's
    // check treats `exp == now` as still valid.
    validation.validate_exp = false;
    validation.required_spec_claims.clear();
    validation.leeway = 0;

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &validation,
    )
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::InvalidSignature => JwtError::InvalidSignature,
        _ => JwtError::InvalidToken,
    })?;

    if token_data.claims.kind != expected_kind {
        return Err(JwtError::WrongKind {
            expected: expected_kind,
        });
    }

    Ok(token_data.claims)
}

/// Remaining validity of a token in seconds, computed at call time.
///
/// Zero for an already-expired token. This is the blacklist TTL: the
/// protection window only needs to cover the time the token would
/// otherwise still be accepted.
pub fn remaining_ttl(claims: &Claims) -> u64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(u64::MAX);
    claims.exp.saturating_sub(now)
}

//! Session lifecycle service
//!
//! Drives sign-up, sign-in, validation, refresh, and sign-out over the
//! token codec, the revocation store, and the user store. The service
//! keeps no state of its own; every instance of the API is
//! interchangeable and correctness rests on the revocation store's
//! per-key atomicity.

use super::jwt::{
    decode_token, decode_token_allow_expired, issue_token, remaining_ttl, JwtConfig, TokenKind,
};
use super::models::{NewUser, User};
use super::password::{hash_password, validate_password_strength, verify_password};
use super::repository::UserStore;
use super::revocation::RevocationStore;
use pacta_core::{PactaError, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Sign-up request
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct SignUpRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 2, max = 64))]
    pub username: String,
    #[validate(length(min = 8, max = 72))]
    pub password: String,
}

/// Sign-in request
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct SignInRequest {
    #[validate(email)]
    pub email: String,
    pub password: String,
}

/// Result of a successful sign-in.
///
/// The refresh token is handed to the transport layer for cookie
/// delivery; it is never part of a JSON body.
#[derive(Debug, Clone)]
pub struct SignedIn {
    pub user: User,
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds
    pub expires_in: u64,
    /// Refresh token lifetime in seconds, for the cookie's max-age
    pub refresh_expires_in: u64,
}

/// Result of a successful refresh: a fully rotated token pair.
#[derive(Debug, Clone)]
pub struct RefreshedTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: u64,
    pub refresh_expires_in: u64,
}

/// Authenticated identity resolved from an access token.
#[derive(Debug, Clone)]
pub struct ValidatedAccess {
    pub user_id: Uuid,
    pub jti: String,
}

/// Session lifecycle service.
///
/// Explicitly constructed with its collaborators; nothing here reads
/// process-wide state.
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserStore>,
    revocation: Arc<dyn RevocationStore>,
    jwt: JwtConfig,
    /// Behavior of `validate` when the revocation store cannot answer:
    /// reject (false, the default) or accept without the check (true).
    revocation_fail_open: bool,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserStore>,
        revocation: Arc<dyn RevocationStore>,
        jwt: JwtConfig,
        revocation_fail_open: bool,
    ) -> Self {
        Self {
            users,
            revocation,
            jwt,
            revocation_fail_open,
        }
    }

    /// Register a new user.
    pub async fn sign_up(&self, request: SignUpRequest) -> Result<User> {
        validate_password_strength(&request.password).map_err(PactaError::Validation)?;

        let password_hash = hash_password(&request.password)?;

        let user = self
            .users
            .create(NewUser {
                email: request.email,
                username: request.username,
                password_hash,
            })
            .await?;

        tracing::info!(user_id = %user.id, "new user registered");
        Ok(user)
    }

    /// Authenticate credentials and open a session.
    ///
    /// Issues an access/refresh pair and registers the refresh token as
    /// the subject's single active one. If that registration fails the
    /// whole sign-in fails: a refresh token whose revocation state cannot
    /// be tracked must never reach a client.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<SignedIn> {
        let user = match self.users.get_by_email(email).await? {
            Some(user) => user,
            None => {
                tracing::debug!(email, "sign-in for unknown email");
                return Err(PactaError::InvalidCredentials);
            }
        };

        if !verify_password(password, &user.password_hash)? {
            tracing::debug!(user_id = %user.id, "sign-in with wrong password");
            return Err(PactaError::InvalidCredentials);
        }

        let subject = user.id.to_string();
        let access = issue_token(&self.jwt, &subject, TokenKind::Access)?;
        let refresh = issue_token(&self.jwt, &subject, TokenKind::Refresh)?;

        self.revocation
            .set_active_refresh(&subject, &refresh.jti, refresh.expires_in)
            .await?;

        tracing::info!(user_id = %user.id, "user signed in");
        Ok(SignedIn {
            user,
            access_token: access.token,
            refresh_token: refresh.token,
            expires_in: access.expires_in,
            refresh_expires_in: refresh.expires_in,
        })
    }

    /// Validate an access token for request authentication.
    ///
    /// Returns the subject and token id so callers can authorize resource
    /// ownership downstream without re-running the protocol.
    pub async fn validate(&self, access_token: &str) -> Result<ValidatedAccess> {
        let claims = decode_token(&self.jwt, access_token, TokenKind::Access)?;

        match self.revocation.is_blacklisted(&claims.jti).await {
            Ok(true) => {
                tracing::debug!(jti = %claims.jti, "revoked access token presented");
                return Err(PactaError::invalid_token("token revoked"));
            }
            Ok(false) => {}
            Err(err @ PactaError::CacheUnavailable { .. }) => {
                if self.revocation_fail_open {
                    tracing::warn!(
                        jti = %claims.jti,
                        "revocation store down, accepting token unchecked (fail-open)"
                    );
                } else {
                    return Err(err);
                }
            }
            Err(err) => return Err(err),
        }

        let user_id = Uuid::parse_str(&claims.sub)
            .map_err(|_| PactaError::invalid_token("malformed subject"))?;

        Ok(ValidatedAccess {
            user_id,
            jti: claims.jti,
        })
    }

    /// Close the session belonging to an access token.
    ///
    /// Blacklists the token for exactly its remaining validity window and
    /// drops the subject's active refresh registration. Safe to call
    /// twice with the same token; an already-expired token skips the
    /// blacklist write since no protection window remains.
    pub async fn sign_out(&self, access_token: &str) -> Result<()> {
        let claims = decode_token_allow_expired(&self.jwt, access_token, TokenKind::Access)?;

        let ttl = remaining_ttl(&claims);
        if ttl > 0 {
            self.revocation.blacklist(&claims.jti, ttl).await?;
        }

        self.revocation.clear_active_refresh(&claims.sub).await?;

        tracing::info!(user_id = %claims.sub, "user signed out");
        Ok(())
    }

    /// Exchange a refresh token for a new token pair.
    ///
    /// Only the subject's single registered refresh token is accepted; a
    /// token superseded by a later sign-in or refresh is rejected even
    /// though its signature still verifies. On success the pair is rotated:
    /// the presented token's id no longer matches the registry and can
    /// never be used again.
    pub async fn refresh(&self, refresh_token: &str) -> Result<RefreshedTokens> {
        let claims = decode_token(&self.jwt, refresh_token, TokenKind::Refresh)?;

        let stored = self.revocation.get_active_refresh(&claims.sub).await?;
        if stored.as_deref() != Some(claims.jti.as_str()) {
            tracing::debug!(user_id = %claims.sub, "superseded or revoked refresh token presented");
            return Err(PactaError::invalid_token(
                "refresh token superseded or revoked",
            ));
        }

        let user_id = Uuid::parse_str(&claims.sub)
            .map_err(|_| PactaError::invalid_token("malformed subject"))?;
        if self.users.get_by_id(user_id).await?.is_none() {
            return Err(PactaError::ResourceNotFound("User".to_string()));
        }

        let access = issue_token(&self.jwt, &claims.sub, TokenKind::Access)?;
        let refresh = issue_token(&self.jwt, &claims.sub, TokenKind::Refresh)?;

        self.revocation
            .set_active_refresh(&claims.sub, &refresh.jti, refresh.expires_in)
            .await?;

        tracing::info!(user_id = %claims.sub, "token pair rotated");
        Ok(RefreshedTokens {
            access_token: access.token,
            refresh_token: refresh.token,
            expires_in: access.expires_in,
            refresh_expires_in: refresh.expires_in,
        })
    }

    /// Fetch a user record for an authenticated subject.
    pub async fn get_user(&self, user_id: Uuid) -> Result<User> {
        self.users
            .get_by_id(user_id)
            .await?
            .ok_or_else(|| PactaError::ResourceNotFound("User".to_string()))
    }
}

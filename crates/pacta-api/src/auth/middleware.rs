//! Request authentication gate
//!
//! Layered onto the protected route group. Validates the bearer access
//! token once per request and parks the resolved identity in request
//! extensions so handlers (including the document and query subsystems)
//! can authorize resource ownership without re-running the token
//! protocol.

use super::service::AuthService;
use crate::state::AppState;
use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use pacta_core::PactaError;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Identity resolved by the gate for the current request.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    /// Authenticated subject
    pub user_id: Uuid,
    /// The validated access token's id, for sign-out and auditing
    pub jti: String,
}

/// Gate failures.
///
/// Everything token-shaped collapses into one unauthorized response;
/// infrastructure trouble becomes a generic 503 so internals never leak
/// through an auth failure.
#[derive(Debug, Error)]
pub enum GateError {
    #[error("Missing Authorization header")]
    MissingAuthHeader,

    #[error("Invalid Authorization header format")]
    InvalidAuthHeader,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Authentication service unavailable")]
    Unavailable,
}

impl IntoResponse for GateError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            GateError::MissingAuthHeader => {
                (StatusCode::UNAUTHORIZED, "Missing Authorization header")
            }
            GateError::InvalidAuthHeader => (
                StatusCode::UNAUTHORIZED,
                "Invalid Authorization header format",
            ),
            GateError::InvalidToken => (StatusCode::UNAUTHORIZED, "Invalid or expired token"),
            GateError::Unavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Authentication service temporarily unavailable",
            ),
        };

        let body = serde_json::json!({
            "code": if status == StatusCode::UNAUTHORIZED { "INVALID_TOKEN" } else { "SERVICE_UNAVAILABLE" },
            "message": message,
        });

        let mut response = (status, Json(body)).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

/// Pull the bearer credential out of the standard header.
pub fn bearer_token(request: &Request<Body>) -> Result<&str, GateError> {
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .ok_or(GateError::MissingAuthHeader)?
        .to_str()
        .map_err(|_| GateError::InvalidAuthHeader)?;

    auth_header
        .strip_prefix("Bearer ")
        .ok_or(GateError::InvalidAuthHeader)
}

/// Authentication middleware for the protected route group.
///
/// Pre-flight requests pass through untouched; everything else must carry
/// a valid, unrevoked bearer access token.
pub async fn auth_gate(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, GateError> {
    if request.method() == Method::OPTIONS {
        return Ok(next.run(request).await);
    }

    let token = bearer_token(&request)?;

    let validated = validate_with(&state.auth, token).await?;
    request.extensions_mut().insert(CurrentUser {
        user_id: validated.user_id,
        jti: validated.jti,
    });

    Ok(next.run(request).await)
}

async fn validate_with(
    auth: &AuthService,
    token: &str,
) -> Result<super::service::ValidatedAccess, GateError> {
    match auth.validate(token).await {
        Ok(validated) => Ok(validated),
        Err(PactaError::InvalidToken { reason }) => {
            tracing::debug!(%reason, "rejected bearer token");
            Err(GateError::InvalidToken)
        }
        Err(err) => {
            tracing::error!(error = %err, "authentication gate failure");
            Err(GateError::Unavailable)
        }
    }
}

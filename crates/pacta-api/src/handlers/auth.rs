//! Authentication API handlers
//!
//! The refresh token only ever travels in an HttpOnly cookie scoped to
//! the refresh endpoint; the access token travels in response bodies and
//! comes back as a bearer credential.

use crate::auth::middleware::{bearer_token, CurrentUser};
use crate::auth::{SignInRequest, SignUpRequest, UserPublic};
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

const REFRESH_COOKIE: &str = "refresh_token";
const REFRESH_COOKIE_PATH: &str = "/api/v1/auth/refresh";

/// Sign-in response: user record plus the access token
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SignInResponse {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub created_at: DateTime<Utc>,
    pub access_token: String,
    pub token_type: String,
    /// Access token lifetime in seconds
    pub expires_in: u64,
}

/// Refresh response: a fresh access token (the refresh token rides the cookie)
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
}

/// Generic message response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

fn set_refresh_cookie(value: &str, max_age_secs: u64, secure: bool) -> HeaderValue {
    let secure_attr = if secure { "; Secure" } else { "" };
    let cookie = format!(
        "{REFRESH_COOKIE}={value}; Max-Age={max_age_secs}; Path={REFRESH_COOKIE_PATH}; \
         HttpOnly; SameSite=Lax{secure_attr}"
    );
    HeaderValue::from_str(&cookie).expect("cookie value is ascii")
}

fn clear_refresh_cookie() -> HeaderValue {
    HeaderValue::from_str(&format!(
        "{REFRESH_COOKIE}=; Max-Age=0; Path={REFRESH_COOKIE_PATH}; HttpOnly; SameSite=Lax"
    ))
    .expect("cookie value is ascii")
}

fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(header::COOKIE)?
        .to_str()
        .ok()?
        .split(';')
        .find_map(|pair| {
            let (key, value) = pair.trim().split_once('=')?;
            (key == name).then(|| value.to_string())
        })
}

/// Register a new user account
#[utoipa::path(
    post,
    path = "/api/v1/auth/sign_up",
    tag = "auth",
    request_body = SignUpRequest,
    responses(
        (status = 201, description = "User registered", body = UserPublic),
        (status = 400, description = "Invalid input", body = crate::error::ApiError),
        (status = 409, description = "Email or username taken", body = crate::error::ApiError),
    )
)]
pub async fn sign_up_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SignUpRequest>,
) -> Result<impl IntoResponse, AppError> {
    request
        .validate()
        .map_err(|e| AppError::validation(e.to_string()))?;

    let user = state.auth.sign_up(request).await?;

    Ok((StatusCode::CREATED, Json(user.public())))
}

/// Sign in with email and password
#[utoipa::path(
    post,
    path = "/api/v1/auth/sign_in",
    tag = "auth",
    request_body = SignInRequest,
    responses(
        (status = 200, description = "Signed in", body = SignInResponse),
        (status = 401, description = "Invalid credentials", body = crate::error::ApiError),
    )
)]
pub async fn sign_in_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SignInRequest>,
) -> Result<Response, AppError> {
    request
        .validate()
        .map_err(|e| AppError::validation(e.to_string()))?;

    let signed_in = state.auth.sign_in(&request.email, &request.password).await?;

    let cookie = set_refresh_cookie(
        &signed_in.refresh_token,
        signed_in.refresh_expires_in,
        state.config.auth.secure_cookies,
    );

    let body = SignInResponse {
        id: signed_in.user.id,
        email: signed_in.user.email,
        username: signed_in.user.username,
        created_at: signed_in.user.created_at,
        access_token: signed_in.access_token,
        token_type: "bearer".to_string(),
        expires_in: signed_in.expires_in,
    };

    Ok(([(header::SET_COOKIE, cookie)], Json(body)).into_response())
}

/// Sign out the current session
///
/// The refresh cookie is cleared whether or not revocation succeeds; the
/// client has no business keeping it either way.
#[utoipa::path(
    post,
    path = "/api/v1/auth/sign_out",
    tag = "auth",
    responses(
        (status = 200, description = "Signed out", body = MessageResponse),
        (status = 401, description = "Invalid token", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn sign_out_handler(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
) -> Response {
    let token = match bearer_token(&request) {
        Ok(token) => token,
        Err(gate_err) => {
            let mut response = gate_err.into_response();
            response
                .headers_mut()
                .append(header::SET_COOKIE, clear_refresh_cookie());
            return response;
        }
    };

    let mut response = match state.auth.sign_out(token).await {
        Ok(()) => Json(MessageResponse {
            message: "Successfully signed out".to_string(),
        })
        .into_response(),
        Err(err) => AppError::from(err).into_response(),
    };

    response
        .headers_mut()
        .append(header::SET_COOKIE, clear_refresh_cookie());
    response
}

/// Exchange the refresh cookie for a new token pair
#[utoipa::path(
    post,
    path = "/api/v1/auth/refresh",
    tag = "auth",
    responses(
        (status = 200, description = "Tokens rotated", body = TokenResponse),
        (status = 401, description = "Missing, expired, or superseded refresh token", body = crate::error::ApiError),
    )
)]
pub async fn refresh_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let refresh_token = cookie_value(&headers, REFRESH_COOKIE)
        .ok_or_else(|| pacta_core::PactaError::invalid_token("refresh cookie missing"))?;

    let rotated = state.auth.refresh(&refresh_token).await?;

    let cookie = set_refresh_cookie(
        &rotated.refresh_token,
        rotated.refresh_expires_in,
        state.config.auth.secure_cookies,
    );

    let body = TokenResponse {
        access_token: rotated.access_token,
        token_type: "bearer".to_string(),
        expires_in: rotated.expires_in,
    };

    Ok(([(header::SET_COOKIE, cookie)], Json(body)).into_response())
}

/// Get the current user's profile
#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    tag = "auth",
    responses(
        (status = 200, description = "Current user", body = UserPublic),
        (status = 401, description = "Unauthorized", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn me_handler(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
) -> Result<impl IntoResponse, AppError> {
    let user = state.auth.get_user(current.user_id).await?;
    Ok(Json(user.public()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refresh_cookie_attributes() {
        let cookie = set_refresh_cookie("tok", 604_800, false);
        let value = cookie.to_str().unwrap();

        assert!(value.starts_with("refresh_token=tok"));
        assert!(value.contains("HttpOnly"));
        assert!(value.contains("Max-Age=604800"));
        assert!(value.contains("Path=/api/v1/auth/refresh"));
        assert!(value.contains("SameSite=Lax"));
        assert!(!value.contains("Secure"));

        let secure = set_refresh_cookie("tok", 60, true);
        assert!(secure.to_str().unwrap().contains("Secure"));
    }

    #[test]
    fn test_clear_cookie_expires_immediately() {
        let cookie = clear_refresh_cookie();
        let value = cookie.to_str().unwrap();
        assert!(value.starts_with("refresh_token=;"));
        assert!(value.contains("Max-Age=0"));
    }

    #[test]
    fn test_cookie_value_parsing() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; refresh_token=abc.def; lang=en"),
        );

        assert_eq!(
            cookie_value(&headers, "refresh_token"),
            Some("abc.def".to_string())
        );
        assert_eq!(cookie_value(&headers, "session"), None);
        assert_eq!(cookie_value(&HeaderMap::new(), "refresh_token"), None);
    }
}

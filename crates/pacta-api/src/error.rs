//! API error handling
//!
//! One mapping table from the core taxonomy to transport status codes.
//! Token failures all look the same from outside; database and internal
//! failures surface as a bare 500 with details only in the logs.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use pacta_core::PactaError;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// API error response body
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// Stable machine-readable code
    pub code: String,
    /// Human-readable message
    pub message: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Application error as it crosses the HTTP boundary.
#[derive(Debug)]
pub struct AppError(pub PactaError);

impl From<PactaError> for AppError {
    fn from(err: PactaError) -> Self {
        Self(err)
    }
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self(PactaError::Validation(message.into()))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error) = match self.0 {
            PactaError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                ApiError::new("VALIDATION_ERROR", msg),
            ),
            PactaError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                ApiError::new("INVALID_CREDENTIALS", "Invalid email or password"),
            ),
            PactaError::InvalidToken { reason } => {
                tracing::debug!(%reason, "invalid token surfaced to client");
                (
                    StatusCode::UNAUTHORIZED,
                    ApiError::new("INVALID_TOKEN", "Invalid or expired token"),
                )
            }
            PactaError::UserAlreadyExists { field } => (
                StatusCode::CONFLICT,
                ApiError::new("USER_ALREADY_EXISTS", format!("User with this {field} already exists")),
            ),
            PactaError::ResourceNotFound(what) => (
                StatusCode::NOT_FOUND,
                ApiError::new("RESOURCE_NOT_FOUND", format!("{what} not found")),
            ),
            PactaError::CacheUnavailable { operation } => {
                tracing::error!(%operation, "cache unavailable");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    ApiError::new("SERVICE_UNAVAILABLE", "Service temporarily unavailable"),
                )
            }
            PactaError::Database(detail) => {
                tracing::error!(%detail, "database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiError::new("INTERNAL_ERROR", "Internal server error"),
                )
            }
            PactaError::Internal(detail) => {
                tracing::error!(%detail, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiError::new("INTERNAL_ERROR", "Internal server error"),
                )
            }
            PactaError::Other(err) => {
                tracing::error!(error = %err, "unexpected error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiError::new("INTERNAL_ERROR", "Internal server error"),
                )
            }
        };

        (status, Json(error)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: PactaError) -> StatusCode {
        AppError(err).into_response().status()
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_of(PactaError::InvalidCredentials),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_of(PactaError::invalid_token("revoked")),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_of(PactaError::UserAlreadyExists {
                field: "email".to_string()
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(PactaError::ResourceNotFound("User".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(PactaError::cache_unavailable("blacklist")),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_of(PactaError::Database("boom".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    async fn body_of(err: PactaError) -> String {
        let response = AppError(err).into_response();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_internal_detail_not_leaked() {
        let body = body_of(PactaError::Database("password=hunter2".to_string())).await;
        assert!(!body.contains("hunter2"));
        assert!(body.contains("INTERNAL_ERROR"));
    }

    #[tokio::test]
    async fn test_token_reason_not_leaked() {
        let body = body_of(PactaError::invalid_token("superseded by jti 1234")).await;
        assert!(!body.contains("superseded"));
        assert!(body.contains("INVALID_TOKEN"));
    }
}

//! Pacta Core - Shared error taxonomy and configuration
//!
//! This crate defines the abstractions shared across the Pacta backend:
//! - The closed error taxonomy for the auth/session protocol
//! - Configuration management

pub mod config;

pub use config::{AppConfig, AuthConfig, ConfigError, DatabaseConfig, LoggingConfig, ServerConfig};

use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Closed error taxonomy for Pacta operations.
///
/// Every failure the session protocol can surface maps to exactly one of
/// these variants; the HTTP layer owns the single variant-to-status mapping.
/// `InvalidCredentials` deliberately covers both "no such user" and "wrong
/// password" so callers cannot enumerate accounts; the distinction is only
/// ever logged.
#[derive(Error, Debug)]
pub enum PactaError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Invalid or expired token: {reason}")]
    InvalidToken { reason: String },

    #[error("User already exists: {field} is taken")]
    UserAlreadyExists { field: String },

    #[error("{0} not found")]
    ResourceNotFound(String),

    #[error("Cache unavailable during {operation}")]
    CacheUnavailable { operation: String },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PactaError {
    /// Build an `InvalidToken` with an internal reason.
    ///
    /// The reason is for server-side logs; clients always see the same
    /// generic message regardless of which token check failed.
    pub fn invalid_token(reason: impl Into<String>) -> Self {
        Self::InvalidToken {
            reason: reason.into(),
        }
    }

    pub fn cache_unavailable(operation: impl Into<String>) -> Self {
        Self::CacheUnavailable {
            operation: operation.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PactaError>;

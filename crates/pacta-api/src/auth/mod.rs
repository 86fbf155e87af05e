//! Authentication and session lifecycle
//!
//! Components:
//! - Token codec: signed access/refresh tokens with embedded claims
//! - Password hashing with Argon2
//! - Revocation store: blacklist + single-active-refresh registry
//! - User storage
//! - Session service driving sign-in, sign-out, refresh, validation
//! - Request gate for protected routes

pub mod jwt;
pub mod middleware;
pub mod models;
pub mod password;
pub mod repository;
pub mod revocation;
pub mod service;

pub use jwt::{
    decode_token, decode_token_allow_expired, issue_token, remaining_ttl, Claims, IssuedToken,
    JwtConfig, JwtError, TokenKind,
};
pub use middleware::{auth_gate, CurrentUser, GateError};
pub use models::{NewUser, User, UserPublic};
pub use password::{hash_password, validate_password_strength, verify_password};
pub use repository::{PostgresUserStore, UserStore};
pub use revocation::{MemoryRevocationStore, RedisRevocationStore, RevocationStore};
pub use service::{
    AuthService, RefreshedTokens, SignInRequest, SignUpRequest, SignedIn, ValidatedAccess,
};

#[cfg(any(test, feature = "test-utils"))]
pub use repository::MemoryUserStore;
#[cfg(any(test, feature = "test-utils"))]
pub use revocation::FlakyRevocationStore;

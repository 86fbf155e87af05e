//! API route definitions
//!
//! The split between the two groups below is the protected-route set:
//! everything in `protected_routes` sits behind the authentication gate,
//! everything in `public_routes` does not.

use crate::auth::middleware::auth_gate;
use crate::handlers::auth;
use crate::state::AppState;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

/// Create API v1 routes
pub fn api_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/auth/sign_up", post(auth::sign_up_handler))
        .route("/auth/sign_in", post(auth::sign_in_handler))
        // Refresh authenticates with the cookie, not a bearer token
        .route("/auth/refresh", post(auth::refresh_handler));

    // Protected routes (valid bearer access token required)
    let protected_routes = Router::new()
        .route("/auth/sign_out", post(auth::sign_out_handler))
        .route("/auth/me", get(auth::me_handler))
        .layer(middleware::from_fn_with_state(state, auth_gate));

    Router::new().merge(public_routes).merge(protected_routes)
}

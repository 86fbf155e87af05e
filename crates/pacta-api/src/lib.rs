//! Pacta API - REST server
//!
//! HTTP surface for the Pacta contract-intelligence backend. This crate
//! owns authentication and session lifecycle; document and query
//! handlers consume the identity the gate resolves per request.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

use axum::{
    http::{header, HeaderValue, Method},
    routing::get,
    Router,
};
use pacta_core::AppConfig;
use state::AppState;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health::health_check,
        handlers::auth::sign_up_handler,
        handlers::auth::sign_in_handler,
        handlers::auth::sign_out_handler,
        handlers::auth::refresh_handler,
        handlers::auth::me_handler,
    ),
    components(schemas(
        auth::SignUpRequest,
        auth::SignInRequest,
        auth::UserPublic,
        handlers::auth::SignInResponse,
        handlers::auth::TokenResponse,
        handlers::auth::MessageResponse,
        error::ApiError,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "Authentication and session lifecycle"),
        (name = "health", description = "Service health"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Build the full application router.
pub fn create_router(state: Arc<AppState>) -> Router {
    let router = Router::new()
        .route("/health", get(handlers::health::health_check))
        .nest("/api/v1", routes::api_routes(state.clone()))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http());

    let router = match cors_layer(&state.config) {
        Some(cors) => router.layer(cors),
        None => router,
    };

    router.with_state(state)
}

fn cors_layer(config: &AppConfig) -> Option<CorsLayer> {
    if !config.server.cors_enabled || config.server.cors_origins.is_empty() {
        return None;
    }

    let origins: Vec<HeaderValue> = config
        .server
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    // Credentials because the refresh token rides a cookie; that rules
    // out wildcard origins.
    Some(
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .allow_credentials(true),
    )
}

/// Router wired to in-memory stores, for tests and local experiments.
#[cfg(any(test, feature = "test-utils"))]
pub fn create_router_for_testing() -> Router {
    create_router_with_stores(
        Arc::new(auth::MemoryUserStore::new()),
        Arc::new(auth::MemoryRevocationStore::new()),
    )
}

/// Router over explicit store implementations with a fixed test secret.
#[cfg(any(test, feature = "test-utils"))]
pub fn create_router_with_stores(
    users: Arc<dyn auth::UserStore>,
    revocation: Arc<dyn auth::RevocationStore>,
) -> Router {
    let mut config = AppConfig::default();
    config.auth.secret = "integration-test-secret".to_string();

    let state = Arc::new(AppState::new(config, users, revocation));
    create_router(state)
}

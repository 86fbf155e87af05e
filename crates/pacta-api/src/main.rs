//! Pacta API Server
//!
//! REST API server for the Pacta contract-intelligence backend.

use pacta_api::auth::{
    MemoryRevocationStore, PostgresUserStore, RedisRevocationStore, RevocationStore,
};
use pacta_api::{create_router, state::AppState};
use pacta_core::config::AppConfig;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pacta_api=debug,tower_http=debug".into()),
        )
        .init();

    // Load configuration
    let config = AppConfig::from_env()?;
    let addr = format!("{}:{}", config.server.host, config.server.port);

    // User store
    let pool = PgPoolOptions::new()
        .max_connections(config.database.postgres_pool_size)
        .connect(&config.database.postgres_url)
        .await?;
    let users = Arc::new(PostgresUserStore::new(pool));

    // Revocation store: Redis when configured, otherwise in-process
    let revocation: Arc<dyn RevocationStore> = match &config.database.redis_url {
        Some(url) => {
            let store =
                RedisRevocationStore::connect(url, config.database.redis_prefix.clone()).await?;
            tracing::info!("revocation store: redis");
            Arc::new(store)
        }
        None => {
            tracing::warn!(
                "REDIS_URL not set, using in-process revocation store; \
                 revocations will not be shared across instances"
            );
            Arc::new(MemoryRevocationStore::new())
        }
    };

    // Create application state and router
    let state = Arc::new(AppState::new(config, users, revocation));
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Pacta API Server starting on http://{}", addr);
    tracing::info!("Swagger UI available at http://{}/swagger-ui/", addr);
    tracing::info!("OpenAPI spec at http://{}/api-docs/openapi.json", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

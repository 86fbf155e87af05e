//! Application state management

use crate::auth::{AuthService, JwtConfig, RevocationStore, UserStore};
use pacta_core::config::AppConfig;
use std::sync::Arc;
use std::time::Instant;

/// Application state shared across handlers
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,
    /// Session lifecycle service
    pub auth: AuthService,
    /// Server start time
    pub start_time: Instant,
}

impl AppState {
    /// Assemble state from explicitly constructed collaborators.
    pub fn new(
        config: AppConfig,
        users: Arc<dyn UserStore>,
        revocation: Arc<dyn RevocationStore>,
    ) -> Self {
        let auth = AuthService::new(
            users,
            revocation,
            JwtConfig::from_app_config(&config.auth),
            config.auth.revocation_fail_open,
        );

        Self {
            config,
            auth,
            start_time: Instant::now(),
        }
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

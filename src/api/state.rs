//! Application state shared by every handler.

use std::sync::Arc;

use crate::config::Config;
use crate::errors::AppResult;
use crate::infra::{Database, Mailer, RateLimiter};
use crate::services::{ServiceContainer, Services};

/// Application state (DI container).
#[derive(Clone)]
pub struct AppState {
    /// Use cases
    pub services: Arc<dyn ServiceContainer>,
    /// Fixed-window request counter
    pub rate_limiter: Arc<dyn RateLimiter>,
    /// Database connection, for health checks
    pub database: Arc<Database>,
}

impl AppState {
    /// Wire the production services over `database`.
    pub fn from_config(
        database: Arc<Database>,
        rate_limiter: Arc<dyn RateLimiter>,
        mailer: Arc<dyn Mailer>,
        config: Config,
    ) -> AppResult<Self> {
        let services = Services::from_connection(database.get_connection(), config, mailer)?;

        Ok(Self {
            services: Arc::new(services),
            rate_limiter,
            database,
        })
    }

    /// State with injected services, used by router tests.
    pub fn new(
        services: Arc<dyn ServiceContainer>,
        rate_limiter: Arc<dyn RateLimiter>,
        database: Arc<Database>,
    ) -> Self {
        Self {
            services,
            rate_limiter,
            database,
        }
    }
}

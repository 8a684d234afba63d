//! Application state shared across all handlers.

use std::sync::Arc;

use atlas_sandbox::CodeRunner;

use crate::config::{Config, RateLimitConfig};
use crate::domain::catalogue::Catalogue;
use crate::middleware::rate_limit::RateLimiter;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Executes candidate code
    pub runner: Arc<dyn CodeRunner>,
    /// Read-only practice content
    pub catalogue: Arc<Catalogue>,
    /// Per-client run counters
    pub rate_limiter: Arc<RateLimiter>,
    /// Application configuration
    pub config: Arc<Config>,
    /// Rate limit configuration
    pub rate_limit_config: Arc<RateLimitConfig>,
}

impl AppState {
    /// Create a new AppState
    pub fn new(
        runner: Arc<dyn CodeRunner>,
        catalogue: Catalogue,
        config: Config,
        rate_limit_config: RateLimitConfig,
    ) -> Self {
        Self {
            runner,
            catalogue: Arc::new(catalogue),
            rate_limiter: Arc::new(RateLimiter::new()),
            config: Arc::new(config),
            rate_limit_config: Arc::new(rate_limit_config),
        }
    }
}

//! Application configuration loaded from environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Environment (development, staging, production)
    pub environment: String,
    /// Catalogue document to serve instead of the bundled one
    pub content_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        // Load .env file if it exists (ignore errors if not found)
        dotenvy::dotenv().ok();

        Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: parse_or("PORT", 8080),
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            content_path: env::var("CONTENT_PATH").ok().map(PathBuf::from),
        }
    }
}

/// Rate limit configuration
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Runs allowed per client per window
    pub run_limit: u64,
    /// Run window in seconds
    pub run_window: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            run_limit: 20,
            run_window: 60, // 1 minute
        }
    }
}

impl RateLimitConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            run_limit: parse_or("RUN_RATE_LIMIT", defaults.run_limit),
            run_window: parse_or("RUN_RATE_WINDOW_SECS", defaults.run_window),
        }
    }
}

fn parse_or<T: FromStr + std::fmt::Display>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!("{} is not valid ({:?}), using {}", name, raw, default);
            default
        }),
        Err(_) => default,
    }
}

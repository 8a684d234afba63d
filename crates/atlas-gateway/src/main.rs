//! Atlas Gateway - HTTP API for the Atlas practice runner
//!
//! Serves the practice catalogue and runs candidate code in the sandbox.

mod config;
mod domain;
mod error;
mod middleware;
mod state;

#[cfg(test)]
mod test_utils;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use axum::http::{header, Method};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use atlas_sandbox::{ChallengeRunner, SandboxConfig};

use crate::config::{Config, RateLimitConfig};
use crate::domain::catalogue::{self, Catalogue};
use crate::domain::{health, runs};
use crate::middleware::rate_limit::run_rate_limit_middleware;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "atlas_gateway=debug,atlas_sandbox=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env();
    let rate_limit_config = RateLimitConfig::from_env();
    let sandbox_config = SandboxConfig::from_env();

    tracing::info!("Starting Atlas Gateway");
    tracing::info!("Environment: {}", config.environment);

    let catalogue = Catalogue::load(config.content_path.as_deref())
        .context("Failed to load catalogue")?;
    tracing::info!(
        notes = catalogue.notes().len(),
        algorithms = catalogue.algorithms().len(),
        challenges = catalogue.challenges().len(),
        "Catalogue loaded"
    );

    if sandbox_config.worker_available() {
        tracing::info!("Sandbox worker: {}", sandbox_config.worker_path.display());
    } else {
        tracing::warn!(
            "Sandbox worker not found at {}; runs will fail until it is installed",
            sandbox_config.worker_path.display()
        );
    }

    let runner = Arc::new(ChallengeRunner::new(sandbox_config));
    let host = config.host.clone();
    let port = config.port;

    // Create app state
    let state = AppState::new(runner, catalogue, config, rate_limit_config);

    // Build router
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind((host.as_str(), port)).await?;
    tracing::info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Atlas Gateway stopped");
    Ok(())
}

/// Create the application router with all routes and middleware.
fn create_router(state: AppState) -> Router {
    // Health routes
    let health_routes = Router::new()
        .route("/", get(health::health_check))
        .route("/live", get(health::liveness))
        .route("/ready", get(health::readiness));

    // Run routes, rate limited per client
    let run_routes = Router::new()
        .route("/challenges/{slug}/run", post(runs::run_challenge))
        .route("/run", post(runs::run_code))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            run_rate_limit_middleware,
        ));

    // Read-only catalogue routes
    let catalogue_routes = Router::new()
        .route("/notes", get(catalogue::list_notes))
        .route("/algorithms", get(catalogue::list_algorithms))
        .route("/challenges", get(catalogue::list_challenges))
        .route("/challenges/{slug}", get(catalogue::get_challenge));

    // API v1 routes
    let api_v1 = Router::new().merge(catalogue_routes).merge(run_routes);

    // CORS configuration - permissive for development
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT, header::ORIGIN])
        .expose_headers([header::CONTENT_TYPE, header::RETRY_AFTER]);

    // Note: Layers are applied bottom-up, so CORS must be last to wrap everything
    Router::new()
        .nest("/health", health_routes)
        .nest("/api/v1", api_v1)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

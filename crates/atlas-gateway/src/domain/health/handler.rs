//! Health check handlers.

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::state::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub environment: String,
    pub services: ServiceHealth,
}

/// Individual service health status
#[derive(Debug, Serialize)]
pub struct ServiceHealth {
    pub sandbox: ServiceStatus,
    pub catalogue: CatalogueStatus,
}

/// Service status
#[derive(Debug, Serialize)]
pub struct ServiceStatus {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Content counts
#[derive(Debug, Serialize)]
pub struct CatalogueStatus {
    pub notes: usize,
    pub algorithms: usize,
    pub challenges: usize,
}

/// GET /health
///
/// Returns the health status of the API and the sandbox worker.
pub async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<HealthResponse>, (StatusCode, Json<HealthResponse>)> {
    let ready = state.runner.ready();

    let sandbox = if ready {
        ServiceStatus {
            status: "healthy",
            error: None,
        }
    } else {
        ServiceStatus {
            status: "unhealthy",
            error: Some("sandbox worker executable not found".to_string()),
        }
    };

    let response = HealthResponse {
        status: if ready { "healthy" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        environment: state.config.environment.clone(),
        services: ServiceHealth {
            sandbox,
            catalogue: CatalogueStatus {
                notes: state.catalogue.notes().len(),
                algorithms: state.catalogue.algorithms().len(),
                challenges: state.catalogue.challenges().len(),
            },
        },
    };

    if ready {
        Ok(Json(response))
    } else {
        Err((StatusCode::SERVICE_UNAVAILABLE, Json(response)))
    }
}

/// GET /health/live
///
/// Simple liveness probe - returns 200 if the service is running.
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

/// GET /health/ready
///
/// Readiness probe - returns 200 if runs can be started.
pub async fn readiness(State(state): State<AppState>) -> StatusCode {
    if state.runner.ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use atlas_common::ExecutionResult;

    use crate::config::RateLimitConfig;
    use crate::test_utils::{create_test_app, get, send, StubRunner};

    #[tokio::test]
    async fn test_health_reports_sandbox_and_catalogue() {
        let app = create_test_app(
            StubRunner::returning(ExecutionResult::default()),
            RateLimitConfig::default(),
        );

        let (status, _, body) = send(&app, get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["environment"], "test");
        assert_eq!(body["services"]["sandbox"]["status"], "healthy");
        assert_eq!(body["services"]["catalogue"]["challenges"], 3);
    }

    #[tokio::test]
    async fn test_missing_worker_is_not_ready() {
        let app = create_test_app(StubRunner::unavailable(), RateLimitConfig::default());

        let (status, _, body) = send(&app, get("/health")).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["status"], "degraded");

        let (status, _, _) = send(&app, get("/health/ready")).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        let (status, _, _) = send(&app, get("/health/live")).await;
        assert_eq!(status, StatusCode::OK);
    }
}

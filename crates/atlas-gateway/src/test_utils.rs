//! Test utilities: a scripted runner and an in-process router.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use tower::ServiceExt;
use uuid::Uuid;

use atlas_common::{ExecutionRequest, ExecutionResult, RunState};
use atlas_sandbox::{CodeRunner, RunReport};

use crate::config::{Config, RateLimitConfig};
use crate::domain::catalogue::Catalogue;
use crate::state::AppState;

/// Runner that records requests and answers with a fixed result
pub struct StubRunner {
    pub result: ExecutionResult,
    pub ready: bool,
    pub calls: Mutex<Vec<ExecutionRequest>>,
}

impl StubRunner {
    pub fn returning(result: ExecutionResult) -> Arc<Self> {
        Arc::new(Self {
            result,
            ready: true,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn unavailable() -> Arc<Self> {
        Arc::new(Self {
            result: ExecutionResult::failure("Failed to start sandbox worker: not found"),
            ready: false,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<ExecutionRequest> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CodeRunner for StubRunner {
    async fn run(&self, request: ExecutionRequest) -> RunReport {
        self.calls.lock().unwrap().push(request);
        RunReport {
            run_id: Uuid::new_v4(),
            state: if self.result.is_success() {
                RunState::Completed
            } else {
                RunState::Faulted
            },
            result: self.result.clone(),
            console: vec!["stub".to_string()],
            elapsed_ms: 1,
        }
    }

    fn ready(&self) -> bool {
        self.ready
    }
}

fn test_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        environment: "test".to_string(),
        content_path: None,
    }
}

/// Router over the bundled catalogue and the given runner
pub fn create_test_app(runner: Arc<StubRunner>, rate_limit: RateLimitConfig) -> Router {
    let catalogue = Catalogue::bundled().expect("bundled catalogue is valid");
    let state = AppState::new(runner, catalogue, test_config(), rate_limit);
    crate::create_router(state)
}

pub async fn send(
    app: &Router,
    request: Request<Body>,
) -> (StatusCode, axum::http::HeaderMap, serde_json::Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
    };
    (status, headers, body)
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .header("X-Forwarded-For", "203.0.113.9")
        .body(Body::from(body.to_string()))
        .unwrap()
}

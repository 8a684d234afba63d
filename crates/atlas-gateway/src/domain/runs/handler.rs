//! Run handlers.
//!
//! Runner failures are part of the report, so every completed run answers
//! 200. Only bad requests and unknown challenges map to HTTP errors.

use axum::{
    extract::{Path, State},
    Json,
};
use validator::Validate;

use atlas_common::ExecutionRequest;
use atlas_sandbox::RunReport;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use super::request::{ChallengeRunRequest, RunRequest};

/// POST /api/v1/challenges/{slug}/run
///
/// Run the submitted code against the challenge's own test script.
pub async fn run_challenge(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Json(payload): Json<ChallengeRunRequest>,
) -> ApiResult<Json<RunReport>> {
    let challenge = state
        .catalogue
        .challenge(&slug)
        .ok_or_else(|| ApiError::NotFound(format!("Challenge '{}' not found", slug)))?;

    payload.validate().map_err(|e| ApiError::Validation(e.to_string()))?;

    let report = state
        .runner
        .run(ExecutionRequest::new(payload.code, challenge.test_script.clone()))
        .await;

    tracing::info!(
        %slug,
        run_id = %report.run_id,
        state = %report.state,
        passed = report.result.passed,
        total = report.result.total,
        "Challenge run finished"
    );

    Ok(Json(report))
}

/// POST /api/v1/run
pub async fn run_code(
    State(state): State<AppState>,
    Json(payload): Json<RunRequest>,
) -> ApiResult<Json<RunReport>> {
    payload.validate().map_err(|e| ApiError::Validation(e.to_string()))?;

    let report = state
        .runner
        .run(ExecutionRequest::new(payload.code, payload.test_script))
        .await;

    tracing::info!(
        run_id = %report.run_id,
        state = %report.state,
        "Ad-hoc run finished"
    );

    Ok(Json(report))
}

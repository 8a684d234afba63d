//! Catalogue handlers.

use axum::{
    extract::{Path, State},
    Json,
};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use super::{
    model::Challenge,
    response::{ChallengeListResponse, ChallengeSummary, TopicListResponse},
};

/// GET /api/v1/notes
pub async fn list_notes(State(state): State<AppState>) -> Json<TopicListResponse> {
    Json(TopicListResponse {
        topics: state.catalogue.notes().to_vec(),
    })
}

/// GET /api/v1/algorithms
pub async fn list_algorithms(State(state): State<AppState>) -> Json<TopicListResponse> {
    Json(TopicListResponse {
        topics: state.catalogue.algorithms().to_vec(),
    })
}

/// GET /api/v1/challenges
pub async fn list_challenges(State(state): State<AppState>) -> Json<ChallengeListResponse> {
    Json(ChallengeListResponse {
        challenges: state
            .catalogue
            .challenges()
            .iter()
            .map(ChallengeSummary::from)
            .collect(),
    })
}

/// GET /api/v1/challenges/{slug}
///
/// Full challenge including starter code and reference solution.
pub async fn get_challenge(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<Json<Challenge>> {
    state
        .catalogue
        .challenge(&slug)
        .cloned()
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Challenge '{}' not found", slug)))
}

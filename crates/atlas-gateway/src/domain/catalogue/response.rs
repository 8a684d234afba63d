//! Catalogue response DTOs.

use serde::Serialize;

use super::model::{Category, Challenge, Level, Topic};

/// Topic list response
#[derive(Debug, Serialize)]
pub struct TopicListResponse {
    pub topics: Vec<Topic>,
}

/// Challenge summary for list responses
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeSummary {
    pub slug: String,
    pub title: String,
    pub level: Level,
    pub category: Category,
    pub duration: String,
    pub solved_count: String,
}

impl From<&Challenge> for ChallengeSummary {
    fn from(challenge: &Challenge) -> Self {
        Self {
            slug: challenge.slug.clone(),
            title: challenge.title.clone(),
            level: challenge.level,
            category: challenge.category,
            duration: challenge.duration.clone(),
            solved_count: challenge.solved_count.clone(),
        }
    }
}

/// Challenge list response
#[derive(Debug, Serialize)]
pub struct ChallengeListResponse {
    pub challenges: Vec<ChallengeSummary>,
}

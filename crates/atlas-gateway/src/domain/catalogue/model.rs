//! Catalogue document loading and normalization.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Catalogue compiled into the binary
pub const BUNDLED_CATALOGUE: &str = include_str!("../../../content/catalogue.json");

/// Shown when a challenge has no solved count yet
pub const DEFAULT_SOLVED_COUNT: &str = "0 completed";

/// Shown when a challenge has no reference solution
pub const MISSING_REFERENCE_SOLUTION: &str = "No reference solution yet";

lazy_static::lazy_static! {
    static ref SLUG_REGEX: regex::Regex = regex::Regex::new(r"^[a-z0-9]+(-[a-z0-9]+)*$").unwrap();
}

#[derive(Error, Debug)]
pub enum CatalogueError {
    #[error("Failed to read catalogue {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid catalogue document: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid challenge slug {0:?}: use lowercase letters, digits and single hyphens")]
    InvalidSlug(String),

    #[error("Duplicate challenge slug {0:?}")]
    DuplicateSlug(String),
}

/// A note or algorithm topic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub title: String,
    pub digest: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Beginner,
    Intermediate,
    Advanced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Category {
    JavaScript,
    TypeScript,
}

/// Challenge as written in the catalogue document
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawChallenge {
    slug: String,
    title: String,
    level: Level,
    category: Category,
    duration: String,
    solved_count: Option<String>,
    #[serde(default)]
    description: Vec<String>,
    example: Option<String>,
    starter_code: String,
    test_script: String,
    reference_solution: Option<String>,
}

/// A coding challenge with its test script
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Challenge {
    pub slug: String,
    pub title: String,
    pub level: Level,
    pub category: Category,
    pub duration: String,
    pub solved_count: String,
    pub description: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub example: Option<String>,
    pub starter_code: String,
    pub test_script: String,
    pub reference_solution: String,
}

impl From<RawChallenge> for Challenge {
    fn from(raw: RawChallenge) -> Self {
        Self {
            slug: raw.slug,
            title: raw.title,
            level: raw.level,
            category: raw.category,
            duration: raw.duration,
            solved_count: raw
                .solved_count
                .unwrap_or_else(|| DEFAULT_SOLVED_COUNT.to_string()),
            description: raw.description,
            example: raw.example,
            starter_code: raw.starter_code,
            test_script: raw.test_script,
            reference_solution: raw
                .reference_solution
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| MISSING_REFERENCE_SOLUTION.to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawCatalogue {
    #[serde(default)]
    notes: Vec<Topic>,
    #[serde(default)]
    algorithms: Vec<Topic>,
    #[serde(default)]
    challenges: Vec<RawChallenge>,
}

/// Read-only practice content
#[derive(Debug, Clone, Default)]
pub struct Catalogue {
    notes: Vec<Topic>,
    algorithms: Vec<Topic>,
    challenges: Vec<Challenge>,
}

impl Catalogue {
    /// Load from `path`, or the bundled document when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self, CatalogueError> {
        match path {
            Some(path) => {
                let raw = fs::read_to_string(path).map_err(|source| CatalogueError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
                Self::from_json(&raw)
            }
            None => Self::bundled(),
        }
    }

    pub fn bundled() -> Result<Self, CatalogueError> {
        Self::from_json(BUNDLED_CATALOGUE)
    }

    /// Parse and validate a catalogue document.
    pub fn from_json(raw: &str) -> Result<Self, CatalogueError> {
        let raw: RawCatalogue = serde_json::from_str(raw)?;

        let mut seen = HashSet::new();
        for challenge in &raw.challenges {
            if !SLUG_REGEX.is_match(&challenge.slug) {
                return Err(CatalogueError::InvalidSlug(challenge.slug.clone()));
            }
            if !seen.insert(challenge.slug.as_str()) {
                return Err(CatalogueError::DuplicateSlug(challenge.slug.clone()));
            }
        }

        Ok(Self {
            notes: raw.notes,
            algorithms: raw.algorithms,
            challenges: raw.challenges.into_iter().map(Challenge::from).collect(),
        })
    }

    pub fn notes(&self) -> &[Topic] {
        &self.notes
    }

    pub fn algorithms(&self) -> &[Topic] {
        &self.algorithms
    }

    pub fn challenges(&self) -> &[Challenge] {
        &self.challenges
    }

    /// Look up a challenge by slug
    pub fn challenge(&self, slug: &str) -> Option<&Challenge> {
        self.challenges.iter().find(|c| c.slug == slug)
    }
}

//! Run request DTOs.

use std::borrow::Cow;

use serde::Deserialize;
use validator::{Validate, ValidationError};

/// Largest `code` or `testScript` accepted, in UTF-8 bytes. Two of them fit
/// the runner's source budget.
pub const MAX_SOURCE_BYTES: usize = 128 * 1024;

/// Run against a catalogue challenge's test script
#[derive(Debug, Deserialize, Validate)]
pub struct ChallengeRunRequest {
    #[validate(
        length(min = 1, message = "Code must not be empty"),
        custom(function = "validate_source_size")
    )]
    pub code: String,
}

/// Ad-hoc run with a caller-supplied test script
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RunRequest {
    #[validate(
        length(min = 1, message = "Code must not be empty"),
        custom(function = "validate_source_size")
    )]
    pub code: String,

    #[validate(
        length(min = 1, message = "Test script must not be empty"),
        custom(function = "validate_source_size")
    )]
    pub test_script: String,
}

/// Size is measured in bytes, the unit the runner enforces.
fn validate_source_size(value: &str) -> Result<(), ValidationError> {
    if value.len() > MAX_SOURCE_BYTES {
        let mut err = ValidationError::new("source_too_large");
        err.message = Some(Cow::from(format!(
            "Must be at most {} bytes",
            MAX_SOURCE_BYTES
        )));
        return Err(err);
    }
    Ok(())
}

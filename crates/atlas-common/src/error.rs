//! Failure taxonomy for sandboxed runs.

use thiserror::Error;

use crate::types::{ExecutionResult, FailureKind, TIMEOUT_MESSAGE};

/// Every way a run can fail before producing a result.
///
/// All variants collapse into an [`ExecutionResult`] with `error` set; callers
/// of the runner never see this type directly.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SandboxError {
    /// Candidate code or test script threw (including syntax errors)
    #[error("{0}")]
    CandidateThrow(String),

    /// The worker reported or exhibited a fault of its own
    #[error("{0}")]
    InternalFault(String),

    /// The wall-clock deadline elapsed
    #[error("Execution timed out")]
    Timeout,

    /// The worker could not be started or reached
    #[error("Failed to start sandbox worker: {0}")]
    SetupFailure(String),
}

impl SandboxError {
    /// Returns the classification of this error
    pub fn kind(&self) -> FailureKind {
        match self {
            SandboxError::CandidateThrow(_) => FailureKind::CandidateThrow,
            SandboxError::InternalFault(_) => FailureKind::InternalFault,
            SandboxError::Timeout => FailureKind::Timeout,
            SandboxError::SetupFailure(_) => FailureKind::SetupFailure,
        }
    }

    /// Build an error of the given kind from a message.
    pub fn from_kind(kind: FailureKind, message: impl Into<String>) -> Self {
        let message = message.into();
        match kind {
            FailureKind::CandidateThrow => SandboxError::CandidateThrow(message),
            FailureKind::InternalFault => SandboxError::InternalFault(message),
            FailureKind::Timeout => SandboxError::Timeout,
            FailureKind::SetupFailure => SandboxError::SetupFailure(message),
        }
    }

    /// Normalize into the caller-facing result shape.
    pub fn into_result(self) -> ExecutionResult {
        match self {
            SandboxError::Timeout => ExecutionResult::failure(TIMEOUT_MESSAGE),
            other => ExecutionResult::failure(other.to_string()),
        }
    }
}

/// Result type alias using SandboxError
pub type SandboxResult<T> = Result<T, SandboxError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::UNKNOWN_ERROR_MESSAGE;

    #[test]
    fn test_candidate_message_passes_through() {
        let result = SandboxError::CandidateThrow("boom".into()).into_result();
        assert_eq!(result.error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_timeout_message_is_fixed() {
        let result = SandboxError::Timeout.into_result();
        assert_eq!(result.error.as_deref(), Some(TIMEOUT_MESSAGE));
    }

    #[test]
    fn test_empty_fault_uses_fallback() {
        let result = SandboxError::InternalFault(String::new()).into_result();
        assert_eq!(result.error.as_deref(), Some(UNKNOWN_ERROR_MESSAGE));
    }

    #[test]
    fn test_kind_round_trip() {
        for kind in [
            FailureKind::CandidateThrow,
            FailureKind::InternalFault,
            FailureKind::Timeout,
            FailureKind::SetupFailure,
        ] {
            assert_eq!(SandboxError::from_kind(kind, "x").kind(), kind);
        }
    }

    #[test]
    fn test_setup_failure_is_prefixed() {
        let err = SandboxError::SetupFailure("No such file".into());
        assert_eq!(err.to_string(), "Failed to start sandbox worker: No such file");
    }
}

//! Common types used across Atlas services.

use serde::{Deserialize, Serialize};

/// Message reported when a run exceeds its wall-clock budget.
pub const TIMEOUT_MESSAGE: &str = "Execution timed out";

/// Fallback message for failures that carry no text of their own.
pub const UNKNOWN_ERROR_MESSAGE: &str = "Unknown execution error";

/// One "run" of candidate code against a test script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRequest {
    /// Candidate implementation, untrusted
    pub code: String,
    /// Assertions executed in the same scope as `code`
    pub test_script: String,
}

impl ExecutionRequest {
    pub fn new(code: impl Into<String>, test_script: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            test_script: test_script.into(),
        }
    }

    /// Combined size of both fragments in bytes.
    pub fn source_len(&self) -> usize {
        self.code.len() + self.test_script.len()
    }
}

/// Outcome of a run as seen by the caller.
///
/// Either a well-formed report with `error` unset, or `error` set with the
/// numeric fields zeroed and `checks` empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub passed: u32,
    pub total: u32,
    #[serde(default)]
    pub checks: Vec<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionResult {
    /// Create a successful result
    pub fn completed(passed: u32, total: u32, checks: Vec<bool>) -> Self {
        Self {
            passed,
            total,
            checks,
            error: None,
        }
    }

    /// Create a failed result. Empty messages are replaced by a generic one.
    pub fn failure(message: impl Into<String>) -> Self {
        let message = message.into();
        let message = if message.trim().is_empty() {
            UNKNOWN_ERROR_MESSAGE.to_string()
        } else {
            message
        };

        Self {
            passed: 0,
            total: 0,
            checks: Vec::new(),
            error: Some(message),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Human readable one-liner for UIs and logs.
    pub fn summary(&self) -> String {
        match &self.error {
            Some(message) => format!("run failed: {}", message),
            None => format!("passed {}/{} tests", self.passed, self.total),
        }
    }
}

/// Classification of a failed run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Candidate code or test script threw
    CandidateThrow,
    /// The worker itself misbehaved
    InternalFault,
    /// Deadline elapsed before a reply arrived
    Timeout,
    /// The worker could not be started or reached
    SetupFailure,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::CandidateThrow => write!(f, "candidate_throw"),
            FailureKind::InternalFault => write!(f, "internal_fault"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::SetupFailure => write!(f, "setup_failure"),
        }
    }
}

/// Lifecycle of a single run.
///
/// `Idle -> Running -> {Completed | TimedOut | Faulted}`; each run reaches
/// exactly one terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Running,
    Completed,
    TimedOut,
    Faulted,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Completed | RunState::TimedOut | RunState::Faulted)
    }

    /// Terminal state reached by a failure of the given kind.
    pub fn for_failure(kind: FailureKind) -> Self {
        match kind {
            FailureKind::Timeout => RunState::TimedOut,
            _ => RunState::Faulted,
        }
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunState::Idle => write!(f, "idle"),
            RunState::Running => write!(f, "running"),
            RunState::Completed => write!(f, "completed"),
            RunState::TimedOut => write!(f, "timed_out"),
            RunState::Faulted => write!(f, "faulted"),
        }
    }
}

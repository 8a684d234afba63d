//! Wire format between the runner and its worker process.
//!
//! The runner writes one [`ExecutionRequest`] as JSON to the worker's stdin
//! and closes it. The worker answers with exactly one [`WorkerReply`] line on
//! stdout.

use serde::{Deserialize, Serialize};

use atlas_common::{ExecutionResult, FailureKind, SandboxError};

/// Reply written by the worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WorkerReply {
    /// The test script returned a well-formed report
    Completed {
        result: ExecutionResult,
        #[serde(default)]
        console: Vec<String>,
    },
    /// Evaluation failed before a report was produced
    Failed {
        kind: FailureKind,
        message: String,
        #[serde(default)]
        console: Vec<String>,
    },
}

impl WorkerReply {
    pub fn completed(result: ExecutionResult, console: Vec<String>) -> Self {
        WorkerReply::Completed { result, console }
    }

    pub fn failed(error: SandboxError, console: Vec<String>) -> Self {
        WorkerReply::Failed {
            kind: error.kind(),
            message: error.to_string(),
            console,
        }
    }

    /// Console lines captured during the run
    pub fn console(&self) -> &[String] {
        match self {
            WorkerReply::Completed { console, .. } | WorkerReply::Failed { console, .. } => {
                console
            }
        }
    }

    /// Split into the run outcome and the captured console output.
    pub fn into_parts(self) -> (Result<ExecutionResult, SandboxError>, Vec<String>) {
        match self {
            WorkerReply::Completed { result, console } => (Ok(result), console),
            WorkerReply::Failed {
                kind,
                message,
                console,
            } => (Err(SandboxError::from_kind(kind, message)), console),
        }
    }

    /// Serialize as a single line.
    pub fn encode(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Parse the worker's stdout. Only the last non-empty line counts.
    pub fn decode(stdout: &[u8]) -> Option<Self> {
        let text = String::from_utf8_lossy(stdout);
        let line = text.lines().rev().find(|line| !line.trim().is_empty())?;
        serde_json::from_str(line.trim()).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_completed_wire_shape() {
        let reply = WorkerReply::completed(
            ExecutionResult::completed(1, 1, vec![true]),
            vec!["hi".into()],
        );
        assert_eq!(
            serde_json::to_value(&reply).unwrap(),
            json!({
                "status": "completed",
                "result": { "passed": 1, "total": 1, "checks": [true] },
                "console": ["hi"]
            })
        );
    }

    #[test]
    fn test_failed_keeps_kind() {
        let reply = WorkerReply::failed(SandboxError::CandidateThrow("boom".into()), vec![]);
        let (outcome, console) = reply.into_parts();
        assert_eq!(outcome, Err(SandboxError::CandidateThrow("boom".into())));
        assert!(console.is_empty());
    }

    #[test]
    fn test_decode_takes_last_line() {
        let stdout =
            b"garbage\n{\"status\":\"failed\",\"kind\":\"internal_fault\",\"message\":\"x\"}\n\n";
        let reply = WorkerReply::decode(stdout).unwrap();
        assert_eq!(
            reply,
            WorkerReply::Failed {
                kind: FailureKind::InternalFault,
                message: "x".into(),
                console: vec![],
            }
        );
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(WorkerReply::decode(b"").is_none());
        assert!(WorkerReply::decode(b"not json\n").is_none());
        assert!(WorkerReply::decode(b"{\"status\":\"unknown\"}").is_none());
    }

    #[test]
    fn test_encode_is_single_line() {
        let reply = WorkerReply::completed(
            ExecutionResult::completed(0, 0, vec![]),
            vec!["line one\nline two".into()],
        );
        let encoded = reply.encode().unwrap();
        assert!(!encoded.contains('\n'));
        assert_eq!(WorkerReply::decode(encoded.as_bytes()), Some(reply));
    }
}

//! Challenge runner: one worker process per run, raced against a deadline.
//!
//! Every run spawns a fresh `atlas-worker`, hands it the request over stdin
//! and waits for its reply. If the deadline passes first the worker is
//! killed. The worker is reaped on every path, and `kill_on_drop` covers
//! callers that abandon the future mid-run.

use std::process::{ExitStatus, Stdio};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::time::{timeout_at, Instant};
use tracing::Instrument;
use uuid::Uuid;

use atlas_common::{ExecutionRequest, ExecutionResult, RunState, SandboxError, SandboxResult};

use crate::config::SandboxConfig;
use crate::protocol::WorkerReply;

/// Everything observed about one run
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub run_id: Uuid,
    /// Terminal state reached by the run
    pub state: RunState,
    pub result: ExecutionResult,
    /// Console output captured inside the sandbox
    pub console: Vec<String>,
    pub elapsed_ms: u64,
}

/// Executes candidate code against a test script.
///
/// Implementations always settle and never surface errors: failures are
/// folded into the returned [`ExecutionResult`].
#[async_trait]
pub trait CodeRunner: Send + Sync {
    async fn run(&self, request: ExecutionRequest) -> RunReport;

    async fn execute(&self, code: &str, test_script: &str) -> ExecutionResult {
        self.run(ExecutionRequest::new(code, test_script)).await.result
    }

    /// Whether runs can currently be started
    fn ready(&self) -> bool {
        true
    }
}

/// Runner backed by `atlas-worker` processes
#[derive(Debug, Clone)]
pub struct ChallengeRunner {
    config: Arc<SandboxConfig>,
}

impl ChallengeRunner {
    pub fn new(config: SandboxConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    async fn run_inner(&self, run_id: Uuid, request: ExecutionRequest) -> RunReport {
        let started = Instant::now();
        let deadline = started + self.config.timeout;
        tracing::debug!(
            from = %RunState::Idle,
            to = %RunState::Running,
            code_bytes = request.code.len(),
            test_bytes = request.test_script.len(),
            "Starting run"
        );

        let (outcome, console) = match self.supervise(&request, deadline).await {
            Ok(reply) => reply.into_parts(),
            Err(err) => (Err(err), Vec::new()),
        };

        let (state, result) = match outcome {
            Ok(result) => (RunState::Completed, result),
            Err(err) => {
                let kind = err.kind();
                tracing::info!(%kind, "Run failed: {}", err);
                (RunState::for_failure(kind), err.into_result())
            }
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        tracing::info!(%state, elapsed_ms, "{}", result.summary());

        RunReport {
            run_id,
            state,
            result,
            console,
            elapsed_ms,
        }
    }

    /// Spawn a worker, exchange the request for a reply, and always reap it.
    async fn supervise(
        &self,
        request: &ExecutionRequest,
        deadline: Instant,
    ) -> SandboxResult<WorkerReply> {
        if request.source_len() > self.config.max_source_bytes {
            return Err(SandboxError::SetupFailure(format!(
                "source is {} bytes, limit is {} bytes",
                request.source_len(),
                self.config.max_source_bytes
            )));
        }

        let payload = serde_json::to_vec(request)
            .map_err(|e| SandboxError::SetupFailure(format!("failed to encode request: {}", e)))?;

        let mut child = self.spawn_worker()?;

        let outcome = match timeout_at(
            deadline,
            exchange(&mut child, payload, self.config.max_reply_bytes),
        )
        .await
        {
            Ok(outcome) => outcome,
            Err(_) => Err(SandboxError::Timeout),
        };

        reap(&mut child).await;
        outcome
    }

    fn spawn_worker(&self) -> SandboxResult<Child> {
        Command::new(&self.config.worker_path)
            .env_clear()
            .envs(self.config.engine.to_env())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                SandboxError::SetupFailure(format!(
                    "{}: {}",
                    self.config.worker_path.display(),
                    e
                ))
            })
    }
}

#[async_trait]
impl CodeRunner for ChallengeRunner {
    async fn run(&self, request: ExecutionRequest) -> RunReport {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("run", %run_id);
        self.run_inner(run_id, request).instrument(span).await
    }

    fn ready(&self) -> bool {
        self.config.worker_available()
    }
}

/// Send the request and collect the worker's reply.
async fn exchange(child: &mut Child, payload: Vec<u8>, limit: u64) -> SandboxResult<WorkerReply> {
    let (Some(mut stdin), Some(stdout), Some(stderr)) =
        (child.stdin.take(), child.stdout.take(), child.stderr.take())
    else {
        return Err(SandboxError::SetupFailure(
            "worker stdio pipes unavailable".to_string(),
        ));
    };

    stdin
        .write_all(&payload)
        .await
        .map_err(|e| SandboxError::SetupFailure(format!("failed to deliver request: {}", e)))?;
    // Closing stdin marks the end of the request
    drop(stdin);

    let stderr_task = tokio::spawn(read_capped(stderr, limit));

    let (stdout, truncated) = read_capped(stdout, limit).await.map_err(|e| {
        SandboxError::InternalFault(format!("Failed to read sandbox worker reply: {}", e))
    })?;
    if truncated {
        return Err(SandboxError::InternalFault(format!(
            "Sandbox worker reply exceeded {} bytes",
            limit
        )));
    }

    let status = child.wait().await.map_err(|e| {
        SandboxError::InternalFault(format!("Failed to wait for sandbox worker: {}", e))
    })?;

    let stderr = match stderr_task.await {
        Ok(Ok((bytes, _))) => bytes,
        _ => Vec::new(),
    };

    interpret(status, &stdout, &stderr)
}

/// Turn the worker's exit into a reply, classifying crashes as faults.
fn interpret(status: ExitStatus, stdout: &[u8], stderr: &[u8]) -> SandboxResult<WorkerReply> {
    if let Some(reply) = WorkerReply::decode(stdout) {
        return Ok(reply);
    }

    let detail = first_line(stderr);
    if !stderr.is_empty() {
        tracing::warn!(
            "Sandbox worker stderr: {}",
            String::from_utf8_lossy(stderr).chars().take(2000).collect::<String>()
        );
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return Err(SandboxError::InternalFault(format!(
                "Sandbox worker killed by signal {}",
                signal
            )));
        }
    }

    let message = match (status.code(), detail) {
        (Some(0), _) => "Sandbox worker exited without a reply".to_string(),
        (Some(code), Some(detail)) => {
            format!("Sandbox worker exited with code {}: {}", code, detail)
        }
        (Some(code), None) => format!("Sandbox worker exited with code {}", code),
        (None, _) => "Sandbox worker terminated abnormally".to_string(),
    };
    Err(SandboxError::InternalFault(message))
}

async fn read_capped<R>(reader: R, limit: u64) -> std::io::Result<(Vec<u8>, bool)>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    reader.take(limit + 1).read_to_end(&mut buf).await?;
    let truncated = buf.len() as u64 > limit;
    buf.truncate(limit as usize);
    Ok((buf, truncated))
}

/// Kill the worker if it is still alive and wait for it to exit.
async fn reap(child: &mut Child) {
    if let Ok(Some(_)) = child.try_wait() {
        return;
    }

    if let Err(e) = child.start_kill() {
        tracing::warn!("Failed to kill sandbox worker: {}", e);
    }
    if let Err(e) = child.wait().await {
        tracing::warn!("Failed to reap sandbox worker: {}", e);
    }
}

fn first_line(bytes: &[u8]) -> Option<String> {
    String::from_utf8_lossy(bytes)
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(|line| line.chars().take(500).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use atlas_common::FailureKind;

    fn missing_worker_runner() -> ChallengeRunner {
        ChallengeRunner::new(
            SandboxConfig::default().with_worker_path("/nonexistent/atlas-worker"),
        )
    }

    #[tokio::test]
    async fn test_missing_worker_is_setup_failure() {
        let report = missing_worker_runner()
            .run(ExecutionRequest::new("1", "return {passed:0,total:0,checks:[]}"))
            .await;

        assert_eq!(report.state, RunState::Faulted);
        let error = report.result.error.unwrap();
        assert!(error.starts_with("Failed to start sandbox worker"));
        assert_eq!(report.result.total, 0);
    }

    #[tokio::test]
    async fn test_oversized_source_is_rejected_before_spawn() {
        let mut config = SandboxConfig::default().with_worker_path("/nonexistent/atlas-worker");
        config.max_source_bytes = 4;
        let runner = ChallengeRunner::new(config);

        let err = runner
            .supervise(
                &ExecutionRequest::new("const x = 1;", ""),
                Instant::now() + runner.config().timeout,
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::SetupFailure);
        assert!(err.to_string().contains("limit is 4 bytes"));
    }

    #[tokio::test]
    async fn test_execute_folds_errors_into_result() {
        let result = missing_worker_runner().execute("1", "").await;
        assert!(!result.is_success());
        assert!(result.checks.is_empty());
    }

    #[test]
    fn test_not_ready_without_worker() {
        assert!(!missing_worker_runner().ready());
    }

    #[test]
    fn test_first_line_skips_blanks() {
        assert_eq!(first_line(b"\n\n  panic here  \nmore"), Some("panic here".to_string()));
        assert_eq!(first_line(b""), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_interpret_prefers_reply_over_status() {
        use std::os::unix::process::ExitStatusExt;

        let reply = WorkerReply::completed(ExecutionResult::completed(1, 1, vec![true]), vec![]);
        let stdout = reply.encode().unwrap();
        let status = ExitStatus::from_raw(1 << 8);
        assert_eq!(interpret(status, stdout.as_bytes(), b"").unwrap(), reply);
    }

    #[cfg(unix)]
    #[test]
    fn test_interpret_classifies_crashes() {
        use std::os::unix::process::ExitStatusExt;

        let err = interpret(ExitStatus::from_raw(9), b"", b"").unwrap_err();
        assert_eq!(err, SandboxError::InternalFault("Sandbox worker killed by signal 9".into()));

        let err = interpret(ExitStatus::from_raw(101 << 8), b"", b"thread 'main' panicked\n")
            .unwrap_err();
        assert_eq!(
            err,
            SandboxError::InternalFault(
                "Sandbox worker exited with code 101: thread 'main' panicked".into()
            )
        );

        let err = interpret(ExitStatus::from_raw(0), b"", b"").unwrap_err();
        assert_eq!(err.kind(), FailureKind::InternalFault);
    }
}

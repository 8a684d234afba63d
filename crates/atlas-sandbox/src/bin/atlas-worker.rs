//! Atlas sandbox worker
//!
//! Evaluates one run request read from stdin and writes exactly one reply
//! line to stdout. The runner spawns a fresh worker per run and kills it when
//! the deadline passes.

use std::io::{self, Read, Write};
use std::thread;

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use atlas_common::{ExecutionRequest, SandboxError};
use atlas_sandbox::config::EngineLimits;
use atlas_sandbox::engine;
use atlas_sandbox::protocol::WorkerReply;

/// Native stack for the evaluation thread. Engine callbacks such as
/// `Array.prototype.map` recurse on the native stack.
const EVAL_STACK_BYTES: usize = 256 * 1024 * 1024;

fn main() -> Result<()> {
    // stdout carries the reply, so diagnostics go to stderr only
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "atlas_sandbox=warn".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_ansi(false),
        )
        .init();

    let reply = match read_request() {
        Ok(request) => {
            let limits = EngineLimits::from_env();
            tracing::debug!(
                code_bytes = request.code.len(),
                test_bytes = request.test_script.len(),
                "Evaluating run request"
            );
            evaluate_on_thread(request, limits)?
        }
        Err(e) => {
            tracing::error!("Invalid run request: {}", e);
            WorkerReply::failed(
                SandboxError::InternalFault(format!("Invalid run request: {}", e)),
                Vec::new(),
            )
        }
    };

    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{}", reply.encode()?)?;
    stdout.flush()?;
    Ok(())
}

fn evaluate_on_thread(request: ExecutionRequest, limits: EngineLimits) -> Result<WorkerReply> {
    let handle = thread::Builder::new()
        .name("atlas-eval".to_string())
        .stack_size(EVAL_STACK_BYTES)
        .spawn(move || engine::evaluate(&request, &limits))?;

    Ok(handle.join().unwrap_or_else(|_| {
        WorkerReply::failed(
            SandboxError::InternalFault("Evaluation thread panicked".to_string()),
            Vec::new(),
        )
    }))
}

fn read_request() -> Result<ExecutionRequest> {
    let mut input = String::new();
    io::stdin().read_to_string(&mut input)?;
    Ok(serde_json::from_str(&input)?)
}

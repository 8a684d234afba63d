//! JavaScript evaluation inside the worker process, backed by boa_engine.
//!
//! The candidate code and the test script are joined into one body and run
//! as a strict-mode async function, so top-level declarations of the code are
//! in scope for the test script. Timers are driven by a small event loop:
//! drain promise jobs, fire the earliest due timer, repeat until the program
//! settles.

use std::any::Any;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;
use std::thread;
use std::time::Duration;

use boa_engine::builtins::promise::{OperationType, PromiseState};
use boa_engine::context::{ContextBuilder, HostHooks};
use boa_engine::job::{FutureJob, JobQueue, NativeJob};
use boa_engine::object::builtins::JsPromise;
use boa_engine::{Context, JsError, JsNativeError, JsObject, Source};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use atlas_common::{ExecutionRequest, ExecutionResult, SandboxError};

use crate::config::EngineLimits;
use crate::protocol::WorkerReply;

const PRELUDE: &str = include_str!("prelude.js");

/// Failures of the host side of the engine, never of candidate code
#[derive(Error, Debug)]
pub enum HostError {
    #[error("Failed to create JavaScript context: {0}")]
    Context(String),

    #[error("Host call `{call}` failed: {message}")]
    Eval { call: &'static str, message: String },

    #[error("Host call `{0}` did not return a string")]
    NotAString(&'static str),

    #[error("Unexpected host payload: {0}")]
    Decode(#[from] serde_json::Error),

    /// Candidate code ran past the engine's call depth or stack limits
    #[error("Maximum call stack size exceeded")]
    StackOverflow,
}

impl From<HostError> for SandboxError {
    fn from(err: HostError) -> Self {
        match err {
            HostError::StackOverflow => SandboxError::CandidateThrow(err.to_string()),
            other => SandboxError::InternalFault(other.to_string()),
        }
    }
}

impl HostError {
    fn from_js(call: &'static str, err: JsError) -> Self {
        if err.as_native().is_some_and(JsNativeError::is_runtime_limit) {
            HostError::StackOverflow
        } else {
            HostError::Eval {
                call,
                message: err.to_string(),
            }
        }
    }
}

thread_local! {
    /// Promises rejected while no handler was attached, oldest first
    static UNHANDLED_REJECTIONS: RefCell<Vec<JsObject>> = const { RefCell::new(Vec::new()) };
}

/// Host hooks that record promises rejected without a handler
struct RejectionTracker;

impl HostHooks for RejectionTracker {
    fn promise_rejection_tracker(
        &self,
        promise: &JsObject,
        operation: OperationType,
        _context: &mut Context,
    ) {
        UNHANDLED_REJECTIONS.with(|pending| {
            let mut pending = pending.borrow_mut();
            match operation {
                OperationType::Reject => pending.push(promise.clone()),
                OperationType::Handle => pending.retain(|p| p != promise),
            }
        });
    }
}

static HOOKS: RejectionTracker = RejectionTracker;

fn clear_unhandled_rejections() {
    UNHANDLED_REJECTIONS.with(|pending| pending.borrow_mut().clear());
}

/// FIFO promise job queue that keeps the error a job escaped with.
///
/// Only uncatchable errors (runtime limits) escape a promise job.
#[derive(Default)]
struct RunJobQueue {
    jobs: RefCell<VecDeque<NativeJob>>,
    escaped: RefCell<Option<JsError>>,
}

impl RunJobQueue {
    fn take_escaped(&self) -> Option<JsError> {
        self.escaped.borrow_mut().take()
    }
}

impl JobQueue for RunJobQueue {
    fn enqueue_promise_job(&self, job: NativeJob, _context: &mut Context) {
        self.jobs.borrow_mut().push_back(job);
    }

    fn run_jobs(&self, context: &mut Context) {
        loop {
            let next = self.jobs.borrow_mut().pop_front();
            let Some(job) = next else {
                return;
            };
            if let Err(err) = job.call(context) {
                self.jobs.borrow_mut().clear();
                let mut escaped = self.escaped.borrow_mut();
                if escaped.is_none() {
                    *escaped = Some(err);
                }
                return;
            }
        }
    }

    fn enqueue_future_job(&self, _future: FutureJob, _context: &mut Context) {
        // No host function returns a future.
        tracing::warn!("Dropping unexpected future job");
    }
}

/// State reported by the prelude after each turn of the event loop
#[derive(Debug, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
enum Poll {
    Settled {
        outcome: ScriptOutcome,
    },
    Waiting {
        #[serde(rename = "delayMs")]
        delay_ms: f64,
    },
    Idle,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum ScriptOutcome {
    Returned { value: Value },
    Threw { message: String },
    Faulted { message: String },
}

/// What the test script must resolve to
#[derive(Debug, Deserialize)]
struct ReturnedReport {
    passed: u32,
    total: u32,
    #[serde(default)]
    checks: Vec<bool>,
}

/// One JavaScript context, used for exactly one run
pub struct Engine {
    context: Context,
    jobs: Rc<RunJobQueue>,
}

impl Engine {
    /// Create a context with a promise job queue and the prelude installed.
    pub fn new(limits: &EngineLimits) -> Result<Self, HostError> {
        clear_unhandled_rejections();

        let jobs = Rc::new(RunJobQueue::default());
        let mut context = ContextBuilder::new()
            .host_hooks(&HOOKS)
            .job_queue(Rc::clone(&jobs))
            .build()
            .map_err(|e| HostError::Context(e.to_string()))?;
        let runtime_limits = context.runtime_limits_mut();
        runtime_limits.set_recursion_limit(limits.recursion_limit);
        runtime_limits.set_stack_size_limit(limits.stack_size_limit);

        let mut engine = Self { context, jobs };
        engine.call("prelude", PRELUDE)?;
        engine.call(
            "configure",
            &format!("__atlas.configure({});", limits.max_console_lines),
        )?;
        Ok(engine)
    }

    /// Evaluate the request and package the outcome for the runner.
    pub fn evaluate(&mut self, request: &ExecutionRequest) -> WorkerReply {
        let outcome = self.drive(request);
        let console = self.drain_console().unwrap_or_else(|e| {
            tracing::warn!("Failed to collect console output: {}", e);
            Vec::new()
        });

        match outcome {
            Ok(result) => WorkerReply::completed(result, console),
            Err(err) => WorkerReply::failed(err, console),
        }
    }

    fn drive(&mut self, request: &ExecutionRequest) -> Result<ExecutionResult, SandboxError> {
        let body = format!("{}\n{}", request.code, request.test_script);
        let literal = serde_json::to_string(&body).map_err(HostError::from)?;
        self.call("start", &format!("__atlas.start({});", literal))?;

        loop {
            self.context.run_jobs();
            if let Some(err) = self.jobs.take_escaped() {
                return Err(HostError::from_js("run_jobs", err).into());
            }
            self.check_unhandled_rejections()?;

            let poll: Poll = serde_json::from_str(&self.call_for_string("poll", "__atlas.poll()")?)
                .map_err(HostError::from)?;

            match poll {
                Poll::Settled { outcome } => return settle(outcome),
                Poll::Idle => {
                    return Err(SandboxError::InternalFault(
                        "Test script never settled: no pending timers remain".to_string(),
                    ));
                }
                Poll::Waiting { delay_ms } => {
                    if delay_ms > 0.0 {
                        thread::sleep(Duration::from_millis(delay_ms.ceil() as u64));
                    }
                    self.call("fireNextTimer", "__atlas.fireNextTimer();")?;
                }
            }
        }
    }

    /// Fail the run if a rejected promise is still unhandled once the job
    /// queue has drained.
    fn check_unhandled_rejections(&mut self) -> Result<(), SandboxError> {
        let first = UNHANDLED_REJECTIONS.with(|pending| pending.borrow().first().cloned());
        let Some(promise) = first else {
            return Ok(());
        };

        let reason = match JsPromise::from_object(promise).map(|p| p.state()) {
            Ok(PromiseState::Rejected(reason)) => reason
                .to_string(&mut self.context)
                .map(|s| s.to_std_string_escaped())
                .unwrap_or_default(),
            _ => String::new(),
        };
        Err(SandboxError::InternalFault(format!(
            "Unhandled promise rejection: {}",
            reason
        )))
    }

    fn drain_console(&mut self) -> Result<Vec<String>, HostError> {
        let raw = self.call_for_string("drainConsole", "__atlas.drainConsole()")?;
        Ok(serde_json::from_str(&raw)?)
    }

    fn call(&mut self, call: &'static str, source: &str) -> Result<(), HostError> {
        self.context
            .eval(Source::from_bytes(source))
            .map(|_| ())
            .map_err(|e| HostError::from_js(call, e))
    }

    fn call_for_string(&mut self, call: &'static str, source: &str) -> Result<String, HostError> {
        let value = self
            .context
            .eval(Source::from_bytes(source))
            .map_err(|e| HostError::from_js(call, e))?;

        value
            .as_string()
            .map(|s| s.to_std_string_escaped())
            .ok_or(HostError::NotAString(call))
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        // Tracked promises must not outlive the context that created them.
        clear_unhandled_rejections();
    }
}

/// Evaluate one request in a fresh engine.
///
/// A panic inside the engine is turned into a failed reply.
pub fn evaluate(request: &ExecutionRequest, limits: &EngineLimits) -> WorkerReply {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| match Engine::new(limits) {
        Ok(mut engine) => engine.evaluate(request),
        Err(err) => WorkerReply::failed(err.into(), Vec::new()),
    }));

    outcome.unwrap_or_else(|payload| {
        clear_unhandled_rejections();
        WorkerReply::failed(panic_error(&*payload), Vec::new())
    })
}

fn panic_error(payload: &(dyn Any + Send)) -> SandboxError {
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_default();

    // boa panics when a runtime limit error reaches a promise reaction
    if message.contains("RuntimeLimit") {
        HostError::StackOverflow.into()
    } else {
        SandboxError::InternalFault(format!("JavaScript engine panicked: {}", message))
    }
}

fn settle(outcome: ScriptOutcome) -> Result<ExecutionResult, SandboxError> {
    match outcome {
        ScriptOutcome::Returned { value } => parse_report(value),
        ScriptOutcome::Threw { message } => Err(SandboxError::CandidateThrow(message)),
        ScriptOutcome::Faulted { message } => Err(SandboxError::InternalFault(message)),
    }
}

fn parse_report(value: Value) -> Result<ExecutionResult, SandboxError> {
    let report: ReturnedReport = serde_json::from_value(value).map_err(|e| {
        SandboxError::InternalFault(format!("Test script returned a malformed result: {}", e))
    })?;

    if report.passed > report.total {
        return Err(SandboxError::InternalFault(format!(
            "Test script returned a malformed result: passed ({}) exceeds total ({})",
            report.passed, report.total
        )));
    }

    Ok(ExecutionResult::completed(
        report.passed,
        report.total,
        report.checks,
    ))
}

//! Atlas sandbox
//!
//! Runs untrusted JavaScript against a test script in a disposable worker
//! process with a hard wall-clock deadline.

pub mod config;
pub mod engine;
pub mod protocol;
pub mod runner;

pub use config::{EngineLimits, SandboxConfig, RUN_TIMEOUT};
pub use runner::{ChallengeRunner, CodeRunner, RunReport};

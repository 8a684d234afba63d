//! Configuration for the challenge runner and its worker process

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Hard wall-clock budget of a single run, from invocation to settlement.
pub const RUN_TIMEOUT: Duration = Duration::from_millis(3000);

/// File name of the worker executable
pub const WORKER_BIN_NAME: &str = "atlas-worker";

/// Runner configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct SandboxConfig {
    /// Path to the `atlas-worker` executable
    pub worker_path: PathBuf,

    /// Wall-clock deadline per run
    pub timeout: Duration,

    /// Cap on bytes read from the worker's stdout and stderr
    pub max_reply_bytes: u64,

    /// Cap on `code` + `testScript` size in bytes
    pub max_source_bytes: usize,

    /// Engine limits forwarded to the worker
    pub engine: EngineLimits,
}

/// Limits applied inside the worker's JavaScript engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineLimits {
    /// Maximum JavaScript call depth
    pub recursion_limit: usize,

    /// Maximum number of values on the engine's operand stack
    pub stack_size_limit: usize,

    /// Maximum captured console lines
    pub max_console_lines: usize,
}

impl Default for EngineLimits {
    fn default() -> Self {
        Self {
            recursion_limit: 4096,
            stack_size_limit: 256 * 1024,
            max_console_lines: 200,
        }
    }
}

impl EngineLimits {
    pub const RECURSION_LIMIT_VAR: &'static str = "SANDBOX_RECURSION_LIMIT";
    pub const STACK_SIZE_LIMIT_VAR: &'static str = "SANDBOX_STACK_SIZE_LIMIT";
    pub const MAX_CONSOLE_LINES_VAR: &'static str = "SANDBOX_MAX_CONSOLE_LINES";

    /// Load engine limits from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            recursion_limit: parse_var(Self::RECURSION_LIMIT_VAR)
                .unwrap_or(defaults.recursion_limit),
            stack_size_limit: parse_var(Self::STACK_SIZE_LIMIT_VAR)
                .unwrap_or(defaults.stack_size_limit),
            max_console_lines: parse_var(Self::MAX_CONSOLE_LINES_VAR)
                .unwrap_or(defaults.max_console_lines),
        }
    }

    /// Environment the worker needs to rebuild these limits
    pub fn to_env(&self) -> [(&'static str, String); 3] {
        [
            (Self::RECURSION_LIMIT_VAR, self.recursion_limit.to_string()),
            (Self::STACK_SIZE_LIMIT_VAR, self.stack_size_limit.to_string()),
            (Self::MAX_CONSOLE_LINES_VAR, self.max_console_lines.to_string()),
        ]
    }
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            worker_path: default_worker_path(),
            timeout: RUN_TIMEOUT,
            max_reply_bytes: 1024 * 1024, // 1 MB
            max_source_bytes: 256 * 1024, // 256 KB
            engine: EngineLimits::default(),
        }
    }
}

impl SandboxConfig {
    /// Load configuration from environment variables.
    ///
    /// The timeout is not configurable here; it stays at [`RUN_TIMEOUT`].
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            worker_path: env::var("SANDBOX_WORKER_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.worker_path),
            timeout: RUN_TIMEOUT,
            max_reply_bytes: parse_var("SANDBOX_MAX_REPLY_BYTES")
                .unwrap_or(defaults.max_reply_bytes),
            max_source_bytes: parse_var("SANDBOX_MAX_SOURCE_BYTES")
                .unwrap_or(defaults.max_source_bytes),
            engine: EngineLimits::from_env(),
        }
    }

    /// Use a specific worker executable
    pub fn with_worker_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.worker_path = path.into();
        self
    }

    /// Whether the worker executable is present on disk
    pub fn worker_available(&self) -> bool {
        self.worker_path.is_file()
    }
}

/// `atlas-worker` next to the running executable, falling back to `$PATH`.
fn default_worker_path() -> PathBuf {
    env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(WORKER_BIN_NAME)))
        .filter(|candidate| candidate.is_file())
        .unwrap_or_else(|| PathBuf::from(WORKER_BIN_NAME))
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}

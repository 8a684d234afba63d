//! Common types and errors shared by the Atlas runner and gateway.

pub mod error;
pub mod types;

pub use error::{SandboxError, SandboxResult};
pub use types::*;

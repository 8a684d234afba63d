//! Runs domain module: execute candidate code in the sandbox.

mod handler;
mod request;

pub use handler::*;
pub use request::*;

//! Health probes.

mod handler;

pub use handler::*;

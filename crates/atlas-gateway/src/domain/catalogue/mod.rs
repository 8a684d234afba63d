//! Catalogue domain module: notes, algorithm topics and coding challenges.

mod handler;
mod model;
mod response;

pub use handler::*;
pub use model::*;
pub use response::*;

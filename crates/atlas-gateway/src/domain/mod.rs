//! Domain modules containing business logic and handlers.

pub mod catalogue;
pub mod health;
pub mod runs;

//! CLI command implementations.

pub mod common;
pub mod play;
pub mod probe;
pub mod record;

//! Command implementations and queue wiring.

mod commands;
mod wiring;

pub use commands::{clear, flush, push, status};

/// Result type for command handlers.
pub type AppResult<T> = Result<T, Box<dyn std::error::Error>>;

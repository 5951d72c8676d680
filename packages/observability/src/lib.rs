//! # Observability
//!
//! Centralized logging layer for the request queue workspace.
//!
//! ## Design Philosophy
//!
//! Crates are **log producers**. They use standard `tracing` macros and never
//! decide where output goes. Binaries call [`init`] or [`init_with_config`]
//! once at startup.
//!
//! ## Output
//!
//! Every event is written as one JSON line to a central file
//! (`~/.request-queue/logs/queue.jsonl` unless overridden), and optionally to
//! stderr in compact form for foreground runs:
//!
//! - `tail -f ~/.request-queue/logs/queue.jsonl | jq` for pretty JSON
//! - `lnav ~/.request-queue/logs/queue.jsonl` for interactive exploration
//!
//! Multi-process safety is achieved through append-only writes with
//! per-line flush semantics.
//!
//! ## Usage
//!
//! ```rust,ignore
//! observability::init_with_config(observability::LogConfig {
//!     service_name: "request-queue".into(),
//!     default_level: "debug".into(),
//!     also_stderr: true,
//!     ..Default::default()
//! });
//! tracing::info!("ready");
//! ```

mod json_layer;
mod sink;

use std::path::PathBuf;

pub use json_layer::{LogLine, RequestContext};
pub use sink::CentralLogWriter;

/// Configuration for the logging system.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Name of the service (e.g., "request-queue", "worker").
    /// Included in every log line for filtering.
    pub service_name: String,

    /// Default log level filter (e.g., "debug", "info", "warn").
    /// Can be overridden by `RUST_LOG` environment variable.
    pub default_level: String,

    /// Optional custom log file path.
    /// Defaults to `~/.request-queue/logs/queue.jsonl`.
    pub log_path: Option<PathBuf>,

    /// Also emit logs to stderr for immediate feedback.
    pub also_stderr: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "unknown".into(),
            default_level: "info".into(),
            log_path: None,
            also_stderr: false,
        }
    }
}

/// Initialize the logging layer with default settings.
///
/// ```rust,ignore
/// fn main() {
///     observability::init("my-service");
///     tracing::info!("ready");
/// }
/// ```
///
/// # Panics
///
/// Panics if the log file cannot be created or opened.
pub fn init(service_name: &str) {
    init_with_config(LogConfig {
        service_name: service_name.into(),
        ..Default::default()
    });
}

/// Initialize the logging layer with custom configuration.
///
/// Calling this more than once in a process is a no-op after the first
/// subscriber has been installed.
pub fn init_with_config(config: LogConfig) {
    sink::init_file_subscriber(&config);
}

/// Re-export tracing macros for convenience.
/// Services can use `observability::info!()` or `tracing::info!()`.
pub use tracing::{debug, error, info, instrument, trace, warn};

/// Re-export Level for advanced filtering.
pub use tracing::Level;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LogConfig::default();
        assert_eq!(config.service_name, "unknown");
        assert_eq!(config.default_level, "info");
        assert!(config.log_path.is_none());
        assert!(!config.also_stderr);
    }
}

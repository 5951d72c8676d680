//! Logging initialization for the request queue.
//!
//! Thin wrapper over the observability crate: structured JSONL goes to the
//! log file under the queue's base directory, compact lines to stderr.

use crate::Paths;

/// Initialize the logging system.
///
/// This sets up tracing with:
/// - Structured JSONL output to `<base>/logs/queue.jsonl`
/// - Log level from RUST_LOG env var or the provided default
/// - Service name included in every log line
///
/// ```ignore
/// init_logging(&paths, "info");
/// tracing::info!("queue started");
/// ```
pub fn init_logging(paths: &Paths, level: &str) {
    init_logging_for_service(paths, "request-queue", level);
}

/// Initialize logging with a custom service name.
pub fn init_logging_for_service(paths: &Paths, service_name: &str, level: &str) {
    observability::init_with_config(observability::LogConfig {
        service_name: service_name.into(),
        default_level: normalize_level(level).into(),
        log_path: Some(paths.log_file()),
        also_stderr: true,
    });
}

fn normalize_level(level: &str) -> &'static str {
    match parse_level(level) {
        tracing::Level::TRACE => "trace",
        tracing::Level::DEBUG => "debug",
        tracing::Level::INFO => "info",
        tracing::Level::WARN => "warn",
        tracing::Level::ERROR => "error",
    }
}

/// Parse a log level string into a tracing Level.
pub fn parse_level(level: &str) -> tracing::Level {
    match level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" | "warning" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    }
}

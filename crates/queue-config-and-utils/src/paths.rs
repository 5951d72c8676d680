//! File system paths for the request queue.

use crate::{CoreError, CoreResult};
use std::path::PathBuf;

/// Directory name under the home directory.
const BASE_DIR_NAME: &str = ".request-queue";

/// Manages file system paths for the request queue.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Base directory for runtime files (~/.request-queue)
    base_dir: PathBuf,
}

impl Paths {
    /// Create a new Paths instance rooted at `~/.request-queue`.
    pub fn new() -> CoreResult<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| CoreError::Path("Could not determine home directory".to_string()))?;

        Ok(Self {
            base_dir: home.join(BASE_DIR_NAME),
        })
    }

    /// Create a new Paths instance with a custom base directory.
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Get the base directory (~/.request-queue).
    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// Get the config file path (~/.request-queue/config.json).
    pub fn config_file(&self) -> PathBuf {
        self.base_dir.join("config.json")
    }

    /// Get the database file path (~/.request-queue/queue.sqlite).
    pub fn database_file(&self) -> PathBuf {
        self.base_dir.join("queue.sqlite")
    }

    /// Get the logs directory (~/.request-queue/logs).
    pub fn logs_dir(&self) -> PathBuf {
        self.base_dir.join("logs")
    }

    /// Get the JSONL log file path (~/.request-queue/logs/queue.jsonl).
    pub fn log_file(&self) -> PathBuf {
        self.logs_dir().join("queue.jsonl")
    }

    /// Ensure all required directories exist.
    pub fn ensure_dirs(&self) -> CoreResult<()> {
        std::fs::create_dir_all(&self.base_dir)?;
        std::fs::create_dir_all(self.logs_dir())?;
        Ok(())
    }
}

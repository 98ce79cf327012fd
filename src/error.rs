//! Error types for the measurement pipeline
//!
//! Only conditions a caller has to decide on are errors. Recoverable
//! measurement outcomes (a failed case, a missing metric line, a zero
//! denominator) are modelled as data in their own modules.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while building, running or post-processing a branch
#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("Build failed for branch '{branch}' (mode {mode}): {reason}")]
    BuildFailure {
        branch: String,
        mode: String,
        reason: String,
    },

    #[error("File not found: {}", .0.display())]
    FileAbsent(PathBuf),

    #[error("Failed to parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Failed to launch {}: {source}", program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, HarnessError>;

//! Error types for buddy-core

use thiserror::Error;

/// Main error type for the buddy-core library
///
/// Most of the detection pipeline never surfaces these: transient I/O
/// faults and malformed transcript lines are swallowed where they occur.
/// Errors only escape from setup paths (config loading, logging, starting
/// the directory watch).
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// File watcher backend error
    #[error("watch error: {0}")]
    Watch(#[from] notify::Error),

    /// The detection task panicked or was cancelled
    #[error("detector task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Result type alias for buddy-core
pub type Result<T> = std::result::Result<T, Error>;

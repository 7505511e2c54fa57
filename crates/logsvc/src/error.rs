//! Error types for the log service.

use thiserror::Error;

/// Errors that can occur in the log service.
#[derive(Debug, Error)]
pub enum LogError {
    /// Memory for a new entry could not be reserved.
    #[error("out of memory while storing log entry")]
    OutOfMemory,

    /// The delivery worker thread could not be started.
    #[error("failed to spawn delivery worker: {0}")]
    WorkerSpawn(#[from] std::io::Error),

    /// The delivery worker terminated abnormally.
    #[error("delivery worker panicked")]
    WorkerPanicked,

    /// A required field was not provided.
    #[error("missing required field: {0}")]
    MissingField(&'static str),
}

/// Result type alias for log service operations.
pub type Result<T> = std::result::Result<T, LogError>;

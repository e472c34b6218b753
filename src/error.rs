use thiserror::Error;

/// Result type for ring pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors that can occur while building or running the pipeline
///
/// Malformed tokens, buffer overflow and empty pops are part of normal
/// operation and never surface here.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A pipeline task could not be spawned
    #[error("Failed to spawn task {name}: {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// A pipeline task panicked before finishing
    #[error("Task {0} panicked")]
    ThreadPanicked(String),

    /// Reading input or writing output failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

//! CLI error types.

use thiserror::Error;

use logslice_core::SliceError;

/// Errors that end a `logslice` invocation.
#[derive(Debug, Error)]
pub enum CliError {
    /// The configuration file is missing, malformed or inconsistent.
    #[error("configuration error: {0}")]
    Config(String),

    /// The HTTP client could not be built.
    #[error("http client error: {0}")]
    Client(String),

    /// The retrieval run failed.
    #[error(transparent)]
    Slice(#[from] SliceError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for CLI operations.
pub type Result<T> = std::result::Result<T, CliError>;

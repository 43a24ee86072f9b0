//! Error types for scribe-core

use thiserror::Error;

/// Result type alias using scribe-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in scribe-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// libSQL error
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Note not found
    #[error("Note not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP transport error talking to the notes server
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The notes server rejected a request
    #[error("Server error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Invalid client configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

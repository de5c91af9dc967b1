//! Parley error types

use thiserror::Error;

/// Parley error type
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed input to cleaning or learning; no mutation was applied
    #[error("Validation error: {0}")]
    Validation(String),

    /// Input classified as garbage; no mutation was applied
    #[error("Rejected input: {0}")]
    Rejected(String),

    /// Primary snapshot write failed
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Secondary or remote backend failure
    #[error("Backend '{backend}' error: {message}")]
    Backend {
        /// Backend name
        backend: String,
        /// Failure detail
        message: String,
    },

    /// Snapshot failed to parse or violated its structural invariant
    #[error("Corrupt snapshot: {0}")]
    CorruptSnapshot(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Database error
    #[cfg(feature = "postgres")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Build a backend error tagged with the backend name
    pub fn backend(backend: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Backend {
            backend: backend.into(),
            message: message.to_string(),
        }
    }
}

/// Result type alias for Parley operations
pub type Result<T> = std::result::Result<T, Error>;

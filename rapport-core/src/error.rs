//! Error types for the rapport core library.
//!
//! Only persistence failures ever travel out of the store. Disabled features,
//! unknown keys and out-of-range scores are not errors here: they become
//! no-ops, `None`, and clamped values respectively.

use thiserror::Error;

/// Top-level error type for all rapport operations.
#[derive(Error, Debug)]
pub enum RapportError {
    /// Serialization or deserialization failure.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// SQLite persistence error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The persisted document could not be decoded.
    ///
    /// The store recovers from this by starting over with a fresh document;
    /// backends report it so the recovery can be logged.
    #[error("Corrupt persisted state: {0}")]
    CorruptState(String),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type alias.
pub type Result<T> = std::result::Result<T, RapportError>;

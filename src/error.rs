//! Error types for sharebox.

use thiserror::Error;

use crate::registry::PasswordError;

/// Common error type for sharebox.
#[derive(Error, Debug)]
pub enum ShareboxError {
    /// Database error.
    ///
    /// Covers an unreachable store, failed statements and rows that do not
    /// decode. Errors from sqlx are converted automatically.
    #[error("database error: {0}")]
    Database(String),

    /// A file record with this public UUID already exists.
    #[error("public uuid already registered: {0}")]
    DuplicateUuid(String),

    /// Password could not be digested.
    #[error("password error: {0}")]
    Password(#[from] PasswordError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<sqlx::Error> for ShareboxError {
    fn from(e: sqlx::Error) -> Self {
        ShareboxError::Database(e.to_string())
    }
}

/// Result type alias for sharebox operations.
pub type Result<T> = std::result::Result<T, ShareboxError>;

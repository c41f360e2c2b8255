//! Storage error types.

use thiserror::Error;

/// Errors surfaced by [`crate::Store`] operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Underlying SQLite failure.
    #[error("sqlite: {0}")]
    Sql(#[from] rusqlite::Error),

    /// The requested entity does not exist.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// The slug is already in use.
    #[error("slug already in use")]
    SlugTaken,

    /// Caller-supplied data violates an invariant.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A stored value could not be decoded back into its domain type.
    #[error("corrupt row: {0}")]
    Corrupt(String),
}

impl StorageError {
    pub(crate) fn corrupt(what: impl Into<String>) -> Self {
        Self::Corrupt(what.into())
    }
}

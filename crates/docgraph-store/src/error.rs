//! Store error types.

use thiserror::Error;

/// Store error type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The backing store could not be reached. Transient.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A document failed validation at the store boundary.
    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    /// A document with the same id already exists in the collection.
    #[error("Duplicate id {id} in collection {collection}")]
    DuplicateId { collection: String, id: String },

    /// A glob pattern could not be compiled.
    #[error("Invalid pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

impl StoreError {
    /// Whether retrying the same call later could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// Result type alias using StoreError.
pub type StoreResult<T> = Result<T, StoreError>;

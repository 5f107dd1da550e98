//! Error types for entity operations.

use docgraph_query::QueryError;
use docgraph_store::StoreError;
use thiserror::Error;

/// Entity operation error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EntityError {
    /// The request is malformed.
    #[error("{0}")]
    BadRequest(String),

    /// The addressed document does not exist.
    #[error("{0}")]
    NotFound(String),

    /// Reading failed.
    #[error(transparent)]
    Query(#[from] QueryError),

    /// Writing failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl EntityError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// HTTP-equivalent status class.
    pub fn status(&self) -> u16 {
        match self {
            Self::BadRequest(_) => 400,
            Self::NotFound(_) => 404,
            Self::Query(err) => err.status(),
            Self::Store(StoreError::Unavailable(_)) => 503,
            Self::Store(_) => 400,
        }
    }
}

/// Result type alias using EntityError.
pub type EntityResult<T> = Result<T, EntityError>;

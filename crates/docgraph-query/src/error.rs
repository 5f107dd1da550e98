//! Query error types.

use docgraph_store::StoreError;
use thiserror::Error;

/// Query error type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// Malformed selector, filter or request shape.
    #[error("Bad selector {fragment:?}: {reason}")]
    BadSelector { fragment: String, reason: String },

    /// The caller may not see the collection or document. `id` is `*` when
    /// the whole collection is denied.
    #[error("Forbidden: {collection}/{id}")]
    Forbidden { collection: String, id: String },

    /// The document store could not be reached. The whole pass fails.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// The document store rejected or corrupted a call.
    #[error("Store error: {0}")]
    Store(StoreError),
}

impl QueryError {
    pub fn bad_selector(fragment: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::BadSelector {
            fragment: fragment.into(),
            reason: reason.into(),
        }
    }

    pub fn forbidden(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self::Forbidden {
            collection: collection.into(),
            id: id.into(),
        }
    }

    /// HTTP-equivalent status class of the error.
    pub fn status(&self) -> u16 {
        match self {
            Self::BadSelector { .. } => 400,
            Self::Forbidden { .. } => 403,
            Self::StoreUnavailable(_) => 503,
            Self::Store(_) => 500,
        }
    }
}

impl From<StoreError> for QueryError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(reason) => Self::StoreUnavailable(reason),
            StoreError::InvalidPattern { pattern, reason } => Self::BadSelector {
                fragment: pattern,
                reason,
            },
            other => Self::Store(other),
        }
    }
}

/// Result type alias using QueryError.
pub type QueryResult<T> = Result<T, QueryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_map_to_query_errors() {
        assert_eq!(
            QueryError::from(StoreError::Unavailable("down".into())),
            QueryError::StoreUnavailable("down".into())
        );
        let err = QueryError::from(StoreError::InvalidPattern {
            pattern: "[a".into(),
            reason: "unclosed".into(),
        });
        assert_eq!(err.status(), 400);
        assert!(matches!(err, QueryError::BadSelector { ref fragment, .. } if fragment == "[a"));
    }

    #[test]
    fn status_classes() {
        assert_eq!(QueryError::forbidden("vm", "3").status(), 403);
        assert_eq!(QueryError::StoreUnavailable(String::new()).status(), 503);
        assert_eq!(QueryError::forbidden("vm", "*").to_string(), "Forbidden: vm/*");
    }
}

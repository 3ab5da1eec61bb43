//! Backing store error types.

use thiserror::Error;

/// Result type for backing store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Outcomes other than success reported by a backing store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// No entity with this id exists in the collection.
    #[error("{collection}/{id} not found")]
    NotFound { collection: String, id: String },

    /// An entity with this id already exists in the collection.
    #[error("{collection}/{id} already exists")]
    Conflict { collection: String, id: String },

    /// The store failed for reasons unrelated to the request.
    #[error("Store error: {0}")]
    Server(String),
}

impl StoreError {
    /// Create a new "not found" error.
    pub fn not_found(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            collection: collection.into(),
            id: id.into(),
        }
    }

    /// Create a new "conflict" error.
    pub fn conflict(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self::Conflict {
            collection: collection.into(),
            id: id.into(),
        }
    }

    /// Create a new "server" error.
    pub fn server(msg: impl Into<String>) -> Self {
        Self::Server(msg.into())
    }
}

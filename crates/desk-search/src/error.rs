//! Search error types.

use thiserror::Error;

use desk_embeddings::EmbeddingError;
use desk_storage::StorageError;

/// Errors surfaced by the search service.
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Unknown search mode: {0}")]
    InvalidMode(String),

    /// Semantic and hybrid searches fail outright when the provider does;
    /// there is no silent downgrade to keyword results.
    #[error("Embedding provider error: {0}")]
    Provider(#[from] EmbeddingError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

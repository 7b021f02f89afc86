//! Embedding provider error types.

use thiserror::Error;

/// Errors from the embedding provider client.
///
/// Search paths treat every variant the same way (hard failure); the
/// enrichment lifecycle logs and moves on.
#[derive(Error, Debug)]
pub enum EmbeddingError {
    /// Transport failure or non-success HTTP status
    #[error("Embedding API error: {0}")]
    Api(String),

    /// Response body did not match the expected shape
    #[error("Unexpected embedding response: {0}")]
    Parse(String),

    /// Client could not be constructed
    #[error("Embedding client configuration error: {0}")]
    Config(String),
}

//! Enrichment error types.

use thiserror::Error;

use desk_embeddings::EmbeddingError;
use desk_storage::StorageError;

/// Errors from the thesis-extraction API client.
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Extraction API error: {0}")]
    Api(String),

    #[error("Unexpected extraction response: {0}")]
    Parse(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Errors surfaced by the enrichment layer.
#[derive(Error, Debug)]
pub enum EnrichError {
    #[error("Embedding provider error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("No thesis extractor configured")]
    ExtractorUnavailable,

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

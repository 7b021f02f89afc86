//! Embedding provider client and similarity engine.
//!
//! The provider is a black box `text -> vector` over HTTP. Everything that
//! scores vectors goes through [`similarity::cosine_similarity`], the one
//! shared implementation.

pub mod error;
pub mod mock;
pub mod provider;
pub mod similarity;

pub use error::EmbeddingError;
pub use mock::MockEmbedder;
pub use provider::{EmbeddingProvider, OpenAiConfig, OpenAiEmbedder};
pub use similarity::{cosine_similarity, round_score};

/// Output dimension of the default embedding model.
pub const DEFAULT_DIMENSION: usize = 1536; // text-embedding-3-small

/// Default embedding model name.
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

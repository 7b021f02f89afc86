//! Keyword, semantic and hybrid search over stocks and members.
//!
//! Three modes share one entry point:
//! - `keyword`: capped LIKE substring match, id order
//! - `semantic`: embed the query, cosine-rank entities that have embeddings
//! - `hybrid`: the semantic block first, then unseen keyword matches

pub mod engine;
pub mod error;
pub mod mode;

pub use engine::{SearchHit, SearchService};
pub use error::SearchError;
pub use mode::SearchMode;

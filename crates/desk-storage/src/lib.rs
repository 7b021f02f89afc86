//! SQLite persistence for the research desk.
//!
//! Provides a single shared [`Database`] handle with:
//! - Stock and member CRUD with partial updates
//! - Filtered listings and capped keyword (LIKE) search
//! - Embedding BLOB storage isolated from content timestamps
//! - Member-to-stock link tables synced wholesale

pub mod db;
pub mod error;
mod members;
mod stocks;

pub use db::{blob_to_vector, vector_to_blob, Database};
pub use error::StorageError;
pub use members::MemberFilter;
pub use stocks::StockFilter;

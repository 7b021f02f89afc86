//! Shared domain types for Research Desk.
//!
//! This crate defines the two searchable entity kinds (stocks and members),
//! the structured thesis-analysis payload, application configuration, and
//! the error type shared across crates.

pub mod config;
pub mod error;
pub mod member;
pub mod stock;

pub use config::{BackfillSettings, OpenAiSettings, SearchSettings, Settings};
pub use error::DeskError;
pub use member::{LinkedStock, Member, MemberUpdate, NewMember, StockLink};
pub use stock::{
    BulkStockUpdate, ConvictionLevel, NewStock, Stock, StockMetadata, StockUpdate,
    ThesisAnalysis, TimeHorizon,
};

//! HTTP API for the research desk.
//!
//! `/v1` CRUD and search over stocks and members, backed by the storage,
//! search, and enrichment layers; permissive CORS and request tracing on
//! every route.

pub mod error;
pub mod handlers;
pub mod responses;
pub mod server;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use server::{build_router, run};
pub use state::AppState;

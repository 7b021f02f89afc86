//! Shared handler state.

use std::sync::Arc;

use desk_enrich::{Backfill, Enricher};
use desk_search::SearchService;
use desk_storage::Database;

/// Everything a handler can reach. Cloned per request; all fields are `Arc`s.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub search: Arc<SearchService>,
    pub enricher: Arc<Enricher>,
    pub backfill: Arc<Backfill>,
}

impl AppState {
    pub fn new(
        db: Arc<Database>,
        search: Arc<SearchService>,
        enricher: Arc<Enricher>,
        backfill: Arc<Backfill>,
    ) -> Self {
        Self {
            db,
            search,
            enricher,
            backfill,
        }
    }
}

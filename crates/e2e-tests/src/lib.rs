//! Shared fixtures for the end-to-end suite.
//!
//! [`TestHarness`] wires the real storage, search, and enrichment layers
//! against an in-memory database and a deterministic [`MockEmbedder`], so
//! tests exercise the same object graph the daemon assembles at startup.
//! HTTP tests mount [`desk_server::build_router`] over [`TestHarness::state`].

use std::sync::Arc;
use std::time::Duration;

use desk_embeddings::{EmbeddingProvider, MockEmbedder};
use desk_enrich::{Backfill, Enricher, ThesisExtractor};
use desk_search::SearchService;
use desk_server::AppState;
use desk_storage::Database;
use desk_types::{NewMember, NewStock, SearchSettings, StockMetadata};

pub struct TestHarness {
    pub db: Arc<Database>,
    pub embedder: Arc<MockEmbedder>,
    pub search: Arc<SearchService>,
    pub enricher: Arc<Enricher>,
    pub backfill: Arc<Backfill>,
}

impl TestHarness {
    /// Harness whose embedder synthesizes a distinct vector per input text.
    pub fn new(dimension: usize) -> Self {
        Self::build(MockEmbedder::new(dimension))
    }

    /// Harness whose embedder returns `values` for every input.
    pub fn returning(values: Vec<f32>) -> Self {
        Self::build(MockEmbedder::returning(values))
    }

    /// Harness whose embedder fails every call.
    pub fn failing(dimension: usize) -> Self {
        Self::build(MockEmbedder::failing(dimension))
    }

    fn build(embedder: MockEmbedder) -> Self {
        let db = Arc::new(Database::in_memory().expect("open in-memory database"));
        let embedder = Arc::new(embedder);
        let provider: Arc<dyn EmbeddingProvider> = embedder.clone();
        let search = Arc::new(SearchService::new(
            db.clone(),
            provider.clone(),
            SearchSettings::default(),
        ));
        let enricher = Arc::new(Enricher::new(db.clone(), provider.clone()));
        let backfill = Arc::new(Backfill::new(db.clone(), provider, Duration::ZERO));
        Self {
            db,
            embedder,
            search,
            enricher,
            backfill,
        }
    }

    /// Swap in a thesis extractor; hooks and the extract endpoint pick it up.
    pub fn with_extractor(mut self, extractor: Arc<dyn ThesisExtractor>) -> Self {
        let provider: Arc<dyn EmbeddingProvider> = self.embedder.clone();
        self.enricher = Arc::new(
            Enricher::new(self.db.clone(), provider).with_extractor(extractor),
        );
        self
    }

    /// State suitable for [`desk_server::build_router`].
    pub fn state(&self) -> AppState {
        AppState::new(
            self.db.clone(),
            self.search.clone(),
            self.enricher.clone(),
            self.backfill.clone(),
        )
    }
}

/// Minimal valid stock payload.
pub fn new_stock(name: &str, ticker: &str) -> NewStock {
    NewStock {
        name: name.to_string(),
        ticker: ticker.to_string(),
        ..NewStock::default()
    }
}

/// Stock payload carrying an investment thesis in its metadata.
pub fn stock_with_thesis(name: &str, ticker: &str, thesis: &str) -> NewStock {
    NewStock {
        name: name.to_string(),
        ticker: ticker.to_string(),
        metadata: StockMetadata {
            investment_thesis: Some(thesis.to_string()),
            ..StockMetadata::default()
        },
        ..NewStock::default()
    }
}

/// Minimal valid member payload. `is_active` defaults to true on the wire,
/// so the helper mirrors that rather than the derived `false`.
pub fn new_member(name: &str) -> NewMember {
    NewMember {
        name: name.to_string(),
        is_active: true,
        ..NewMember::default()
    }
}

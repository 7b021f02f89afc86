//! Post-write enrichment hooks.
//!
//! Write paths call these explicitly after a create or update has been
//! committed. Embedding and extraction failures are soft: the hook logs a
//! warning and reports a status, and the entity write stands either way.
//! Successful refreshes go through the side-channel setters, so they never
//! move `updated_at` or trigger further hooks.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, warn};

use desk_embeddings::EmbeddingProvider;
use desk_storage::Database;
use desk_types::{Member, Stock, ThesisAnalysis};

use crate::error::EnrichError;
use crate::extract::ThesisExtractor;

/// Outcome of a post-write embed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbedStatus {
    /// Embedding generated and stored
    Embedded,
    /// Nothing to embed
    Skipped,
    /// Provider or storage failed; the entity write already succeeded
    Failed,
}

impl EmbedStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmbedStatus::Embedded => "embedded",
            EmbedStatus::Skipped => "skipped",
            EmbedStatus::Failed => "failed",
        }
    }
}

/// Runs embedding refreshes and thesis extraction after entity writes.
pub struct Enricher {
    db: Arc<Database>,
    embedder: Arc<dyn EmbeddingProvider>,
    extractor: Option<Arc<dyn ThesisExtractor>>,
}

impl Enricher {
    pub fn new(db: Arc<Database>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            db,
            embedder,
            extractor: None,
        }
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn ThesisExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    /// Hook to run after a stock insert. Embeds the canonical text and, when
    /// the stock carries a thesis, attempts extraction as well.
    pub async fn stock_created(&self, stock: &Stock) -> EmbedStatus {
        let status = self.soften("stock", stock.id, self.embed_stock(stock).await);
        if stock.metadata.thesis().is_some() {
            self.extract_softly(stock).await;
        }
        status
    }

    /// Hook to run after a stock update. Re-embeds unconditionally; the
    /// stored vector must track the current text even for edits outside the
    /// canonical fields. Extraction reruns only when the thesis changed.
    pub async fn stock_updated(&self, stock: &Stock, thesis_changed: bool) -> EmbedStatus {
        let status = self.soften("stock", stock.id, self.embed_stock(stock).await);
        if thesis_changed && stock.metadata.thesis().is_some() {
            self.extract_softly(stock).await;
        }
        status
    }

    /// Hook to run after a member insert or update.
    pub async fn member_saved(&self, member: &Member) -> EmbedStatus {
        self.soften("member", member.id, self.embed_member(member).await)
    }

    /// Run extraction for this stock and persist the stamped result.
    ///
    /// Unlike the soft hooks, errors surface to the caller; the explicit
    /// extraction endpoint reports them.
    pub async fn extract_thesis(&self, stock: &Stock) -> Result<ThesisAnalysis, EnrichError> {
        let extractor = self
            .extractor
            .as_ref()
            .ok_or(EnrichError::ExtractorUnavailable)?;
        let thesis = stock.metadata.thesis().ok_or_else(|| {
            EnrichError::InvalidInput(format!(
                "stock {} has no investment thesis to analyze",
                stock.id
            ))
        })?;

        let mut analysis = extractor.extract(thesis).await?;
        analysis.extracted_at = Some(Utc::now());
        analysis.extraction_model = Some(extractor.model_name().to_string());

        self.db.set_stock_thesis_analysis(stock.id, &analysis)?;
        Ok(analysis)
    }

    async fn embed_stock(&self, stock: &Stock) -> Result<EmbedStatus, EnrichError> {
        let text = stock.embedding_text();
        if text.trim().is_empty() {
            return Ok(EmbedStatus::Skipped);
        }
        let vector = self.embedder.embed(&text).await?;
        self.db.set_stock_embedding(stock.id, &vector)?;
        Ok(EmbedStatus::Embedded)
    }

    async fn embed_member(&self, member: &Member) -> Result<EmbedStatus, EnrichError> {
        let text = member.embedding_text();
        if text.trim().is_empty() {
            return Ok(EmbedStatus::Skipped);
        }
        let vector = self.embedder.embed(&text).await?;
        self.db.set_member_embedding(member.id, &vector)?;
        Ok(EmbedStatus::Embedded)
    }

    fn soften(
        &self,
        kind: &'static str,
        id: i64,
        result: Result<EmbedStatus, EnrichError>,
    ) -> EmbedStatus {
        match result {
            Ok(status) => status,
            Err(error) => {
                warn!(
                    kind,
                    id,
                    error = %error,
                    "embedding refresh failed; entity write already committed"
                );
                EmbedStatus::Failed
            }
        }
    }

    async fn extract_softly(&self, stock: &Stock) {
        match self.extract_thesis(stock).await {
            Ok(_) => {}
            Err(EnrichError::ExtractorUnavailable) => {
                debug!(stock_id = stock.id, "no thesis extractor configured");
            }
            Err(error) => {
                warn!(
                    stock_id = stock.id,
                    error = %error,
                    "thesis extraction failed; stock write already committed"
                );
            }
        }
    }
}

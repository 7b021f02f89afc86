//! Serial embedding backfill with paced provider calls.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::time::sleep;
use tracing::{info, warn};

use desk_embeddings::EmbeddingProvider;
use desk_storage::{Database, MemberFilter, StockFilter};

use crate::error::EnrichError;

/// Counters for one backfill run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BackfillStats {
    /// Entities examined
    pub scanned: usize,
    /// Embeddings written
    pub embedded: usize,
    /// Entities left alone: already embedded, or nothing to embed
    pub skipped: usize,
    /// Provider or storage failures, logged and stepped over
    pub failed: usize,
}

impl BackfillStats {
    pub fn merge(&mut self, other: &BackfillStats) {
        self.scanned += other.scanned;
        self.embedded += other.embedded;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }
}

/// Walks entities one at a time and fills in missing embeddings.
///
/// Strictly serial: at most one provider call in flight, with a pause after
/// every call so bulk runs stay inside provider rate limits. Skipped
/// entities cost no pause. Entities that already have an embedding are left
/// alone unless listed by id, which forces a refresh.
pub struct Backfill {
    db: Arc<Database>,
    embedder: Arc<dyn EmbeddingProvider>,
    delay: Duration,
}

impl Backfill {
    pub fn new(db: Arc<Database>, embedder: Arc<dyn EmbeddingProvider>, delay: Duration) -> Self {
        Self {
            db,
            embedder,
            delay,
        }
    }

    /// Backfill stock embeddings. `ids` restricts (and forces) the run;
    /// `limit` caps how many rows are examined.
    pub async fn run_stocks(
        &self,
        ids: Option<&[i64]>,
        limit: Option<usize>,
    ) -> Result<BackfillStats, EnrichError> {
        let (stocks, force) = match ids {
            Some(ids) => (self.db.stocks_by_ids(ids)?, true),
            None => (self.db.list_stocks(&StockFilter::default())?, false),
        };

        let mut stats = BackfillStats::default();
        for stock in stocks.into_iter().take(limit.unwrap_or(usize::MAX)) {
            stats.scanned += 1;
            if !force && stock.has_embedding() {
                stats.skipped += 1;
                continue;
            }
            let text = stock.embedding_text();
            if text.trim().is_empty() {
                stats.skipped += 1;
                continue;
            }

            match self.embedder.embed(&text).await {
                Ok(vector) => match self.db.set_stock_embedding(stock.id, &vector) {
                    Ok(()) => stats.embedded += 1,
                    Err(error) => {
                        warn!(stock_id = stock.id, error = %error, "failed to store embedding");
                        stats.failed += 1;
                    }
                },
                Err(error) => {
                    warn!(stock_id = stock.id, error = %error, "provider call failed");
                    stats.failed += 1;
                }
            }
            self.pace().await;
        }

        info!(
            scanned = stats.scanned,
            embedded = stats.embedded,
            skipped = stats.skipped,
            failed = stats.failed,
            "stock backfill complete"
        );
        Ok(stats)
    }

    /// Backfill member embeddings; same contract as [`Self::run_stocks`].
    pub async fn run_members(
        &self,
        ids: Option<&[i64]>,
        limit: Option<usize>,
    ) -> Result<BackfillStats, EnrichError> {
        let (members, force) = match ids {
            Some(ids) => (self.db.members_by_ids(ids)?, true),
            None => (self.db.list_members(&MemberFilter::default())?, false),
        };

        let mut stats = BackfillStats::default();
        for member in members.into_iter().take(limit.unwrap_or(usize::MAX)) {
            stats.scanned += 1;
            if !force && member.has_embedding() {
                stats.skipped += 1;
                continue;
            }
            let text = member.embedding_text();
            if text.trim().is_empty() {
                stats.skipped += 1;
                continue;
            }

            match self.embedder.embed(&text).await {
                Ok(vector) => match self.db.set_member_embedding(member.id, &vector) {
                    Ok(()) => stats.embedded += 1,
                    Err(error) => {
                        warn!(member_id = member.id, error = %error, "failed to store embedding");
                        stats.failed += 1;
                    }
                },
                Err(error) => {
                    warn!(member_id = member.id, error = %error, "provider call failed");
                    stats.failed += 1;
                }
            }
            self.pace().await;
        }

        info!(
            scanned = stats.scanned,
            embedded = stats.embedded,
            skipped = stats.skipped,
            failed = stats.failed,
            "member backfill complete"
        );
        Ok(stats)
    }

    async fn pace(&self) {
        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }
    }
}

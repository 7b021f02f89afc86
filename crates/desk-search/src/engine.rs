//! Search service: keyword, semantic and hybrid retrieval.
//!
//! Semantic search embeds the query, linearly scans every entity that has an
//! embedding and ranks by cosine similarity. Hybrid mode returns the semantic
//! block first, then appends keyword matches not already present; the two
//! blocks are never re-ranked against each other.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info};

use desk_embeddings::{cosine_similarity, round_score, EmbeddingProvider};
use desk_storage::Database;
use desk_types::{Member, SearchSettings, Stock};

use crate::error::SearchError;
use crate::mode::SearchMode;

/// One search result. `similarity` is set only for semantic hits; keyword
/// hits in a hybrid response carry `None`.
#[derive(Debug, Clone)]
pub struct SearchHit<T> {
    pub entity: T,
    pub similarity: Option<f32>,
}

/// Shared search engine for stocks and members.
pub struct SearchService {
    db: Arc<Database>,
    embedder: Arc<dyn EmbeddingProvider>,
    limits: SearchSettings,
}

impl SearchService {
    pub fn new(
        db: Arc<Database>,
        embedder: Arc<dyn EmbeddingProvider>,
        limits: SearchSettings,
    ) -> Self {
        Self {
            db,
            embedder,
            limits,
        }
    }

    pub async fn search_stocks(
        &self,
        query: &str,
        mode: SearchMode,
    ) -> Result<Vec<SearchHit<Stock>>, SearchError> {
        let query = validate_query(query)?;
        debug!(query = %query, mode = %mode, "stock search");

        let hits = match mode {
            SearchMode::Keyword => keyword_hits(
                self.db
                    .keyword_search_stocks(query, self.limits.keyword_limit)?,
            ),
            SearchMode::Semantic => self.semantic_stocks(query).await?,
            SearchMode::Hybrid => {
                let mut hits = self.semantic_stocks(query).await?;
                let seen: HashSet<i64> = hits.iter().map(|h| h.entity.id).collect();
                for stock in self
                    .db
                    .keyword_search_stocks(query, self.limits.keyword_limit)?
                {
                    if !seen.contains(&stock.id) {
                        hits.push(SearchHit {
                            entity: stock,
                            similarity: None,
                        });
                    }
                }
                hits
            }
        };

        info!(query = %query, mode = %mode, results = hits.len(), "stock search complete");
        Ok(hits)
    }

    pub async fn search_members(
        &self,
        query: &str,
        mode: SearchMode,
    ) -> Result<Vec<SearchHit<Member>>, SearchError> {
        let query = validate_query(query)?;
        debug!(query = %query, mode = %mode, "member search");

        let hits = match mode {
            SearchMode::Keyword => keyword_hits(
                self.db
                    .keyword_search_members(query, self.limits.keyword_limit)?,
            ),
            SearchMode::Semantic => self.semantic_members(query).await?,
            SearchMode::Hybrid => {
                let mut hits = self.semantic_members(query).await?;
                let seen: HashSet<i64> = hits.iter().map(|h| h.entity.id).collect();
                for member in self
                    .db
                    .keyword_search_members(query, self.limits.keyword_limit)?
                {
                    if !seen.contains(&member.id) {
                        hits.push(SearchHit {
                            entity: member,
                            similarity: None,
                        });
                    }
                }
                hits
            }
        };

        info!(query = %query, mode = %mode, results = hits.len(), "member search complete");
        Ok(hits)
    }

    async fn semantic_stocks(&self, query: &str) -> Result<Vec<SearchHit<Stock>>, SearchError> {
        let query_vector = self.embedder.embed(query).await?;
        let candidates = self.db.stocks_with_embedding()?;
        Ok(rank_by_similarity(
            candidates,
            &query_vector,
            self.limits.semantic_limit,
            |stock: &Stock| stock.embedding.as_deref(),
        ))
    }

    async fn semantic_members(&self, query: &str) -> Result<Vec<SearchHit<Member>>, SearchError> {
        let query_vector = self.embedder.embed(query).await?;
        let candidates = self.db.members_with_embedding()?;
        Ok(rank_by_similarity(
            candidates,
            &query_vector,
            self.limits.semantic_limit,
            |member: &Member| member.embedding.as_deref(),
        ))
    }
}

fn validate_query(query: &str) -> Result<&str, SearchError> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return Err(SearchError::InvalidQuery(
            "search query must not be empty".to_string(),
        ));
    }
    Ok(trimmed)
}

fn keyword_hits<T>(entities: Vec<T>) -> Vec<SearchHit<T>> {
    entities
        .into_iter()
        .map(|entity| SearchHit {
            entity,
            similarity: None,
        })
        .collect()
}

/// Score, sort descending and truncate. Candidates arrive in ascending id
/// order and the sort is stable, so equal scores keep that order.
fn rank_by_similarity<T>(
    candidates: Vec<T>,
    query_vector: &[f32],
    limit: usize,
    embedding_of: impl Fn(&T) -> Option<&[f32]>,
) -> Vec<SearchHit<T>> {
    let mut hits: Vec<SearchHit<T>> = candidates
        .into_iter()
        .filter_map(|entity| {
            let score = embedding_of(&entity)
                .map(|embedding| round_score(cosine_similarity(query_vector, embedding)))?;
            Some(SearchHit {
                entity,
                similarity: Some(score),
            })
        })
        .collect();

    hits.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(Ordering::Equal)
    });
    hits.truncate(limit);
    hits
}

#[cfg(test)]
mod tests {
    use super::*;
    use desk_embeddings::MockEmbedder;
    use desk_types::{NewMember, NewStock};

    fn seeded() -> (Arc<Database>, Vec<i64>) {
        let db = Arc::new(Database::in_memory().unwrap());
        let mut ids = Vec::new();
        for (name, ticker) in [
            ("Energy Corp", "ENRG"),
            ("Chipworks", "CHIP"),
            ("Green Energy", "GRN"),
        ] {
            ids.push(
                db.insert_stock(&NewStock {
                    name: name.to_string(),
                    ticker: ticker.to_string(),
                    ..Default::default()
                })
                .unwrap()
                .id,
            );
        }
        (db, ids)
    }

    fn service(db: Arc<Database>, embedder: Arc<MockEmbedder>) -> SearchService {
        SearchService::new(db, embedder, SearchSettings::default())
    }

    #[tokio::test]
    async fn test_semantic_ranks_by_similarity() {
        let (db, ids) = seeded();
        db.set_stock_embedding(ids[0], &[1.0, 0.0]).unwrap();
        db.set_stock_embedding(ids[1], &[0.0, 1.0]).unwrap();

        let embedder = Arc::new(MockEmbedder::returning(vec![1.0, 0.0]));
        let svc = service(db, embedder);

        let hits = svc.search_stocks("storage", SearchMode::Semantic).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].entity.id, ids[0]);
        assert_eq!(hits[0].similarity, Some(1.0));
        assert_eq!(hits[1].entity.id, ids[1]);
        assert_eq!(hits[1].similarity, Some(0.0));
    }

    #[tokio::test]
    async fn test_semantic_scores_are_rounded() {
        let (db, ids) = seeded();
        db.set_stock_embedding(ids[0], &[1.0, 1.0]).unwrap();

        let embedder = Arc::new(MockEmbedder::returning(vec![1.0, 0.0]));
        let svc = service(db, embedder);

        let hits = svc.search_stocks("storage", SearchMode::Semantic).await.unwrap();
        // cos([1,0], [1,1]) = 1/sqrt(2), rounded to 4 decimal places
        assert_eq!(hits[0].similarity, Some(0.7071));
    }

    #[tokio::test]
    async fn test_semantic_ties_keep_id_order() {
        let (db, ids) = seeded();
        db.set_stock_embedding(ids[2], &[1.0, 0.0]).unwrap();
        db.set_stock_embedding(ids[0], &[1.0, 0.0]).unwrap();

        let embedder = Arc::new(MockEmbedder::returning(vec![1.0, 0.0]));
        let svc = service(db, embedder);

        let hits = svc.search_stocks("storage", SearchMode::Semantic).await.unwrap();
        assert_eq!(
            hits.iter().map(|h| h.entity.id).collect::<Vec<_>>(),
            vec![ids[0], ids[2]]
        );
    }

    #[tokio::test]
    async fn test_semantic_caps_at_limit() {
        let db = Arc::new(Database::in_memory().unwrap());
        for i in 0..12 {
            let stock = db
                .insert_stock(&NewStock {
                    name: format!("Stock {i}"),
                    ticker: format!("S{i}"),
                    ..Default::default()
                })
                .unwrap();
            db.set_stock_embedding(stock.id, &[1.0, i as f32]).unwrap();
        }

        let embedder = Arc::new(MockEmbedder::returning(vec![1.0, 0.0]));
        let svc = service(db, embedder);

        let hits = svc.search_stocks("anything", SearchMode::Semantic).await.unwrap();
        assert_eq!(hits.len(), 10);
    }

    #[tokio::test]
    async fn test_keyword_mode_never_embeds() {
        let (db, ids) = seeded();
        let embedder = Arc::new(MockEmbedder::new(2));
        let svc = service(db, embedder.clone());

        let hits = svc.search_stocks("energy", SearchMode::Keyword).await.unwrap();
        assert_eq!(
            hits.iter().map(|h| h.entity.id).collect::<Vec<_>>(),
            vec![ids[0], ids[2]]
        );
        assert!(hits.iter().all(|h| h.similarity.is_none()));
        assert_eq!(embedder.call_count(), 0);
    }

    #[tokio::test]
    async fn test_hybrid_appends_unseen_keyword_hits() {
        let (db, ids) = seeded();
        // Only Energy Corp is embedded; Green Energy matches by keyword only.
        db.set_stock_embedding(ids[0], &[1.0, 0.0]).unwrap();

        let embedder = Arc::new(MockEmbedder::returning(vec![1.0, 0.0]));
        let svc = service(db, embedder);

        let hits = svc.search_stocks("energy", SearchMode::Hybrid).await.unwrap();
        assert_eq!(
            hits.iter().map(|h| h.entity.id).collect::<Vec<_>>(),
            vec![ids[0], ids[2]]
        );
        // Semantic block keeps its score, the keyword tail has none.
        assert_eq!(hits[0].similarity, Some(1.0));
        assert_eq!(hits[1].similarity, None);
    }

    #[tokio::test]
    async fn test_hybrid_keeps_low_scoring_semantic_hit_over_keyword_copy() {
        let (db, ids) = seeded();
        // Green Energy is both a semantic candidate (poor score) and a
        // keyword match; it must appear once, in the semantic block.
        db.set_stock_embedding(ids[2], &[0.0, 1.0]).unwrap();

        let embedder = Arc::new(MockEmbedder::returning(vec![1.0, 0.0]));
        let svc = service(db, embedder);

        let hits = svc.search_stocks("energy", SearchMode::Hybrid).await.unwrap();
        let green: Vec<_> = hits.iter().filter(|h| h.entity.id == ids[2]).collect();
        assert_eq!(green.len(), 1);
        assert_eq!(green[0].similarity, Some(0.0));
    }

    #[tokio::test]
    async fn test_hybrid_fails_when_provider_does() {
        let (db, ids) = seeded();
        db.set_stock_embedding(ids[0], &[1.0, 0.0]).unwrap();

        let embedder = Arc::new(MockEmbedder::failing(2));
        let svc = service(db, embedder);

        let err = svc.search_stocks("energy", SearchMode::Hybrid).await.unwrap_err();
        assert!(matches!(err, SearchError::Provider(_)), "{err}");
    }

    #[tokio::test]
    async fn test_blank_query_is_rejected() {
        let (db, _) = seeded();
        let svc = service(db, Arc::new(MockEmbedder::new(2)));

        let err = svc.search_stocks("   ", SearchMode::Keyword).await.unwrap_err();
        assert!(matches!(err, SearchError::InvalidQuery(_)));
    }

    #[tokio::test]
    async fn test_member_search_mirrors_stock_flow() {
        let db = Arc::new(Database::in_memory().unwrap());
        let dana = db
            .insert_member(&NewMember {
                name: "Dana Reyes".to_string(),
                bio: Some("Energy storage investor".to_string()),
                is_active: true,
                ..Default::default()
            })
            .unwrap();
        let sam = db
            .insert_member(&NewMember {
                name: "Sam Okafor".to_string(),
                is_active: true,
                ..Default::default()
            })
            .unwrap();
        db.set_member_embedding(sam.id, &[1.0, 0.0]).unwrap();

        let embedder = Arc::new(MockEmbedder::returning(vec![1.0, 0.0]));
        let svc = service(db, embedder);

        let hits = svc.search_members("energy", SearchMode::Hybrid).await.unwrap();
        // Sam leads via the semantic block, Dana follows from keywords.
        assert_eq!(
            hits.iter().map(|h| h.entity.id).collect::<Vec<_>>(),
            vec![sam.id, dana.id]
        );
        assert_eq!(hits[0].similarity, Some(1.0));
        assert_eq!(hits[1].similarity, None);
    }
}

//! Response projections.
//!
//! Raw embedding vectors never leave the server; projections carry a
//! `has_embedding` flag instead.

use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, Utc};
use desk_search::{SearchHit, SearchMode};
use desk_types::{LinkedStock, Member, Stock, StockMetadata, ThesisAnalysis};
use serde::Serialize;

/// A stock as the API returns it.
#[derive(Debug, Clone, Serialize)]
pub struct StockView {
    pub id: i64,
    pub name: String,
    pub ticker: String,
    pub sector: Option<String>,
    pub description: Option<String>,
    pub notes: Option<String>,
    pub tags: Vec<String>,
    pub price: Option<f64>,
    pub market_cap: Option<i64>,
    pub market_cap_formatted: Option<String>,
    pub metadata: StockMetadata,
    pub thesis_analysis: Option<ThesisAnalysis>,
    pub has_embedding: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Stock> for StockView {
    fn from(stock: Stock) -> Self {
        Self {
            id: stock.id,
            name: stock.name,
            ticker: stock.ticker,
            sector: stock.sector,
            description: stock.description,
            notes: stock.notes,
            tags: stock.tags,
            price: stock.price,
            market_cap: stock.market_cap,
            market_cap_formatted: stock.market_cap.map(format_market_cap),
            metadata: stock.metadata,
            thesis_analysis: stock.thesis_analysis,
            has_embedding: stock.embedding.is_some(),
            created_at: stock.created_at,
            updated_at: stock.updated_at,
        }
    }
}

/// A member as the API returns it, with both stock link lists resolved.
#[derive(Debug, Clone, Serialize)]
pub struct MemberView {
    pub id: i64,
    pub name: String,
    pub company: Option<String>,
    pub job_title: Option<String>,
    pub bio: Option<String>,
    pub investor_type: Option<String>,
    pub tags: Vec<String>,
    pub investment_focus: Vec<String>,
    pub location: Option<String>,
    pub last_contact_date: Option<NaiveDate>,
    pub is_active: bool,
    pub notes: Option<String>,
    pub has_embedding: bool,
    pub originated_stocks: Vec<LinkedStock>,
    pub commented_stocks: Vec<LinkedStock>,
    /// Distinct stocks across both link lists.
    pub stocks_count: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MemberView {
    pub fn assemble(
        member: Member,
        originated_stocks: Vec<LinkedStock>,
        commented_stocks: Vec<LinkedStock>,
    ) -> Self {
        let stocks_count = originated_stocks
            .iter()
            .chain(commented_stocks.iter())
            .map(|link| link.id)
            .collect::<HashSet<_>>()
            .len();
        Self {
            id: member.id,
            name: member.name,
            company: member.company,
            job_title: member.job_title,
            bio: member.bio,
            investor_type: member.investor_type,
            tags: member.tags,
            investment_focus: member.investment_focus,
            location: member.location,
            last_contact_date: member.last_contact_date,
            is_active: member.is_active,
            notes: member.notes,
            has_embedding: member.embedding.is_some(),
            originated_stocks,
            commented_stocks,
            stocks_count,
            created_at: member.created_at,
            updated_at: member.updated_at,
        }
    }
}

/// One search result: the projection plus the similarity score when the
/// entry came out of the semantic pass.
#[derive(Debug, Serialize)]
pub struct SearchResult<T> {
    #[serde(flatten)]
    pub entity: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f32>,
}

/// Body of `GET .../search`.
#[derive(Debug, Serialize)]
pub struct SearchResponse<T> {
    pub mode: SearchMode,
    pub results: Vec<SearchResult<T>>,
}

impl SearchResponse<StockView> {
    pub fn stocks(mode: SearchMode, hits: Vec<SearchHit<Stock>>) -> Self {
        let results = hits
            .into_iter()
            .map(|hit| SearchResult {
                entity: StockView::from(hit.entity),
                similarity: hit.similarity,
            })
            .collect();
        Self { mode, results }
    }
}

/// Body of `PATCH /v1/stocks/bulk`.
#[derive(Debug, Serialize)]
pub struct BulkUpdateResponse {
    pub updated_count: usize,
}

/// Body of the bulk-embed endpoints.
#[derive(Debug, Serialize)]
pub struct EmbeddingRunResponse {
    pub status: &'static str,
    /// Entities the provider was actually called for.
    pub processed: usize,
}

impl EmbeddingRunResponse {
    pub fn complete(processed: usize) -> Self {
        Self {
            status: "complete",
            processed,
        }
    }
}

/// "$1.5T" / "$2.3B" / "$850.0M"; values under a million stay plain.
pub fn format_market_cap(value: i64) -> String {
    const TRILLION: f64 = 1_000_000_000_000.0;
    const BILLION: f64 = 1_000_000_000.0;
    const MILLION: f64 = 1_000_000.0;

    let value = value as f64;
    if value >= TRILLION {
        format!("${:.1}T", value / TRILLION)
    } else if value >= BILLION {
        format!("${:.1}B", value / BILLION)
    } else if value >= MILLION {
        format!("${:.1}M", value / MILLION)
    } else {
        format!("${value:.0}")
    }
}

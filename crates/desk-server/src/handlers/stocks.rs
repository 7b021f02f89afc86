//! Stock endpoints.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use tracing::info;

use desk_storage::StockFilter;
use desk_types::{BulkStockUpdate, NewStock, StockUpdate};

use crate::error::{ApiError, ApiResult};
use crate::handlers::SearchParams;
use crate::responses::{BulkUpdateResponse, EmbeddingRunResponse, SearchResponse, StockView};
use crate::state::AppState;

/// Body of `PATCH /v1/stocks/bulk`.
#[derive(Debug, Deserialize)]
pub struct BulkUpdateRequest {
    pub stock_ids: Vec<i64>,
    pub updates: BulkStockUpdate,
}

/// Body of `POST /v1/stocks/embeddings`.
#[derive(Debug, Default, Deserialize)]
pub struct EmbedStocksRequest {
    pub stock_ids: Option<Vec<i64>>,
}

/// GET /v1/stocks
pub async fn list_stocks(
    State(state): State<AppState>,
    Query(filter): Query<StockFilter>,
) -> ApiResult<Json<Vec<StockView>>> {
    let stocks = state.db.list_stocks(&filter)?;
    Ok(Json(stocks.into_iter().map(StockView::from).collect()))
}

/// POST /v1/stocks
pub async fn create_stock(
    State(state): State<AppState>,
    Json(body): Json<NewStock>,
) -> ApiResult<(StatusCode, Json<StockView>)> {
    let stock = state.db.insert_stock(&body)?;
    state.enricher.stock_created(&stock).await;
    // Re-read so the response reflects whatever the hooks wrote.
    let stock = state.db.require_stock(stock.id)?;
    Ok((StatusCode::CREATED, Json(stock.into())))
}

/// GET /v1/stocks/{id}
pub async fn get_stock(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<StockView>> {
    let stock = state.db.require_stock(id)?;
    Ok(Json(stock.into()))
}

/// PATCH /v1/stocks/{id}
///
/// Re-embeds unconditionally; re-extracts the thesis only when the
/// `investment_thesis` text actually changed.
pub async fn update_stock(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<StockUpdate>,
) -> ApiResult<Json<StockView>> {
    let before = state.db.require_stock(id)?;
    let updated = state.db.update_stock(id, &body)?;
    let thesis_changed = before.metadata.thesis() != updated.metadata.thesis();
    state.enricher.stock_updated(&updated, thesis_changed).await;
    let stock = state.db.require_stock(id)?;
    Ok(Json(stock.into()))
}

/// DELETE /v1/stocks/{id}
pub async fn delete_stock(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    if state.db.delete_stock(id)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found(format!("stock {id} not found")))
    }
}

/// PATCH /v1/stocks/bulk
pub async fn bulk_update_stocks(
    State(state): State<AppState>,
    Json(body): Json<BulkUpdateRequest>,
) -> ApiResult<Json<BulkUpdateResponse>> {
    let stocks = state.db.bulk_update_stocks(&body.stock_ids, &body.updates)?;
    for stock in &stocks {
        state.enricher.stock_updated(stock, false).await;
    }
    info!(count = stocks.len(), "bulk stock update");
    Ok(Json(BulkUpdateResponse {
        updated_count: stocks.len(),
    }))
}

/// GET /v1/stocks/search
pub async fn search_stocks(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> ApiResult<Json<SearchResponse<StockView>>> {
    let mode = params.mode()?;
    let hits = state.search.search_stocks(params.query(), mode).await?;
    Ok(Json(SearchResponse::stocks(mode, hits)))
}

/// POST /v1/stocks/embeddings
///
/// Without ids this embeds every stock still missing a vector; explicit
/// ids force a refresh.
pub async fn embed_stocks(
    State(state): State<AppState>,
    body: Option<Json<EmbedStocksRequest>>,
) -> ApiResult<Json<EmbeddingRunResponse>> {
    let ids = body.and_then(|Json(body)| body.stock_ids);
    let stats = state.backfill.run_stocks(ids.as_deref(), None).await?;
    Ok(Json(EmbeddingRunResponse::complete(
        stats.embedded + stats.failed,
    )))
}

/// POST /v1/stocks/{id}/extract-thesis
///
/// The explicit path: provider and configuration failures surface to the
/// caller instead of degrading to a warning.
pub async fn extract_thesis(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<StockView>> {
    let stock = state.db.require_stock(id)?;
    state.enricher.extract_thesis(&stock).await?;
    let stock = state.db.require_stock(id)?;
    Ok(Json(stock.into()))
}

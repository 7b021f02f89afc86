//! Member endpoints.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use desk_storage::MemberFilter;
use desk_types::{Member, MemberUpdate, NewMember, StockLink};

use crate::error::{ApiError, ApiResult};
use crate::handlers::SearchParams;
use crate::responses::{EmbeddingRunResponse, MemberView, SearchResponse, SearchResult};
use crate::state::AppState;

/// Create payload: member fields plus optional link lists.
#[derive(Debug, Deserialize)]
pub struct CreateMemberRequest {
    #[serde(flatten)]
    pub member: NewMember,
    #[serde(default)]
    pub originated_stocks: Vec<StockLink>,
    #[serde(default)]
    pub commented_stocks: Vec<StockLink>,
}

/// Update payload. A present link list replaces the stored one wholesale;
/// an absent list stays untouched.
#[derive(Debug, Deserialize)]
pub struct UpdateMemberRequest {
    #[serde(flatten)]
    pub member: MemberUpdate,
    pub originated_stocks: Option<Vec<StockLink>>,
    pub commented_stocks: Option<Vec<StockLink>>,
}

/// Body of `POST /v1/members/embeddings`.
#[derive(Debug, Default, Deserialize)]
pub struct EmbedMembersRequest {
    pub member_ids: Option<Vec<i64>>,
}

fn view(state: &AppState, member: Member) -> ApiResult<MemberView> {
    let originated = state.db.originated_stocks_of(member.id)?;
    let commented = state.db.commented_stocks_of(member.id)?;
    Ok(MemberView::assemble(member, originated, commented))
}

/// GET /v1/members
pub async fn list_members(
    State(state): State<AppState>,
    Query(filter): Query<MemberFilter>,
) -> ApiResult<Json<Vec<MemberView>>> {
    let members = state.db.list_members(&filter)?;
    let mut views = Vec::with_capacity(members.len());
    for member in members {
        views.push(view(&state, member)?);
    }
    Ok(Json(views))
}

/// POST /v1/members
pub async fn create_member(
    State(state): State<AppState>,
    Json(body): Json<CreateMemberRequest>,
) -> ApiResult<(StatusCode, Json<MemberView>)> {
    let member = state.db.insert_member(&body.member)?;
    if !body.originated_stocks.is_empty() {
        state
            .db
            .set_originated_stocks(member.id, &body.originated_stocks)?;
    }
    if !body.commented_stocks.is_empty() {
        state
            .db
            .set_commented_stocks(member.id, &body.commented_stocks)?;
    }
    state.enricher.member_saved(&member).await;
    let member = state.db.require_member(member.id)?;
    Ok((StatusCode::CREATED, Json(view(&state, member)?)))
}

/// GET /v1/members/{id}
pub async fn get_member(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<MemberView>> {
    let member = state.db.require_member(id)?;
    Ok(Json(view(&state, member)?))
}

/// PATCH /v1/members/{id}
pub async fn update_member(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateMemberRequest>,
) -> ApiResult<Json<MemberView>> {
    let member = state.db.update_member(id, &body.member)?;
    if let Some(links) = &body.originated_stocks {
        state.db.set_originated_stocks(id, links)?;
    }
    if let Some(links) = &body.commented_stocks {
        state.db.set_commented_stocks(id, links)?;
    }
    state.enricher.member_saved(&member).await;
    let member = state.db.require_member(id)?;
    Ok(Json(view(&state, member)?))
}

/// DELETE /v1/members/{id}
pub async fn delete_member(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    if state.db.delete_member(id)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found(format!("member {id} not found")))
    }
}

/// GET /v1/members/search
pub async fn search_members(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> ApiResult<Json<SearchResponse<MemberView>>> {
    let mode = params.mode()?;
    let hits = state.search.search_members(params.query(), mode).await?;
    let mut results = Vec::with_capacity(hits.len());
    for hit in hits {
        results.push(SearchResult {
            entity: view(&state, hit.entity)?,
            similarity: hit.similarity,
        });
    }
    Ok(Json(SearchResponse { mode, results }))
}

/// POST /v1/members/embeddings
pub async fn embed_members(
    State(state): State<AppState>,
    body: Option<Json<EmbedMembersRequest>>,
) -> ApiResult<Json<EmbeddingRunResponse>> {
    let ids = body.and_then(|Json(body)| body.member_ids);
    let stats = state.backfill.run_members(ids.as_deref(), None).await?;
    Ok(Json(EmbeddingRunResponse::complete(
        stats.embedded + stats.failed,
    )))
}

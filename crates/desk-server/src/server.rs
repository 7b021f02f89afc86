//! Router assembly and server lifecycle.

use axum::{
    routing::{get, patch, post},
    Router,
};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::error::ApiError;
use crate::handlers::{self, members, stocks};
use crate::state::AppState;

/// Build the full application router.
///
/// Static segments (`bulk`, `search`, `embeddings`) are registered next to
/// `{id}`; axum resolves them first.
pub fn build_router(state: AppState) -> Router {
    let v1 = Router::new()
        .route("/stocks", get(stocks::list_stocks).post(stocks::create_stock))
        .route("/stocks/bulk", patch(stocks::bulk_update_stocks))
        .route("/stocks/search", get(stocks::search_stocks))
        .route("/stocks/embeddings", post(stocks::embed_stocks))
        .route(
            "/stocks/{id}",
            get(stocks::get_stock)
                .patch(stocks::update_stock)
                .delete(stocks::delete_stock),
        )
        .route("/stocks/{id}/extract-thesis", post(stocks::extract_thesis))
        .route(
            "/members",
            get(members::list_members).post(members::create_member),
        )
        .route("/members/search", get(members::search_members))
        .route("/members/embeddings", post(members::embed_members))
        .route(
            "/members/{id}",
            get(members::get_member)
                .patch(members::update_member)
                .delete(members::delete_member),
        );

    Router::new()
        .nest("/v1", v1)
        .route("/health", get(handlers::health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind and serve until ctrl-c or SIGTERM; in-flight requests finish first.
pub async fn run(addr: &str, state: AppState) -> Result<(), ApiError> {
    let app = build_router(state);
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal(format!("failed to bind {addr}: {e}")))?;

    info!(%addr, "research desk API listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ApiError::internal(format!("server error: {e}")))?;
    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let ctrl_c = tokio::signal::ctrl_c();
        let mut sigterm = signal(SignalKind::terminate()).expect("failed to listen for SIGTERM");
        tokio::select! {
            _ = ctrl_c => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl-c");
    }
}

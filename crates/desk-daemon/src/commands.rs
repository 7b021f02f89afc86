//! Command implementations for the desk daemon.
//!
//! `serve` wires the storage, search, and enrichment layers into the HTTP
//! server; `backfill` runs the bulk re-embedding pass in-process.

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;

use desk_embeddings::{EmbeddingProvider, OpenAiConfig, OpenAiEmbedder};
use desk_enrich::{Backfill, BackfillStats, Enricher, ExtractorConfig, OpenAiExtractor};
use desk_search::SearchService;
use desk_server::AppState;
use desk_storage::Database;
use desk_types::Settings;

/// Run the HTTP API server until ctrl-c or SIGTERM.
pub async fn serve(
    config_path: Option<&str>,
    port_override: Option<u16>,
    host_override: Option<&str>,
    db_path_override: Option<&str>,
    log_level_override: Option<&str>,
) -> Result<()> {
    let mut settings = Settings::load(config_path).context("Failed to load configuration")?;

    // CLI flags take precedence over file and environment sources.
    if let Some(port) = port_override {
        settings.port = port;
    }
    if let Some(host) = host_override {
        settings.host = host.to_string();
    }
    if let Some(db_path) = db_path_override {
        settings.db_path = db_path.to_string();
    }
    if let Some(log_level) = log_level_override {
        settings.log_level = log_level.to_string();
    }
    settings.validate().context("Invalid configuration")?;

    init_tracing(&settings.log_level)?;

    info!("Research desk daemon starting");
    info!("  Database path: {}", settings.db_path);
    info!("  Listen address: {}", settings.addr());
    info!("  Embedding model: {}", settings.openai.embedding_model);
    info!("  Extraction model: {}", settings.openai.chat_model);

    let db = open_database(&settings)?;
    let embedder = build_embedder(&settings)?;
    let extractor = build_extractor(&settings)?;

    let search = Arc::new(SearchService::new(
        Arc::clone(&db),
        Arc::clone(&embedder),
        settings.search.clone(),
    ));
    let enricher = Arc::new(
        Enricher::new(Arc::clone(&db), Arc::clone(&embedder)).with_extractor(extractor),
    );
    let backfill = Arc::new(Backfill::new(
        Arc::clone(&db),
        Arc::clone(&embedder),
        Duration::from_millis(settings.backfill.delay_ms),
    ));

    let state = AppState::new(db, search, enricher, backfill);
    desk_server::run(&settings.addr(), state).await?;
    Ok(())
}

/// Run the bulk embedding backfill and print per-kind stats.
///
/// Neither `--stocks` nor `--members` means both kinds.
pub async fn backfill(
    config_path: Option<&str>,
    stocks: bool,
    members: bool,
    delay_ms: u64,
    limit: Option<usize>,
    log_level_override: Option<&str>,
) -> Result<()> {
    let mut settings = Settings::load(config_path).context("Failed to load configuration")?;
    if let Some(log_level) = log_level_override {
        settings.log_level = log_level.to_string();
    }
    settings.validate().context("Invalid configuration")?;

    init_tracing(&settings.log_level)?;

    let (run_stocks, run_members) = if stocks || members {
        (stocks, members)
    } else {
        (true, true)
    };

    let db = open_database(&settings)?;
    let embedder = build_embedder(&settings)?;
    let runner = Backfill::new(db, embedder, Duration::from_millis(delay_ms));

    if run_stocks {
        let stats = runner.run_stocks(None, limit).await?;
        print_stats("stocks", &stats);
    }
    if run_members {
        let stats = runner.run_members(None, limit).await?;
        print_stats("members", &stats);
    }
    Ok(())
}

fn init_tracing(log_level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;
    Ok(())
}

fn open_database(settings: &Settings) -> Result<Arc<Database>> {
    let db_path = settings.expanded_db_path();
    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent).context("Failed to create database directory")?;
    }
    let db = Database::open(&db_path).context("Failed to open database")?;
    Ok(Arc::new(db))
}

fn build_embedder(settings: &Settings) -> Result<Arc<dyn EmbeddingProvider>> {
    let config = OpenAiConfig::openai(resolved_api_key(settings)?)
        .with_base_url(&settings.openai.base_url)
        .with_model(&settings.openai.embedding_model)
        .with_timeout(Duration::from_secs(settings.openai.timeout_secs));
    let embedder = OpenAiEmbedder::new(config).context("Failed to build embedding client")?;
    Ok(Arc::new(embedder))
}

fn build_extractor(settings: &Settings) -> Result<Arc<OpenAiExtractor>> {
    let config = ExtractorConfig::openai(resolved_api_key(settings)?)
        .with_base_url(&settings.openai.base_url)
        .with_model(&settings.openai.chat_model)
        .with_timeout(Duration::from_secs(settings.openai.timeout_secs));
    let extractor = OpenAiExtractor::new(config).context("Failed to build extraction client")?;
    Ok(Arc::new(extractor))
}

fn resolved_api_key(settings: &Settings) -> Result<String> {
    settings
        .openai
        .resolved_api_key()
        .context("No API key configured; set OPENAI_API_KEY or DESK_OPENAI__API_KEY")
}

fn print_stats(kind: &str, stats: &BackfillStats) {
    println!(
        "{kind}: scanned {}, embedded {}, skipped {}, failed {}",
        stats.scanned, stats.embedded, stats.skipped, stats.failed
    );
}

//! MacroMind — Binary Entrypoint
//! Boots the Axum HTTP server, wiring the market data provider, the AI
//! client, the result cache, and the keyword table into shared state.

use std::sync::Arc;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use macromind::api::{router, AppState};
use macromind::cache::{FileStore, ResultCache, ANALYSIS_CACHE_TTL_MS};
use macromind::interpret::{build_client, AiConfig};
use macromind::keywords::{self, KeywordBook, KeywordsHandle};
use macromind::market::finnhub::FinnhubProvider;
use macromind::market::MarketDataProvider;
use macromind::metrics::Metrics;
use macromind::pipeline::Analyzer;

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("macromind=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let metrics = Metrics::init(ANALYSIS_CACHE_TTL_MS);

    // --- Keyword table with optional dev hot reload ---
    let book = KeywordBook::load();
    let handle = KeywordsHandle::new(book);
    keywords::start_hot_reload_thread(handle.clone(), keywords::config_path());

    // --- Collaborators ---
    let market = Arc::new(FinnhubProvider::from_env()?);
    tracing::info!(provider = market.name(), "market data provider ready");
    let ai = build_client(&AiConfig::load_or_default());
    let cache = ResultCache::new(Arc::new(FileStore::from_env()));

    let analyzer = Arc::new(Analyzer::new(market, ai, cache, handle));
    let app = router(AppState { analyzer }).merge(metrics.router());

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3000);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!(%port, "MacroMind API running");
    axum::serve(listener, app).await?;

    Ok(())
}

//! One-shot CLI: analyze a single ticker and print the explanation to stdout.
//! Uses the same pipeline as the server, with an in-memory cache.

use std::sync::Arc;

use macromind::cache::{MemoryStore, ResultCache};
use macromind::interpret::{build_client, AiConfig};
use macromind::keywords::{KeywordBook, KeywordsHandle};
use macromind::market::finnhub::FinnhubProvider;
use macromind::pipeline::Analyzer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt().with_target(false).init();

    let ticker = std::env::args().nth(1).unwrap_or_else(|| "AAPL".to_string());

    println!("\n=== MacroMind ===\n");
    println!("Analyzing: {ticker}");

    let analyzer = Analyzer::new(
        Arc::new(FinnhubProvider::from_env()?),
        build_client(&AiConfig::load_or_default()),
        ResultCache::new(Arc::new(MemoryStore::new())),
        KeywordsHandle::new(KeywordBook::load()),
    );

    let payload = analyzer.analyze(&ticker).await?;

    println!(
        "\nPRICE:\n${} ({}%)",
        payload["facts"]["price"], payload["facts"]["pct_change_1d"]
    );

    println!("\nNEWS:");
    if let Some(items) = payload["news"].as_array() {
        for n in items {
            println!("* {}", n["title"].as_str().unwrap_or_default());
        }
    }

    println!(
        "\nEXPLANATION:\n\n{}",
        payload["interpretation"].as_str().unwrap_or_default()
    );

    Ok(())
}

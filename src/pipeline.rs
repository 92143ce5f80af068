//! # Analysis Pipeline
//! Sequential orchestration of one analysis: resolve symbol → cache lookup →
//! fetch quote/news/context → classify → interpret → assemble → write-through
//! cache. Each stage fails into its own [`AnalyzeError`] category.

use metrics::{counter, histogram};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use crate::cache::ResultCache;
use crate::error::AnalyzeError;
use crate::evidence::compute_evidence;
use crate::interpret::{AiClient, InterpretationRequest};
use crate::keywords::KeywordsHandle;
use crate::market::{looks_like_symbol, MarketDataProvider};
use crate::report::AnalysisReport;
use crate::signals::compute_signals;

/// Headlines visible to the engines and echoed in the response.
pub const VISIBLE_HEADLINES: usize = 5;

pub struct Analyzer {
    market: Arc<dyn MarketDataProvider>,
    ai: Arc<dyn AiClient>,
    cache: ResultCache,
    keywords: KeywordsHandle,
}

/// Short anonymized id for free-text queries, so raw input never hits logs.
fn anon_hash(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

impl Analyzer {
    pub fn new(
        market: Arc<dyn MarketDataProvider>,
        ai: Arc<dyn AiClient>,
        cache: ResultCache,
        keywords: KeywordsHandle,
    ) -> Self {
        Self {
            market,
            ai,
            cache,
            keywords,
        }
    }

    /// Uppercase ticker-shaped input passes through; anything else goes
    /// through provider search.
    async fn resolve_symbol(&self, input: &str) -> Result<String, AnalyzeError> {
        let candidate = input.trim().to_uppercase();
        if candidate.is_empty() {
            return Err(AnalyzeError::MissingQuery);
        }
        if looks_like_symbol(&candidate) {
            return Ok(candidate);
        }

        info!(query = %anon_hash(input), "resolving free-text query");
        let resolved = self
            .market
            .search_symbol(input.trim())
            .await
            .map_err(AnalyzeError::SearchUnavailable)?;
        match resolved {
            Some(sym) => {
                info!(query = %anon_hash(input), symbol = %sym, "query resolved");
                Ok(sym.to_uppercase())
            }
            None => Err(AnalyzeError::SymbolNotFound),
        }
    }

    /// Run one full analysis. Cache hits return the stored payload verbatim.
    pub async fn analyze(&self, input: &str) -> Result<serde_json::Value, AnalyzeError> {
        let symbol = self.resolve_symbol(input).await?;
        let cache_key = ResultCache::key_for(&symbol);

        if let Some(cached) = self.cache.get(&cache_key) {
            info!(%symbol, "cache hit");
            return Ok(cached);
        }
        info!(%symbol, "cache miss, fetching");

        let t0 = Instant::now();
        let quote = self
            .market
            .quote(&symbol)
            .await
            .map_err(AnalyzeError::DataUnavailable)?;
        if quote.current == 0.0 {
            return Err(AnalyzeError::UnknownSymbol(symbol));
        }
        let news = self
            .market
            .company_news(&symbol)
            .await
            .map_err(AnalyzeError::DataUnavailable)?;
        let context = self.market.market_context().await;
        histogram!("market_fetch_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);

        let visible: Vec<_> = news.into_iter().take(VISIBLE_HEADLINES).collect();

        let signals = compute_signals(&symbol, &quote, &context, &visible);
        let keywords = self.keywords.for_symbol(&symbol);
        let evidence = compute_evidence(&quote, &context, &visible, &keywords);

        let t1 = Instant::now();
        let interpretation = self
            .ai
            .explain(&InterpretationRequest {
                symbol: &symbol,
                quote: &quote,
                context: &context,
                headlines: &visible,
                signals: &signals,
                evidence: &evidence,
            })
            .await
            .map_err(AnalyzeError::Interpretation)?;
        histogram!("interpret_ms").record(t1.elapsed().as_secs_f64() * 1_000.0);

        let report = AnalysisReport::assemble(
            &symbol,
            &quote,
            &context,
            signals,
            evidence,
            &visible,
            interpretation,
            self.ai.model_name(),
        );
        let payload =
            serde_json::to_value(&report).map_err(|e| AnalyzeError::Internal(e.into()))?;

        self.cache.set(&cache_key, payload.clone());
        counter!("analyses_total").increment(1);
        info!(%symbol, "analysis complete");

        Ok(payload)
    }
}

//! Pipeline-level tests: stage failures map to their own error categories and
//! the cache honors the TTL boundary against an injected clock.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{bail, Result};

use macromind::cache::{Clock, MemoryStore, ResultCache, ANALYSIS_CACHE_TTL_MS};
use macromind::error::AnalyzeError;
use macromind::interpret::{AiClient, InterpretationRequest, MockAiClient};
use macromind::keywords::{KeywordBook, KeywordsHandle};
use macromind::market::{Headline, MarketContext, MarketDataProvider, Quote};
use macromind::pipeline::Analyzer;

struct ManualClock(AtomicU64);

impl Clock for ManualClock {
    fn now_millis(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

struct ScriptedMarket {
    fail_search: bool,
    quote_calls: AtomicUsize,
}

impl ScriptedMarket {
    fn new() -> Self {
        Self {
            fail_search: false,
            quote_calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait::async_trait]
impl MarketDataProvider for ScriptedMarket {
    async fn quote(&self, _symbol: &str) -> Result<Quote> {
        self.quote_calls.fetch_add(1, Ordering::SeqCst);
        Ok(Quote {
            current: 42.0,
            change: 2.0,
            percent: 5.0,
            high: 43.0,
            low: 40.0,
            open: 40.0,
            prev_close: 40.0,
            timestamp: 1_700_000_000,
        })
    }

    async fn company_news(&self, _symbol: &str) -> Result<Vec<Headline>> {
        Ok(vec![])
    }

    async fn market_context(&self) -> MarketContext {
        MarketContext {
            spy_change: Some(0.5),
            qqq_change: Some(1.0),
        }
    }

    async fn search_symbol(&self, _query: &str) -> Result<Option<String>> {
        if self.fail_search {
            bail!("search endpoint down");
        }
        Ok(None)
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// AI client that always fails, to exercise the interpretation category.
struct BrokenAi;

#[async_trait::async_trait]
impl AiClient for BrokenAi {
    async fn explain(&self, _req: &InterpretationRequest<'_>) -> Result<String> {
        bail!("model endpoint down")
    }

    fn model_name(&self) -> &str {
        "broken"
    }
}

fn analyzer_with(
    market: Arc<ScriptedMarket>,
    ai: Arc<dyn AiClient>,
    cache: ResultCache,
) -> Analyzer {
    Analyzer::new(market, ai, cache, KeywordsHandle::new(KeywordBook::default_seed()))
}

#[tokio::test]
async fn search_outage_maps_to_its_own_category() {
    let mut market = ScriptedMarket::new();
    market.fail_search = true;
    let analyzer = analyzer_with(
        Arc::new(market),
        Arc::new(MockAiClient::default()),
        ResultCache::new(Arc::new(MemoryStore::new())),
    );

    let err = analyzer.analyze("some company name").await.unwrap_err();
    assert!(matches!(err, AnalyzeError::SearchUnavailable(_)), "got {err:?}");
}

#[tokio::test]
async fn interpretation_outage_maps_to_its_own_category() {
    let analyzer = analyzer_with(
        Arc::new(ScriptedMarket::new()),
        Arc::new(BrokenAi),
        ResultCache::new(Arc::new(MemoryStore::new())),
    );

    let err = analyzer.analyze("TEST").await.unwrap_err();
    assert!(matches!(err, AnalyzeError::Interpretation(_)), "got {err:?}");
}

#[tokio::test]
async fn failed_interpretation_is_not_cached() {
    let market = Arc::new(ScriptedMarket::new());
    let cache = ResultCache::new(Arc::new(MemoryStore::new()));
    let analyzer = analyzer_with(market.clone(), Arc::new(BrokenAi), cache);

    let _ = analyzer.analyze("TEST").await.unwrap_err();
    let _ = analyzer.analyze("TEST").await.unwrap_err();
    assert_eq!(
        market.quote_calls.load(Ordering::SeqCst),
        2,
        "a failed analysis must not be served from cache"
    );
}

#[tokio::test]
async fn cache_expires_exactly_at_ttl_and_triggers_refetch() {
    let clock = Arc::new(ManualClock(AtomicU64::new(1_000)));
    let cache = ResultCache::with_clock(
        Arc::new(MemoryStore::new()),
        ANALYSIS_CACHE_TTL_MS,
        clock.clone(),
    );
    let market = Arc::new(ScriptedMarket::new());
    let analyzer = analyzer_with(market.clone(), Arc::new(MockAiClient::default()), cache);

    let first = analyzer.analyze("TEST").await.unwrap();
    assert_eq!(market.quote_calls.load(Ordering::SeqCst), 1);

    // 1 ms before expiry: still a hit, payload verbatim.
    clock.0.store(1_000 + ANALYSIS_CACHE_TTL_MS - 1, Ordering::SeqCst);
    let hit = analyzer.analyze("TEST").await.unwrap();
    assert_eq!(market.quote_calls.load(Ordering::SeqCst), 1);
    assert_eq!(first, hit);

    // 1 ms past expiry: recompute.
    clock.0.store(1_000 + ANALYSIS_CACHE_TTL_MS + 1, Ordering::SeqCst);
    let _ = analyzer.analyze("TEST").await.unwrap();
    assert_eq!(
        market.quote_calls.load(Ordering::SeqCst),
        2,
        "expired entry must force a fresh fetch"
    );
}

//! # Market Data
//! Input shapes consumed by the engines plus the provider boundary used by
//! the pipeline. Concrete providers live in submodules; tests use fixtures.

pub mod finnhub;

use anyhow::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Immutable snapshot of a subject's daily quote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub current: f64,
    pub change: f64,
    pub percent: f64,
    pub high: f64,
    pub low: f64,
    pub open: f64,
    pub prev_close: f64,
    /// Unix epoch seconds.
    pub timestamp: i64,
}

/// Percent change of the two broad-market index proxies. Either field is
/// `None` when the upstream lookup failed; the engines treat that as 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketContext {
    pub spy_change: Option<f64>,
    pub qqq_change: Option<f64>,
}

/// One company headline, provider order preserved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Headline {
    pub title: String,
    pub source: String,
    pub datetime: String,
    pub url: String,
}

/// Provider boundary for quotes, news, index context, and symbol search.
#[async_trait::async_trait]
pub trait MarketDataProvider: Send + Sync {
    async fn quote(&self, symbol: &str) -> Result<Quote>;

    /// Recent company headlines, newest first, capped by the provider.
    async fn company_news(&self, symbol: &str) -> Result<Vec<Headline>>;

    /// Broad-market baseline. Degrades to `{None, None}` instead of failing.
    async fn market_context(&self) -> MarketContext;

    /// Resolve a free-text query to a symbol, if the provider knows one.
    async fn search_symbol(&self, query: &str) -> Result<Option<String>>;

    fn name(&self) -> &'static str;
}

static TICKER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z]{1,5}(\.[A-Z]{1,2})?$").expect("ticker regex"));

/// True if the (already uppercased) input looks like a ticker symbol rather
/// than a company name.
pub fn looks_like_symbol(input: &str) -> bool {
    TICKER_RE.is_match(input)
}

/// Normalize a provider headline title: decode HTML entities, strip tags,
/// fold typographic quotes, collapse whitespace.
pub fn normalize_title(s: &str) -> String {
    let mut out = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)</?[^>]+>").expect("tag regex"));
    out = RE_TAGS.replace_all(&out, "").to_string();

    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

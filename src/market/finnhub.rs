//! Finnhub-backed market data provider.
//!
//! Maps Finnhub's terse quote fields (`c/d/dp/h/l/o/pc/t`) onto [`Quote`],
//! pulls company news for the last two days, and resolves free-text queries
//! through the `/search` endpoint with a similarity re-rank.

use anyhow::{anyhow, Context, Result};
use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use serde::Deserialize;
use std::time::Duration;
use tracing::warn;

use super::{normalize_title, Headline, MarketContext, MarketDataProvider, Quote};

const API_BASE: &str = "https://finnhub.io/api/v1";
const NEWS_FETCH_CAP: usize = 7;

pub struct FinnhubProvider {
    http: reqwest::Client,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct RawQuote {
    c: Option<f64>,
    d: Option<f64>,
    dp: Option<f64>,
    h: Option<f64>,
    l: Option<f64>,
    o: Option<f64>,
    pc: Option<f64>,
    t: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct RawNewsItem {
    headline: Option<String>,
    source: Option<String>,
    datetime: Option<i64>,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    result: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    symbol: Option<String>,
    description: Option<String>,
}

impl FinnhubProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .user_agent("macromind/0.1")
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(10))
            .build()
            .expect("reqwest client");
        Self {
            http,
            api_key: api_key.into(),
        }
    }

    /// Requires `FINNHUB_API_KEY` in the environment (or `.env`).
    pub fn from_env() -> Result<Self> {
        let key = std::env::var("FINNHUB_API_KEY")
            .map_err(|_| anyhow!("Missing FINNHUB_API_KEY in environment"))?;
        Ok(Self::new(key))
    }

    async fn fetch_raw_quote(&self, symbol: &str) -> Result<RawQuote> {
        let url = format!("{API_BASE}/quote");
        let raw: RawQuote = self
            .http
            .get(&url)
            .query(&[("symbol", symbol), ("token", self.api_key.as_str())])
            .send()
            .await
            .context("finnhub quote request")?
            .error_for_status()
            .context("finnhub quote status")?
            .json()
            .await
            .context("finnhub quote body")?;
        Ok(raw)
    }
}

fn quote_from_raw(raw: RawQuote) -> Quote {
    Quote {
        current: raw.c.unwrap_or(0.0),
        change: raw.d.unwrap_or(0.0),
        percent: raw.dp.unwrap_or(0.0),
        high: raw.h.unwrap_or(0.0),
        low: raw.l.unwrap_or(0.0),
        open: raw.o.unwrap_or(0.0),
        prev_close: raw.pc.unwrap_or(0.0),
        timestamp: raw.t.unwrap_or(0),
    }
}

fn format_news_datetime(epoch_secs: i64) -> String {
    match Utc.timestamp_opt(epoch_secs, 0).single() {
        Some(dt) => dt.format("%Y-%m-%d %H:%M UTC").to_string(),
        None => String::new(),
    }
}

/// Pick the best search hit for a query: exact symbol match first, then the
/// candidate whose description is closest to the query, provider order as
/// tie-break.
pub(crate) fn best_symbol_match(query: &str, hits: &[(String, String)]) -> Option<String> {
    if hits.is_empty() {
        return None;
    }
    let q = query.trim().to_lowercase();

    if let Some((sym, _)) = hits.iter().find(|(sym, _)| sym.to_lowercase() == q) {
        return Some(sym.clone());
    }

    let mut best: Option<(&str, f64)> = None;
    for (sym, desc) in hits {
        let sim = strsim::normalized_levenshtein(&q, &desc.to_lowercase());
        let better = match best {
            None => true,
            Some((_, s)) => sim > s,
        };
        if better {
            best = Some((sym.as_str(), sim));
        }
    }
    best.map(|(sym, _)| sym.to_string())
}

#[async_trait::async_trait]
impl MarketDataProvider for FinnhubProvider {
    async fn quote(&self, symbol: &str) -> Result<Quote> {
        let raw = self.fetch_raw_quote(symbol).await?;
        Ok(quote_from_raw(raw))
    }

    async fn company_news(&self, symbol: &str) -> Result<Vec<Headline>> {
        let to = Utc::now().date_naive();
        let from = to - ChronoDuration::days(2);

        let url = format!("{API_BASE}/company-news");
        let items: Vec<RawNewsItem> = self
            .http
            .get(&url)
            .query(&[
                ("symbol", symbol),
                ("from", &from.format("%Y-%m-%d").to_string()),
                ("to", &to.format("%Y-%m-%d").to_string()),
                ("token", self.api_key.as_str()),
            ])
            .send()
            .await
            .context("finnhub news request")?
            .error_for_status()
            .context("finnhub news status")?
            .json()
            .await
            .context("finnhub news body")?;

        let mut out = Vec::with_capacity(NEWS_FETCH_CAP);
        for it in items.into_iter().take(NEWS_FETCH_CAP) {
            let title = normalize_title(it.headline.as_deref().unwrap_or_default());
            if title.is_empty() {
                continue;
            }
            out.push(Headline {
                title,
                source: it.source.unwrap_or_default(),
                datetime: it.datetime.map(format_news_datetime).unwrap_or_default(),
                url: it.url.unwrap_or_default(),
            });
        }
        Ok(out)
    }

    async fn market_context(&self) -> MarketContext {
        // Either leg failing degrades the whole context to unknown; callers
        // treat unknown as 0 rather than erroring out.
        let spy = self.fetch_raw_quote("SPY").await;
        let qqq = self.fetch_raw_quote("QQQ").await;
        match (spy, qqq) {
            (Ok(s), Ok(q)) => MarketContext {
                spy_change: s.dp,
                qqq_change: q.dp,
            },
            (s, q) => {
                if let Err(e) = &s {
                    warn!(error = %e, "SPY context fetch failed");
                }
                if let Err(e) = &q {
                    warn!(error = %e, "QQQ context fetch failed");
                }
                MarketContext::default()
            }
        }
    }

    async fn search_symbol(&self, query: &str) -> Result<Option<String>> {
        let url = format!("{API_BASE}/search");
        let resp: SearchResponse = self
            .http
            .get(&url)
            .query(&[("q", query), ("token", self.api_key.as_str())])
            .send()
            .await
            .context("finnhub search request")?
            .error_for_status()
            .context("finnhub search status")?
            .json()
            .await
            .context("finnhub search body")?;

        let hits: Vec<(String, String)> = resp
            .result
            .into_iter()
            .filter_map(|h| h.symbol.map(|s| (s, h.description.unwrap_or_default())))
            .collect();
        Ok(best_symbol_match(query, &hits))
    }

    fn name(&self) -> &'static str {
        "finnhub"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_quote_with_nulls_maps_to_zeroes() {
        let raw: RawQuote = serde_json::from_str(r#"{"c": null, "dp": null}"#).unwrap();
        let q = quote_from_raw(raw);
        assert_eq!(q.current, 0.0);
        assert_eq!(q.percent, 0.0);
        assert_eq!(q.timestamp, 0);
    }

    #[test]
    fn raw_quote_maps_field_by_field() {
        let raw: RawQuote = serde_json::from_str(
            r#"{"c": 187.5, "d": -2.1, "dp": -1.11, "h": 190.0, "l": 186.0, "o": 189.0, "pc": 189.6, "t": 1700000000}"#,
        )
        .unwrap();
        let q = quote_from_raw(raw);
        assert_eq!(q.current, 187.5);
        assert_eq!(q.percent, -1.11);
        assert_eq!(q.prev_close, 189.6);
        assert_eq!(q.timestamp, 1_700_000_000);
    }

    #[test]
    fn best_match_prefers_exact_symbol() {
        let hits = vec![
            ("AAPL.SW".to_string(), "APPLE INC".to_string()),
            ("AAPL".to_string(), "APPLE INC".to_string()),
        ];
        assert_eq!(best_symbol_match("aapl", &hits), Some("AAPL".to_string()));
    }

    #[test]
    fn best_match_falls_back_to_description_similarity() {
        let hits = vec![
            ("APLE".to_string(), "APPLE HOSPITALITY REIT INC".to_string()),
            ("AAPL".to_string(), "APPLE INC".to_string()),
        ];
        assert_eq!(
            best_symbol_match("apple inc", &hits),
            Some("AAPL".to_string())
        );
    }

    #[test]
    fn best_match_keeps_provider_order_on_ties() {
        let hits = vec![
            ("ONE".to_string(), "same words".to_string()),
            ("TWO".to_string(), "same words".to_string()),
        ];
        assert_eq!(
            best_symbol_match("same words", &hits),
            Some("ONE".to_string())
        );
    }

    #[test]
    fn no_hits_means_no_symbol() {
        assert_eq!(best_symbol_match("ghost co", &[]), None);
    }

    #[test]
    fn news_datetime_formatting() {
        assert_eq!(format_news_datetime(1_700_000_000), "2023-11-14 22:13 UTC");
        assert_eq!(format_news_datetime(i64::MIN), "");
    }
}

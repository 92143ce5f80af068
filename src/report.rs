//! Final response payload: raw facts, both categorical bundles, the visible
//! headlines, and the narrative, in the exact wire shape clients and the
//! cache see.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::evidence::EvidenceAssessment;
use crate::market::{Headline, MarketContext, Quote};
use crate::signals::ReasoningSignals;

pub const TIMEFRAME: &str = "1d";
pub const SERVICE_VERSION: &str = "MacroMind API v1";
pub const ARCHITECTURE: &str = "hybrid-intelligence";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub request: RequestInfo,
    pub facts: Facts,
    pub signals: ReasoningSignals,
    pub evidence: EvidenceAssessment,
    pub news: Vec<NewsItem>,
    pub interpretation: String,
    pub meta: ReportMeta,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestInfo {
    pub ticker: String,
    pub timeframe: String,
    pub generated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Facts {
    pub price: f64,
    pub pct_change_1d: f64,
    pub abs_change: f64,
    pub high: f64,
    pub low: f64,
    pub open: f64,
    pub prev_close: f64,
    pub market: MarketFacts,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketFacts {
    pub spy_pct: Option<f64>,
    pub qqq_pct: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsItem {
    pub id: String,
    pub title: String,
    pub source: String,
    pub published_at: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMeta {
    pub model: String,
    pub version: String,
    pub architecture: String,
}

impl AnalysisReport {
    #[allow(clippy::too_many_arguments)]
    pub fn assemble(
        ticker: &str,
        quote: &Quote,
        context: &MarketContext,
        signals: ReasoningSignals,
        evidence: EvidenceAssessment,
        news: &[Headline],
        interpretation: String,
        model: &str,
    ) -> Self {
        let news = news
            .iter()
            .enumerate()
            .map(|(i, n)| NewsItem {
                id: format!("news:{}", i + 1),
                title: n.title.clone(),
                source: n.source.clone(),
                published_at: n.datetime.clone(),
                url: n.url.clone(),
            })
            .collect();

        Self {
            request: RequestInfo {
                ticker: ticker.to_string(),
                timeframe: TIMEFRAME.to_string(),
                generated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            },
            facts: Facts {
                price: quote.current,
                pct_change_1d: quote.percent,
                abs_change: quote.change,
                high: quote.high,
                low: quote.low,
                open: quote.open,
                prev_close: quote.prev_close,
                market: MarketFacts {
                    spy_pct: context.spy_change,
                    qqq_pct: context.qqq_change,
                },
            },
            signals,
            evidence,
            news,
            interpretation,
            meta: ReportMeta {
                model: model.to_string(),
                version: SERVICE_VERSION.to_string(),
                architecture: ARCHITECTURE.to_string(),
            },
        }
    }
}

//! AI interpretation adapter: provider abstraction, config, prompt builder.
//!
//! The narrative layer receives the raw facts plus both categorical bundles
//! and returns a short plain-English explanation. Providers: OpenAI chat
//! completions, a deterministic mock for tests (`AI_TEST_MODE=mock`), and a
//! disabled client that fails interpretation cleanly.

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::evidence::EvidenceAssessment;
use crate::market::{Headline, MarketContext, Quote};
use crate::signals::ReasoningSignals;

pub const DEFAULT_AI_CONFIG_PATH: &str = "config/ai.json";

/// Everything the prompt builder needs for one interpretation call.
pub struct InterpretationRequest<'a> {
    pub symbol: &'a str,
    pub quote: &'a Quote,
    pub context: &'a MarketContext,
    pub headlines: &'a [Headline],
    pub signals: &'a ReasoningSignals,
    pub evidence: &'a EvidenceAssessment,
}

#[async_trait::async_trait]
pub trait AiClient: Send + Sync {
    /// Produce the narrative interpretation for one analysis.
    async fn explain(&self, req: &InterpretationRequest<'_>) -> Result<String>;

    /// Model identifier echoed into the response `meta`.
    fn model_name(&self) -> &str;
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

/// Config loaded from `config/ai.json`. `api_key = "ENV"` defers to
/// `OPENAI_API_KEY` at build time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    pub enabled: bool,
    /// "openai" (case-insensitive)
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    pub api_key: String,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: "openai".to_string(),
            model: default_model(),
            api_key: "ENV".to_string(),
        }
    }
}

impl AiConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let mut cfg: AiConfig = serde_json::from_str(&data)?;
        cfg.provider = cfg.provider.to_lowercase();
        Ok(cfg)
    }

    /// Load from the default path; a missing or unparseable file means
    /// "disabled" rather than an error.
    pub fn load_or_default() -> Self {
        Self::load_from_file(DEFAULT_AI_CONFIG_PATH).unwrap_or_default()
    }

    fn resolve_api_key(&self) -> Result<String> {
        if self.api_key.trim().eq_ignore_ascii_case("env") {
            std::env::var("OPENAI_API_KEY")
                .map_err(|_| anyhow!("Missing OPENAI_API_KEY env var"))
        } else {
            Ok(self.api_key.clone())
        }
    }
}

/// Factory: mock override first, then disabled, then the real provider.
pub fn build_client(cfg: &AiConfig) -> Arc<dyn AiClient> {
    if std::env::var("AI_TEST_MODE")
        .map(|v| v == "mock")
        .unwrap_or(false)
    {
        return Arc::new(MockAiClient::default());
    }

    if !cfg.enabled {
        return Arc::new(DisabledAiClient);
    }

    match cfg.provider.as_str() {
        "openai" => match cfg.resolve_api_key() {
            Ok(key) => Arc::new(OpenAiClient::new(key, &cfg.model)),
            Err(e) => {
                tracing::warn!(error = %e, "AI config enabled but no key; disabling");
                Arc::new(DisabledAiClient)
            }
        },
        other => {
            tracing::warn!(provider = other, "unsupported AI provider; disabling");
            Arc::new(DisabledAiClient)
        }
    }
}

/// Build the analyst prompt from facts, headlines, and both bundles.
pub fn build_prompt(req: &InterpretationRequest<'_>) -> String {
    let q = req.quote;

    let news_block = if req.headlines.is_empty() {
        "No recent relevant headlines found.".to_string()
    } else {
        req.headlines
            .iter()
            .map(|n| format!("- {} ({})", n.title, n.source))
            .collect::<Vec<_>>()
            .join("\n")
    };

    let fmt_pct = |v: Option<f64>| match v {
        Some(x) => format!("{x}%"),
        None => "n/a".to_string(),
    };

    format!(
        "You are a calm, rational market analyst.\n\
         \n\
         Explain why this stock moved.\n\
         \n\
         TICKER: {symbol}\n\
         \n\
         PRICE DATA:\n\
         Current price: {current}\n\
         Change: {change}\n\
         Percent change: {percent}%\n\
         High: {high}\n\
         Low: {low}\n\
         Open: {open}\n\
         Previous close: {prev_close}\n\
         \n\
         MARKET CONTEXT:\n\
         SPY change: {spy}\n\
         QQQ change: {qqq}\n\
         \n\
         SYSTEM SIGNALS:\n\
         Move size: {move_size}, vs market: {vs_market}, pre-classified driver: {driver}\n\
         Evidence: significance {significance}, headline score {score}, strength {strength}, bias {bias}\n\
         \n\
         RECENT NEWS:\n\
         {news_block}\n\
         \n\
         TASK:\n\
         1. Explain in plain English what likely moved the stock (max 120 words)\n\
         2. Give exactly 3 bullet point drivers\n\
         3. Say if this is short-term noise or structural\n\
         4. Add uncertainty note if evidence weak\n\
         \n\
         RULES:\n\
         - No hype\n\
         - No financial advice\n\
         - If unclear, say uncertain\n",
        symbol = req.symbol,
        current = q.current,
        change = q.change,
        percent = q.percent,
        high = q.high,
        low = q.low,
        open = q.open,
        prev_close = q.prev_close,
        spy = fmt_pct(req.context.spy_change),
        qqq = fmt_pct(req.context.qqq_change),
        move_size = req.signals.move_size.as_str(),
        vs_market = req.signals.move_vs_market.as_str(),
        driver = req.signals.system_driver.as_str(),
        significance = req.evidence.move_significance.as_str(),
        score = req.evidence.headline_score,
        strength = req.evidence.evidence_strength.as_str(),
        bias = req.evidence.system_bias.as_str(),
    )
}

// ------------------------------------------------------------
// Providers
// ------------------------------------------------------------

pub struct OpenAiClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl OpenAiClient {
    pub fn new(api_key: impl Into<String>, model: &str) -> Self {
        let http = reqwest::Client::builder()
            .user_agent("macromind/0.1")
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(30))
            .build()
            .expect("reqwest client");
        Self {
            http,
            api_key: api_key.into(),
            model: model.to_string(),
        }
    }
}

#[async_trait::async_trait]
impl AiClient for OpenAiClient {
    async fn explain(&self, req: &InterpretationRequest<'_>) -> Result<String> {
        #[derive(Serialize)]
        struct Msg<'a> {
            role: &'a str,
            content: &'a str,
        }
        #[derive(Serialize)]
        struct ChatReq<'a> {
            model: &'a str,
            messages: Vec<Msg<'a>>,
            temperature: f32,
        }
        #[derive(Deserialize)]
        struct ChatResp {
            choices: Vec<Choice>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: ChoiceMsg,
        }
        #[derive(Deserialize)]
        struct ChoiceMsg {
            content: String,
        }

        let prompt = build_prompt(req);
        let body = ChatReq {
            model: &self.model,
            messages: vec![Msg {
                role: "user",
                content: &prompt,
            }],
            temperature: 0.2,
        };

        let resp = self
            .http
            .post("https://api.openai.com/v1/chat/completions")
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("openai request")?;

        if !resp.status().is_success() {
            bail!("openai returned status {}", resp.status());
        }

        let parsed: ChatResp = resp.json().await.context("openai body")?;
        let content = parsed
            .choices
            .first()
            .map(|c| c.message.content.trim().to_string())
            .unwrap_or_default();
        if content.is_empty() {
            bail!("openai returned an empty interpretation");
        }
        Ok(content)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Deterministic client for tests and local runs without a key.
pub struct MockAiClient {
    fixed: String,
}

impl Default for MockAiClient {
    fn default() -> Self {
        Self {
            fixed: "Mock interpretation: move consistent with pre-classified driver.".to_string(),
        }
    }
}

impl MockAiClient {
    pub fn with_text(text: impl Into<String>) -> Self {
        Self { fixed: text.into() }
    }
}

#[async_trait::async_trait]
impl AiClient for MockAiClient {
    async fn explain(&self, _req: &InterpretationRequest<'_>) -> Result<String> {
        Ok(self.fixed.clone())
    }

    fn model_name(&self) -> &str {
        "mock"
    }
}

/// Fails interpretation cleanly when no provider is configured.
pub struct DisabledAiClient;

#[async_trait::async_trait]
impl AiClient for DisabledAiClient {
    async fn explain(&self, _req: &InterpretationRequest<'_>) -> Result<String> {
        bail!("AI interpretation is disabled")
    }

    fn model_name(&self) -> &str {
        "disabled"
    }
}

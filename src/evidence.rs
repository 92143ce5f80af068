//! # Evidence Engine
//! Pure, testable logic that maps `(quote, market context, headlines)` →
//! `EvidenceAssessment`: headline relevance scoring plus a coarse confidence
//! tier for the causal explanation. No I/O.
//!
//! Headline rules are independent; every applicable rule fires per headline
//! and the contributions sum. Strength and bias are derived strictly from the
//! other fields of the same bundle.

use serde::{Deserialize, Serialize};

use crate::keywords::KeywordSet;
use crate::market::{Headline, MarketContext, Quote};
use crate::signals::sign;

/// Significance tier of the move, on absolute percent change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveSignificance {
    Noise,
    Small,
    Meaningful,
    Large,
}

/// Alignment of the move with the QQQ baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketAlignment {
    Neutral,
    WithMarket,
    AgainstMarket,
}

/// How well headlines plus move magnitude support a causal story.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceStrength {
    Weak,
    Moderate,
    Strong,
}

/// Coarse attribution bias derived from alignment and strength.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemBias {
    Macro,
    Company,
    Unclear,
    Mixed,
}

impl MoveSignificance {
    pub fn as_str(&self) -> &'static str {
        match self {
            MoveSignificance::Noise => "noise",
            MoveSignificance::Small => "small",
            MoveSignificance::Meaningful => "meaningful",
            MoveSignificance::Large => "large",
        }
    }
}

impl MarketAlignment {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarketAlignment::Neutral => "neutral",
            MarketAlignment::WithMarket => "with_market",
            MarketAlignment::AgainstMarket => "against_market",
        }
    }
}

impl EvidenceStrength {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvidenceStrength::Weak => "weak",
            EvidenceStrength::Moderate => "moderate",
            EvidenceStrength::Strong => "strong",
        }
    }
}

impl SystemBias {
    pub fn as_str(&self) -> &'static str {
        match self {
            SystemBias::Macro => "macro",
            SystemBias::Company => "company",
            SystemBias::Unclear => "unclear",
            SystemBias::Mixed => "mixed",
        }
    }
}

/// Categorical evidence bundle. Field names match the wire payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceAssessment {
    pub move_significance: MoveSignificance,
    pub market_alignment: MarketAlignment,
    pub headline_score: i32,
    pub evidence_strength: EvidenceStrength,
    pub system_bias: SystemBias,
}

// Event-driven terms that carry weight on their own.
const EVENT_TERMS: [&str; 5] = ["earnings", "guidance", "upgrade", "downgrade", "product"];
// Shock terms that only matter when the move itself is already meaningful.
const SHOCK_TERMS: [&str; 2] = ["regulation", "lawsuit"];
// Generic listicle / macro-wrap markers that dilute relevance.
const LISTICLE_TERMS: [&str; 2] = ["top", "stocks to buy"];
const WRAP_TERMS: [&str; 2] = ["ai boom", "market wrap"];

fn contains_any(title: &str, terms: &[&str]) -> bool {
    terms.iter().any(|t| title.contains(t))
}

/// Score a single headline title (already lowercased). Rules are independent
/// and sum; `abs_move` gates only the shock-term rule.
fn score_title(title: &str, abs_move: f64, keywords: &KeywordSet) -> i32 {
    let mut score = 0;

    if abs_move > 2.0 && contains_any(title, &SHOCK_TERMS) {
        score += 3;
    }
    if contains_any(title, &EVENT_TERMS) {
        score += 3;
    }
    if keywords.matches(title) {
        score += 2;
    }
    if contains_any(title, &LISTICLE_TERMS) {
        score -= 2;
    }
    if contains_any(title, &WRAP_TERMS) {
        score -= 1;
    }

    score
}

/// Compute the full evidence bundle. Total function: an absent `qqq_change`
/// is treated as 0.0.
pub fn compute_evidence(
    quote: &Quote,
    context: &MarketContext,
    headlines: &[Headline],
    keywords: &KeywordSet,
) -> EvidenceAssessment {
    let abs_move = quote.percent.abs();
    let qqq = context.qqq_change.unwrap_or(0.0);

    let move_significance = if abs_move > 4.0 {
        MoveSignificance::Large
    } else if abs_move > 2.0 {
        MoveSignificance::Meaningful
    } else if abs_move > 1.0 {
        MoveSignificance::Small
    } else {
        MoveSignificance::Noise
    };

    // Sub-1% moves are neutral regardless of sign agreement.
    let market_alignment = if abs_move < 1.0 {
        MarketAlignment::Neutral
    } else if sign(quote.percent) == sign(qqq) {
        MarketAlignment::WithMarket
    } else {
        MarketAlignment::AgainstMarket
    };

    let headline_score: i32 = headlines
        .iter()
        .map(|h| score_title(&h.title.to_lowercase(), abs_move, keywords))
        .sum();

    let meaningful_or_large = matches!(
        move_significance,
        MoveSignificance::Meaningful | MoveSignificance::Large
    );
    let evidence_strength = if meaningful_or_large && headline_score >= 3 {
        EvidenceStrength::Strong
    } else if move_significance == MoveSignificance::Meaningful && headline_score >= 1 {
        EvidenceStrength::Moderate
    } else {
        EvidenceStrength::Weak
    };

    // Bias chain: first match wins.
    let system_bias = if market_alignment == MarketAlignment::WithMarket
        && evidence_strength == EvidenceStrength::Weak
    {
        SystemBias::Macro
    } else if market_alignment == MarketAlignment::AgainstMarket
        && evidence_strength == EvidenceStrength::Strong
    {
        SystemBias::Company
    } else if evidence_strength == EvidenceStrength::Weak {
        SystemBias::Unclear
    } else {
        SystemBias::Mixed
    };

    EvidenceAssessment {
        move_significance,
        market_alignment,
        headline_score,
        evidence_strength,
        system_bias,
    }
}

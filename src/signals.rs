//! # Reasoning Engine
//! Pure, testable logic that maps `(symbol, quote, market context, headlines)`
//! → `ReasoningSignals`. No I/O, suitable for unit tests and offline replay.
//!
//! Policy: move size and market relation are classified on fixed percent
//! thresholds; the driver pre-classification is a strict priority chain where
//! the first matching rule wins.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::market::{Headline, MarketContext, Quote};

/// Coarse magnitude of the day's move, on absolute percent change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveSize {
    Small,
    Medium,
    Large,
}

/// Relation of the subject's move to the broad market (QQQ proxy).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveVsMarket {
    Inline,
    WithMarket,
    AgainstMarket,
}

/// Strength of the news flow, on visible headline count alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NewsStrength {
    Weak,
    Moderate,
    Strong,
}

/// Pre-classified probable driver of the move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemDriver {
    Macro,
    Company,
    Noise,
    Unclear,
}

impl MoveSize {
    pub fn as_str(&self) -> &'static str {
        match self {
            MoveSize::Small => "small",
            MoveSize::Medium => "medium",
            MoveSize::Large => "large",
        }
    }
}

impl MoveVsMarket {
    pub fn as_str(&self) -> &'static str {
        match self {
            MoveVsMarket::Inline => "inline",
            MoveVsMarket::WithMarket => "with_market",
            MoveVsMarket::AgainstMarket => "against_market",
        }
    }
}

impl NewsStrength {
    pub fn as_str(&self) -> &'static str {
        match self {
            NewsStrength::Weak => "weak",
            NewsStrength::Moderate => "moderate",
            NewsStrength::Strong => "strong",
        }
    }
}

impl SystemDriver {
    pub fn as_str(&self) -> &'static str {
        match self {
            SystemDriver::Macro => "macro",
            SystemDriver::Company => "company",
            SystemDriver::Noise => "noise",
            SystemDriver::Unclear => "unclear",
        }
    }
}

/// Categorical signal bundle describing the move. Serialized field names match
/// the wire payload consumed by the prompt builder and echoed to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReasoningSignals {
    #[serde(rename = "move")]
    pub move_pct: f64,
    pub abs_move: f64,
    pub move_size: MoveSize,
    pub spy: f64,
    pub qqq: f64,
    #[serde(rename = "relativeVsQQQ")]
    pub relative_vs_qqq: f64,
    pub move_vs_market: MoveVsMarket,
    pub news_count: usize,
    pub news_strength: NewsStrength,
    pub system_driver: SystemDriver,
}

/// Integer sign with 0 as its own sign (equal to no other sign).
pub(crate) fn sign(x: f64) -> i8 {
    if x > 0.0 {
        1
    } else if x < 0.0 {
        -1
    } else {
        0
    }
}

/// Compute the full signal bundle. Total function: absent context fields are
/// treated as 0.0 before any comparison.
pub fn compute_signals(
    symbol: &str,
    quote: &Quote,
    context: &MarketContext,
    headlines: &[Headline],
) -> ReasoningSignals {
    let move_pct = quote.percent;
    let spy = context.spy_change.unwrap_or(0.0);
    let qqq = context.qqq_change.unwrap_or(0.0);

    let abs_move = move_pct.abs();

    // relative strength vs Nasdaq (unadjusted difference, not beta-adjusted)
    let relative_vs_qqq = move_pct - qqq;

    let move_vs_market = if abs_move > 0.5 {
        if sign(move_pct) == sign(qqq) {
            MoveVsMarket::WithMarket
        } else {
            MoveVsMarket::AgainstMarket
        }
    } else {
        MoveVsMarket::Inline
    };

    let move_size = if abs_move > 3.0 {
        MoveSize::Large
    } else if abs_move > 1.5 {
        MoveSize::Medium
    } else {
        MoveSize::Small
    };

    let news_count = headlines.len();
    let news_strength = if news_count >= 6 {
        NewsStrength::Strong
    } else if news_count >= 3 {
        NewsStrength::Moderate
    } else {
        NewsStrength::Weak
    };

    // Driver pre-classification: first match wins.
    let system_driver = if move_vs_market == MoveVsMarket::WithMarket {
        SystemDriver::Macro
    } else if move_vs_market == MoveVsMarket::AgainstMarket && news_strength != NewsStrength::Weak {
        SystemDriver::Company
    } else if abs_move < 1.0 {
        SystemDriver::Noise
    } else {
        SystemDriver::Unclear
    };

    debug!(
        target: "signals",
        %symbol,
        move_pct,
        driver = system_driver.as_str(),
        vs_market = move_vs_market.as_str(),
        "signals computed"
    );

    ReasoningSignals {
        move_pct,
        abs_move,
        move_size,
        spy,
        qqq,
        relative_vs_qqq,
        move_vs_market,
        news_count,
        news_strength,
        system_driver,
    }
}

//! # error
//!
//! Centralised pipeline error type. Each stage of the analysis pipeline fails
//! into its own category, and the `IntoResponse` impl maps every category to
//! a distinct status with a structured JSON body, so clients can tell a data
//! outage from a resolution failure from an interpretation failure.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalyzeError {
    /// No ticker (or company name) supplied at all.
    #[error("Missing ticker")]
    MissingQuery,

    /// Free-text name could not be resolved to any symbol.
    #[error("Symbol not found")]
    SymbolNotFound,

    /// The resolution search itself failed (provider outage).
    #[error("Search failed")]
    SearchUnavailable(#[source] anyhow::Error),

    /// The symbol resolved but has no market data.
    #[error("Ticker not found: {0}")]
    UnknownSymbol(String),

    /// Quote or news fetch failed (rate limit, network, provider error).
    #[error("Market data unavailable")]
    DataUnavailable(#[source] anyhow::Error),

    /// The narrative layer failed or is disabled.
    #[error("AI analysis failed")]
    Interpretation(#[source] anyhow::Error),

    /// Catch-all for unexpected failures.
    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl AnalyzeError {
    fn status(&self) -> StatusCode {
        match self {
            AnalyzeError::MissingQuery => StatusCode::BAD_REQUEST,
            AnalyzeError::SymbolNotFound | AnalyzeError::UnknownSymbol(_) => StatusCode::NOT_FOUND,
            AnalyzeError::SearchUnavailable(_)
            | AnalyzeError::DataUnavailable(_)
            | AnalyzeError::Interpretation(_) => StatusCode::SERVICE_UNAVAILABLE,
            AnalyzeError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> String {
        match self {
            AnalyzeError::MissingQuery => {
                "Use /analyze?ticker=AAPL or company name".to_string()
            }
            AnalyzeError::SymbolNotFound => "Could not resolve company name".to_string(),
            AnalyzeError::SearchUnavailable(_) => "Ticker resolution unavailable".to_string(),
            AnalyzeError::UnknownSymbol(sym) => format!("No market data for {sym}"),
            AnalyzeError::DataUnavailable(_) => "Provider rate limit or API failure".to_string(),
            AnalyzeError::Interpretation(_) => {
                "Interpretation provider unavailable or rate-limited".to_string()
            }
            AnalyzeError::Internal(_) => "Unexpected failure".to_string(),
        }
    }
}

impl IntoResponse for AnalyzeError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "analysis failed");
        }
        let body = Json(json!({
            "error": self.to_string(),
            "message": self.message(),
        }));
        (status, body).into_response()
    }
}

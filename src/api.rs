//! HTTP surface: banner, analyze endpoint, permissive CORS.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use metrics::counter;
use tower_http::cors::CorsLayer;

use crate::error::AnalyzeError;
use crate::pipeline::Analyzer;

#[derive(Clone)]
pub struct AppState {
    pub analyzer: Arc<Analyzer>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "MacroMind API running" }))
        .route("/analyze", get(analyze))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

async fn analyze(
    State(state): State<AppState>,
    Query(q): Query<HashMap<String, String>>,
) -> Result<Json<serde_json::Value>, AnalyzeError> {
    counter!("analyze_requests_total").increment(1);

    let input = q
        .get("ticker")
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .ok_or(AnalyzeError::MissingQuery)?;

    let payload = state.analyzer.analyze(input).await?;
    Ok(Json(payload))
}

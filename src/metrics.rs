use axum::{routing::get, Router};
use metrics::{describe_counter, describe_histogram, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder, describe this service's series, and
    /// expose a static gauge with the cache TTL (absolute, no sliding
    /// refresh).
    pub fn init(ttl_ms: u64) -> Self {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .expect("prometheus: install recorder");

        describe_counter!("analyze_requests_total", "Analyze requests received");
        describe_counter!("analyses_total", "Analyses computed end to end");
        describe_counter!("analysis_cache_hit_total", "Result cache hits");
        describe_counter!("analysis_cache_miss_total", "Result cache misses");
        describe_counter!(
            "analysis_cache_corrupt_total",
            "Reads recovered from an unreadable cache store"
        );
        describe_histogram!("market_fetch_ms", "Quote/news/context fetch latency");
        describe_histogram!("interpret_ms", "AI interpretation latency");

        gauge!("analysis_cache_ttl_ms").set(ttl_ms as f64);

        Self { handle }
    }

    /// Router exposing `/metrics` in the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}

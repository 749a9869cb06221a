use crate::error::{LimiterError, Result};
use axum::{
    body::Body,
    extract::State,
    http::{Response, StatusCode},
    response::IntoResponse,
};
use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::Arc;
use tracing::{debug, info};

/// Metrics service for collecting and exposing Prometheus metrics
#[derive(Clone)]
pub struct MetricsService {
    handle: Arc<PrometheusHandle>,
}

impl MetricsService {
    /// Install the Prometheus recorder. Only one recorder may exist per process.
    pub fn new() -> Result<Self> {
        let handle = PrometheusBuilder::new().install_recorder().map_err(|e| {
            LimiterError::Internal(format!("Failed to install metrics recorder: {}", e))
        })?;

        Self::register_metrics();

        info!("Metrics service initialized successfully");

        Ok(Self {
            handle: Arc::new(handle),
        })
    }

    fn register_metrics() {
        describe_counter!(
            "limiter_checks_total",
            "Total number of rate limit checks, by outcome"
        );
        describe_histogram!(
            "limiter_check_duration_seconds",
            "Latency of the counter store round trip in seconds"
        );
        describe_counter!(
            "limiter_store_errors_total",
            "Total number of checks that failed at the counter store"
        );

        debug!("All metrics registered with descriptions");
    }

    /// Render metrics in Prometheus format
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

/// Metrics endpoint handler
pub async fn metrics_handler(State(service): State<MetricsService>) -> impl IntoResponse {
    Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", "text/plain; version=0.0.4")
        .body(Body::from(service.render()))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

/// Record a completed check
pub fn record_check(exceeded: bool, duration: f64) {
    let outcome = if exceeded { "exceeded" } else { "admitted" };

    counter!("limiter_checks_total", "outcome" => outcome).increment(1);
    histogram!("limiter_check_duration_seconds").record(duration);
}

/// Record a check that failed at the store
pub fn record_store_error() {
    counter!("limiter_store_errors_total").increment(1);
}

//! HTTP surface of the admission service

use crate::error::LimiterError;
use crate::metrics::{metrics_handler, MetricsService};
use crate::rate_limit::{add_rate_limit_headers, Info, RateLimitState};
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};

/// Admission decision for one identity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CheckResponse {
    pub identity: String,
    pub hits: i64,
    pub limit: i64,
    pub remaining: i64,
    pub exceeded: bool,
    /// Milliseconds until the window resets, negative once it has lapsed
    pub resets_in_ms: i64,
}

impl CheckResponse {
    pub fn from_info(identity: String, info: &Info) -> Self {
        Self {
            identity,
            hits: info.hits(),
            limit: info.limit(),
            remaining: info.remaining(),
            exceeded: info.is_exceeded(),
            resets_in_ms: info.resets_in().num_milliseconds(),
        }
    }
}

/// Build the service router
pub fn build_router(state: RateLimitState, metrics: Option<MetricsService>) -> Router {
    let mut router = Router::new()
        .route("/v1/check/:identity", post(check_handler))
        .route("/health", get(health_handler))
        .with_state(state);

    if let Some(metrics) = metrics {
        router = router.merge(
            Router::new()
                .route("/metrics", get(metrics_handler))
                .with_state(metrics),
        );
    }

    router.layer(TraceLayer::new_for_http())
}

/// Count a hit for `identity` and report the decision
pub async fn check_handler(
    State(state): State<RateLimitState>,
    Path(identity): Path<String>,
) -> Result<Response, LimiterError> {
    let info = state.check(identity.as_str()).await?;

    let status = if info.is_exceeded() {
        StatusCode::TOO_MANY_REQUESTS
    } else {
        StatusCode::OK
    };

    let mut headers = HeaderMap::new();
    add_rate_limit_headers(&mut headers, &info);

    debug!(identity = %identity, hits = info.hits(), status = status.as_u16(), "Check served");

    Ok((status, headers, Json(CheckResponse::from_info(identity, &info))).into_response())
}

/// Report whether the counter store is reachable
pub async fn health_handler(State(state): State<RateLimitState>) -> Response {
    let ping = tokio::time::timeout(state.timeout, state.limiter.ping()).await;

    match ping {
        Ok(Ok(())) => (StatusCode::OK, Json(serde_json::json!({ "status": "ok" }))).into_response(),
        Ok(Err(e)) => {
            warn!(error = %e, "Health check failed");
            unhealthy(e.to_string())
        }
        Err(_) => {
            warn!("Health check timed out");
            unhealthy("store ping timed out".to_string())
        }
    }
}

fn unhealthy(reason: String) -> Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(serde_json::json!({ "status": "unavailable", "error": reason })),
    )
        .into_response()
}

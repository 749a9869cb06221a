use super::identity::Identity;
use super::limiter::RateLimiter;
use super::types::Info;
use crate::error::{LimiterError, Result};
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header::RETRY_AFTER, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use std::net::SocketAddr;
use std::time::Duration;
use tracing::warn;

pub const LIMIT_HEADER: &str = "x-ratelimit-limit";
pub const REMAINING_HEADER: &str = "x-ratelimit-remaining";
pub const RESET_HEADER: &str = "x-ratelimit-reset";

/// State shared by the rate limiting middleware
#[derive(Clone)]
pub struct RateLimitState {
    pub limiter: RateLimiter,
    /// Deadline for one check; the limiter itself never times out
    pub timeout: Duration,
}

impl RateLimitState {
    pub fn new(limiter: RateLimiter, timeout: Duration) -> Self {
        Self { limiter, timeout }
    }

    /// Run a check under this state's deadline
    pub async fn check<I: Identity + ?Sized>(&self, identity: &I) -> Result<Info> {
        check_with_timeout(&self.limiter, identity, self.timeout).await
    }
}

/// Run a check, giving up after `timeout`.
///
/// A hit the store applied before the deadline stays counted.
pub async fn check_with_timeout<I: Identity + ?Sized>(
    limiter: &RateLimiter,
    identity: &I,
    timeout: Duration,
) -> Result<Info> {
    match tokio::time::timeout(timeout, limiter.check(identity)).await {
        Ok(result) => result,
        Err(_) => {
            crate::metrics::record_store_error();
            Err(LimiterError::Timeout(format!(
                "Rate limit check exceeded {}ms",
                timeout.as_millis()
            )))
        }
    }
}

/// Axum middleware admitting requests by peer IP
///
/// Admitted responses carry the `X-RateLimit-*` headers. Exceeded requests
/// get a 429; store failures reject the request.
pub async fn rate_limit_middleware(
    State(state): State<RateLimitState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    let info = match state.check(&addr).await {
        Ok(info) => info,
        Err(e) => {
            warn!(client = %addr.ip(), error = %e, "Rate limit check failed, rejecting request");
            return e.into_response();
        }
    };

    if info.is_exceeded() {
        return rate_limit_exceeded_response(&info);
    }

    let mut response = next.run(request).await;
    add_rate_limit_headers(response.headers_mut(), &info);
    response
}

/// Write the `X-RateLimit-*` headers for a snapshot
pub fn add_rate_limit_headers(headers: &mut HeaderMap, info: &Info) {
    headers.insert(LIMIT_HEADER, HeaderValue::from(info.limit()));
    headers.insert(REMAINING_HEADER, HeaderValue::from(info.remaining()));
    headers.insert(RESET_HEADER, HeaderValue::from(info.retry_after_secs()));
}

/// Create a 429 Too Many Requests response with rate limit headers
pub fn rate_limit_exceeded_response(info: &Info) -> Response {
    let retry_after = info.retry_after_secs();

    let mut headers = HeaderMap::new();
    add_rate_limit_headers(&mut headers, info);
    headers.insert(RETRY_AFTER, HeaderValue::from(retry_after));

    let body = Json(serde_json::json!({
        "error": "Rate limit exceeded",
        "status": 429,
        "limit": info.limit(),
        "remaining": info.remaining(),
        "retry_after": retry_after,
    }));

    (StatusCode::TOO_MANY_REQUESTS, headers, body).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate_limit::store::{CounterStore, Hit};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::Arc;

    /// Store that never answers
    struct StalledStore;

    #[async_trait]
    impl CounterStore for StalledStore {
        async fn hit(&self, _key: &str, _window: Duration) -> Result<Hit> {
            std::future::pending().await
        }

        async fn ping(&self) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_rate_limit_response() {
        let info = Info::new(4, 3, Utc::now() + chrono::Duration::seconds(30));
        let response = rate_limit_exceeded_response(&info);

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

        let headers = response.headers();
        assert_eq!(headers.get(LIMIT_HEADER).unwrap(), "3");
        assert_eq!(headers.get(REMAINING_HEADER).unwrap(), "0");
        let retry: u64 = headers
            .get(RETRY_AFTER)
            .unwrap()
            .to_str()
            .unwrap()
            .parse()
            .unwrap();
        assert!((29..=30).contains(&retry));
    }

    #[test]
    fn test_add_rate_limit_headers() {
        let info = Info::new(1, 10, Utc::now() + chrono::Duration::seconds(5));
        let mut headers = HeaderMap::new();
        add_rate_limit_headers(&mut headers, &info);

        assert_eq!(headers.get(LIMIT_HEADER).unwrap(), "10");
        assert_eq!(headers.get(REMAINING_HEADER).unwrap(), "9");
        assert!(headers.contains_key(RESET_HEADER));
    }

    #[tokio::test]
    async fn test_check_times_out() {
        let limiter = RateLimiter::new(Arc::new(StalledStore), 5, Duration::from_secs(60));
        let state = RateLimitState::new(limiter, Duration::from_millis(20));

        let result = state.check("10.0.0.1").await;
        assert!(matches!(result, Err(LimiterError::Timeout(_))));
    }
}

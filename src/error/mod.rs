use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Result type for limiter operations
pub type Result<T> = std::result::Result<T, LimiterError>;

/// Limiter error types
///
/// Exceeding a rate limit is not an error: it is reported through
/// [`Info::is_exceeded`](crate::rate_limit::Info::is_exceeded).
#[derive(Error, Debug)]
pub enum LimiterError {
    /// The counter store could not complete the batch
    #[error("Counter store error: {0}")]
    Store(#[from] redis::RedisError),

    /// The counter store returned something the protocol does not expect
    #[error("Unexpected store reply: {0}")]
    Reply(String),

    #[error("Timeout error: {0}")]
    Timeout(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl LimiterError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            LimiterError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
            LimiterError::Reply(_) => StatusCode::BAD_GATEWAY,
            LimiterError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            LimiterError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            LimiterError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            LimiterError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for LimiterError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}

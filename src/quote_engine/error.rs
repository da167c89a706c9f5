// Error types for the Quote Engine
// Only invalid input and unresolvable products reach callers as errors;
// everything else is absorbed by the dispatcher's fallback chain

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Main error type for the Quote Engine
#[derive(Debug, Error)]
pub enum QuoteEngineError {
    /// Malformed request input
    /// Fails fast, never cached, never retried
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Unknown or deleted excursion
    /// Propagated to the caller as a user-facing condition
    #[error("Excursion not found: {0}")]
    ExcursionNotFound(i32),

    /// Authoritative pricing or capacity source unreachable or timed out
    /// Recovered locally by cached data or approximation wherever possible
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Even the heuristic estimator could not resolve a base price
    /// Surfaced only as the minimal fallback envelope
    #[error("Approximation unavailable: {0}")]
    ApproximationUnavailable(String),

    /// Durable cache store failure
    /// Reads degrade to a miss, writes to a no-op; never fails a quote
    #[error("Cache store unavailable: {0}")]
    CacheUnavailable(String),

    /// Database operation errors
    /// Automatically converted from sqlx::Error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// JSON serialization/deserialization of cached values
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for Quote Engine operations
pub type QEResult<T> = Result<T, QuoteEngineError>;

impl QuoteEngineError {
    /// Whether the fallback chain may absorb this error in place of a caller-
    /// visible failure. Invalid input and unknown products always surface.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            QuoteEngineError::InvalidRequest(_) | QuoteEngineError::ExcursionNotFound(_)
        )
    }
}

impl From<redis::RedisError> for QuoteEngineError {
    fn from(err: redis::RedisError) -> Self {
        QuoteEngineError::CacheUnavailable(err.to_string())
    }
}

impl IntoResponse for QuoteEngineError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            QuoteEngineError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "Invalid request"),
            QuoteEngineError::ExcursionNotFound(_) => {
                (StatusCode::NOT_FOUND, "Excursion not found")
            }
            QuoteEngineError::UpstreamUnavailable(ref e) => {
                tracing::warn!("Upstream unavailable: {}", e);
                (StatusCode::SERVICE_UNAVAILABLE, "Service unavailable")
            }
            QuoteEngineError::ApproximationUnavailable(ref e) => {
                tracing::warn!("Approximation unavailable: {}", e);
                (StatusCode::SERVICE_UNAVAILABLE, "Service unavailable")
            }
            QuoteEngineError::CacheUnavailable(ref e) => {
                tracing::error!("Cache store error: {}", e);
                (StatusCode::SERVICE_UNAVAILABLE, "Service unavailable")
            }
            QuoteEngineError::Database(ref e) => {
                tracing::error!("Database error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error")
            }
            QuoteEngineError::Serialization(ref e) => {
                tracing::error!("Serialization error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
            }
        };

        let body = Json(json!({
            "error": error_message,
            "details": self.to_string(),
        }));

        (status, body).into_response()
    }
}

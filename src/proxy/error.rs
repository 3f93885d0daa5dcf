//! Per-request forwarding errors.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Errors raised while exchanging a request with the upstream.
#[derive(Debug, Error)]
pub enum ForwardError {
    /// Connection to the upstream failed.
    #[error("upstream {url} unavailable: {reason}")]
    UpstreamUnavailable { url: String, reason: String },

    /// The upstream did not answer in time.
    #[error("upstream {url} timed out after {secs}s")]
    UpstreamTimeout { url: String, secs: u64 },

    /// The upstream answered with something that is not valid HTTP.
    #[error("upstream {url} sent a malformed response: {reason}")]
    UpstreamProtocol { url: String, reason: String },

    /// No connection slot to the upstream host became free in time.
    #[error("connection pool for {host} exhausted")]
    PoolExhausted { host: String },

    /// The inbound request cannot be forwarded.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl ForwardError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ForwardError::UpstreamUnavailable { .. }
            | ForwardError::UpstreamProtocol { .. }
            | ForwardError::PoolExhausted { .. } => StatusCode::BAD_GATEWAY,
            ForwardError::UpstreamTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            ForwardError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Short label used in metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ForwardError::UpstreamUnavailable { .. } => "unavailable",
            ForwardError::UpstreamTimeout { .. } => "timeout",
            ForwardError::UpstreamProtocol { .. } => "protocol",
            ForwardError::PoolExhausted { .. } => "pool_exhausted",
            ForwardError::InvalidRequest(_) => "invalid_request",
        }
    }

    fn client_message(&self) -> &'static str {
        match self {
            ForwardError::UpstreamUnavailable { .. } => "Upstream unavailable",
            ForwardError::UpstreamTimeout { .. } => "Upstream timed out",
            ForwardError::UpstreamProtocol { .. } => "Upstream sent an invalid response",
            ForwardError::PoolExhausted { .. } => "Upstream busy",
            ForwardError::InvalidRequest(_) => "Invalid request",
        }
    }
}

impl IntoResponse for ForwardError {
    fn into_response(self) -> Response {
        (self.status_code(), self.client_message()).into_response()
    }
}

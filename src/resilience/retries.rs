//! Retry logic.
//!
//! # Responsibilities
//! - Determine if a failed attempt is retryable
//! - Decide how many attempts a request gets
//!
//! # Design Decisions
//! - Never retry POST/PATCH or other non-idempotent methods
//! - Only `UpstreamUnavailable` is retryable: the request never reached the
//!   upstream, so replaying it cannot duplicate side effects
//! - Timeouts are not retried; the upstream may still be processing

use axum::http::Method;

use crate::config::RetryConfig;
use crate::proxy::ForwardError;

/// Whether a failed attempt may be replayed.
pub fn is_retryable(method: &Method, error: &ForwardError) -> bool {
    method.is_idempotent() && matches!(error, ForwardError::UpstreamUnavailable { .. })
}

/// Number of attempts a request with this method may use.
pub fn max_attempts(config: &RetryConfig, method: &Method) -> u32 {
    if config.enabled && method.is_idempotent() {
        config.max_attempts.max(1)
    } else {
        1
    }
}

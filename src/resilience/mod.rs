//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request to upstream:
//!     → transport enforces connect / response deadlines
//!     → On failure: retries.rs (check if retryable, retry with backoff)
//!     → backoff.rs (jittered exponential delay between attempts)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every upstream call has a deadline
//! - Retries are off unless a deployment enables them
//! - Retries only for idempotent requests (GET, HEAD, etc.)
//! - Only connection failures are retried; an HTTP status is always relayed

pub mod backoff;
pub mod retries;

//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! http / proxy / theming
//!     → logging.rs (structured log events, request ID on every span)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → Prometheus scrape endpoint, when enabled
//! ```

pub mod logging;
pub mod metrics;

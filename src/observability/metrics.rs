//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): requests by method, status, proxy
//! - `proxy_request_duration_seconds` (histogram): end-to-end latency by proxy
//! - `proxy_upstream_errors_total` (counter): failed exchanges by proxy, kind
//! - `proxy_rewrites_total` (counter): rewrite outcomes by proxy, outcome
//!
//! Recording is a no-op until [`init_metrics`] installs the Prometheus
//! recorder.

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// How a response went through the theming stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewriteOutcomeKind {
    Themed,
    Skipped,
    Fallback,
}

impl RewriteOutcomeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RewriteOutcomeKind::Themed => "themed",
            RewriteOutcomeKind::Skipped => "skipped",
            RewriteOutcomeKind::Fallback => "fallback",
        }
    }
}

/// Install the Prometheus recorder and serve scrapes on `addr`.
///
/// Must be called from within the Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;

    describe_counter!("proxy_requests_total", "Requests answered by the proxy");
    describe_histogram!(
        "proxy_request_duration_seconds",
        "Time from receiving a request to sending the response head"
    );
    describe_counter!("proxy_upstream_errors_total", "Failed upstream exchanges");
    describe_counter!("proxy_rewrites_total", "Theming outcomes for relayed responses");

    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_request(proxy: &str, method: &str, status: u16, elapsed: Duration) {
    counter!(
        "proxy_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "proxy" => proxy.to_string()
    )
    .increment(1);
    histogram!("proxy_request_duration_seconds", "proxy" => proxy.to_string())
        .record(elapsed.as_secs_f64());
}

pub fn record_upstream_error(proxy: &str, kind: &'static str) {
    counter!("proxy_upstream_errors_total", "proxy" => proxy.to_string(), "kind" => kind).increment(1);
}

pub fn record_rewrite(proxy: &str, outcome: RewriteOutcomeKind) {
    counter!(
        "proxy_rewrites_total",
        "proxy" => proxy.to_string(),
        "outcome" => outcome.as_str()
    )
    .increment(1);
}

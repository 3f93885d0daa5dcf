//! Pooled upstream transport.
//!
//! # Responsibilities
//! - Send one outbound request over a shared, connection-pooled client
//! - Bound the number of in-flight requests per upstream host
//! - Hand the response body back as a stream, never buffered here
//!
//! # Design Decisions
//! - Redirects are never followed and nothing is retried at this level
//! - Content-Encoding is left alone: the client has no decompression enabled
//! - The per-host slot is held by the response body stream; dropping the
//!   client response (e.g. the client went away) releases slot and connection
//! - Waiting for a slot is bounded by `acquire_timeout_secs`

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{HeaderMap, Method, StatusCode};
use bytes::Bytes;
use dashmap::DashMap;
use futures_util::StreamExt;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use url::Url;

use crate::config::{TimeoutConfig, TransportConfig};
use crate::proxy::error::ForwardError;

/// Body of an outbound request.
pub enum OutboundBody {
    /// Fully buffered; can be replayed.
    Full(Bytes),
    /// Streamed from the client as it arrives.
    Stream(Body),
}

impl OutboundBody {
    /// A copy suitable for another attempt, if the body is buffered.
    pub fn try_clone(&self) -> Option<Self> {
        match self {
            OutboundBody::Full(bytes) => Some(OutboundBody::Full(bytes.clone())),
            OutboundBody::Stream(_) => None,
        }
    }
}

impl std::fmt::Debug for OutboundBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutboundBody::Full(bytes) => f.debug_tuple("Full").field(bytes).finish(),
            OutboundBody::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// A request ready to be sent upstream.
#[derive(Debug)]
pub struct OutboundRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: OutboundBody,
}

/// Status, headers and streaming body received from the upstream.
pub struct UpstreamResponse {
    /// URL the request was sent to.
    pub url: String,
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Body,
}

/// Capability to exchange one request with an upstream.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: OutboundRequest) -> Result<UpstreamResponse, ForwardError>;
}

/// Per-host bound on concurrently in-flight requests.
struct ConnectionLimiter {
    slots: DashMap<String, Arc<Semaphore>>,
    per_host: usize,
    acquire_timeout: Duration,
}

impl ConnectionLimiter {
    fn new(per_host: usize, acquire_timeout: Duration) -> Self {
        Self {
            slots: DashMap::new(),
            per_host,
            acquire_timeout,
        }
    }

    async fn acquire(&self, host: &str) -> Result<OwnedSemaphorePermit, ForwardError> {
        let semaphore = self
            .slots
            .entry(host.to_string())
            .or_insert_with(|| Arc::new(Semaphore::new(self.per_host)))
            .clone();

        match tokio::time::timeout(self.acquire_timeout, semaphore.acquire_owned()).await {
            Ok(Ok(permit)) => Ok(permit),
            _ => Err(ForwardError::PoolExhausted {
                host: host.to_string(),
            }),
        }
    }

    fn available(&self, host: &str) -> Option<usize> {
        self.slots.get(host).map(|s| s.available_permits())
    }
}

/// [`Transport`] backed by a shared `reqwest` connection pool.
pub struct PooledTransport {
    client: reqwest::Client,
    limiter: ConnectionLimiter,
    request_timeout: Duration,
}

impl PooledTransport {
    pub fn new(timeouts: &TimeoutConfig, transport: &TransportConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .pool_max_idle_per_host(transport.max_idle_per_host)
            .pool_idle_timeout(Duration::from_secs(timeouts.idle_secs))
            .connect_timeout(Duration::from_secs(timeouts.connect_secs))
            .no_proxy()
            .build()?;

        Ok(Self {
            client,
            limiter: ConnectionLimiter::new(
                transport.max_connections_per_host,
                Duration::from_secs(transport.acquire_timeout_secs),
            ),
            request_timeout: Duration::from_secs(timeouts.request_secs),
        })
    }

    /// Free slots for `host:port`, `None` before the first request to it.
    pub fn available_slots(&self, host: &str) -> Option<usize> {
        self.limiter.available(host)
    }

    fn classify(&self, url: &str, error: reqwest::Error) -> ForwardError {
        let reason = error_chain(&error);
        if error.is_connect() {
            ForwardError::UpstreamUnavailable {
                url: url.to_string(),
                reason,
            }
        } else if error.is_timeout() {
            ForwardError::UpstreamTimeout {
                url: url.to_string(),
                secs: self.request_timeout.as_secs(),
            }
        } else {
            ForwardError::UpstreamProtocol {
                url: url.to_string(),
                reason,
            }
        }
    }
}

#[async_trait]
impl Transport for PooledTransport {
    async fn send(&self, request: OutboundRequest) -> Result<UpstreamResponse, ForwardError> {
        let url = Url::parse(&request.url)
            .map_err(|e| ForwardError::InvalidRequest(format!("{}: {}", request.url, e)))?;
        let host = match (url.host_str(), url.port_or_known_default()) {
            (Some(host), Some(port)) => format!("{}:{}", host, port),
            _ => return Err(ForwardError::InvalidRequest(format!("{} has no host", request.url))),
        };

        let permit = self.limiter.acquire(&host).await?;

        let builder = self
            .client
            .request(request.method, url)
            .headers(request.headers);
        let builder = match request.body {
            OutboundBody::Full(bytes) => builder.body(bytes),
            OutboundBody::Stream(body) => {
                builder.body(reqwest::Body::wrap_stream(body.into_data_stream()))
            }
        };

        let response = match tokio::time::timeout(self.request_timeout, builder.send()).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return Err(self.classify(&request.url, e)),
            Err(_) => {
                return Err(ForwardError::UpstreamTimeout {
                    url: request.url,
                    secs: self.request_timeout.as_secs(),
                })
            }
        };

        let status = response.status();
        let headers = response.headers().clone();
        let stream = response.bytes_stream().map(move |chunk| {
            let _slot = &permit;
            chunk
        });

        Ok(UpstreamResponse {
            url: request.url,
            status,
            headers,
            body: Body::from_stream(stream),
        })
    }
}

/// Flatten an error and its sources for operator logs.
fn error_chain(error: &dyn std::error::Error) -> String {
    let mut out = error.to_string();
    let mut source = error.source();
    while let Some(e) = source {
        out.push_str(": ");
        out.push_str(&e.to_string());
        source = e.source();
    }
    out
}

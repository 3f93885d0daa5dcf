//! Request forwarding.
//!
//! # Responsibilities
//! - Turn an inbound request into an outbound one (URL, headers, body)
//! - Issue it over the shared transport
//! - Replay it when a deployment enabled retries and the failure allows it
//!
//! # Design Decisions
//! - The inbound body is streamed unless it must be kept for a replay
//! - An empty inbound body is sent as empty bytes, not as a stream
//! - A streamed body of known length keeps its `Content-Length`; only bodies
//!   of unknown length go upstream chunked
//! - Redirect responses come back like any other response

use std::sync::Arc;

use axum::body::{Body, HttpBody};
use axum::http::{header, request::Parts, HeaderValue, Request};
use bytes::Bytes;

use crate::config::{ProxyConfig, RetryConfig};
use crate::proxy::encoding::reencode_wire_path;
use crate::proxy::error::ForwardError;
use crate::proxy::headers::{outbound_headers, RemoteUser};
use crate::proxy::transport::{OutboundBody, OutboundRequest, Transport, UpstreamResponse};
use crate::resilience::backoff::backoff_for;
use crate::resilience::retries::{is_retryable, max_attempts};

/// Forwards inbound requests to a proxy's upstream.
#[derive(Clone)]
pub struct RequestForwarder {
    transport: Arc<dyn Transport>,
    retries: RetryConfig,
}

impl RequestForwarder {
    pub fn new(transport: Arc<dyn Transport>, retries: RetryConfig) -> Self {
        Self { transport, retries }
    }

    /// Forward `request` to the upstream of `config`.
    pub async fn forward(
        &self,
        request: Request<Body>,
        config: &ProxyConfig,
    ) -> Result<UpstreamResponse, ForwardError> {
        let (parts, body) = request.into_parts();
        let attempts = max_attempts(&self.retries, &parts.method);

        let url = outbound_url(config, &parts);
        let mut headers = outbound_headers(
            &parts.headers,
            config.add_remote_user(),
            parts.extensions.get::<RemoteUser>(),
        );
        let mut body = self.outbound_body(&parts, body, attempts > 1).await?;
        if let OutboundBody::Stream(stream) = &body {
            if let Some(len) = stream.size_hint().exact() {
                headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
            }
        }

        tracing::debug!(
            proxy = %config.name(),
            method = %parts.method,
            url = %url,
            "Forwarding request"
        );

        let mut attempt = 1;
        loop {
            let replay = if attempt < attempts { body.try_clone() } else { None };
            let outbound = OutboundRequest {
                method: parts.method.clone(),
                url: url.clone(),
                headers: headers.clone(),
                body,
            };

            match self.transport.send(outbound).await {
                Ok(response) => return Ok(response),
                Err(e) => match replay {
                    Some(next) if is_retryable(&parts.method, &e) => {
                        let delay = backoff_for(&self.retries, attempt);
                        tracing::info!(
                            proxy = %config.name(),
                            attempt,
                            delay = ?delay,
                            error = %e,
                            "Retrying upstream request"
                        );
                        tokio::time::sleep(delay).await;
                        body = next;
                        attempt += 1;
                    }
                    _ => return Err(e),
                },
            }
        }
    }

    async fn outbound_body(
        &self,
        parts: &Parts,
        body: Body,
        replayable: bool,
    ) -> Result<OutboundBody, ForwardError> {
        if body.size_hint().exact() == Some(0) {
            return Ok(OutboundBody::Full(Bytes::new()));
        }
        if !replayable {
            return Ok(OutboundBody::Stream(body));
        }

        let limit = self.retries.max_buffered_body;
        let declared = parts
            .headers
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<usize>().ok());
        match declared {
            Some(len) if len <= limit => {
                let bytes = axum::body::to_bytes(body, limit)
                    .await
                    .map_err(|e| ForwardError::InvalidRequest(format!("reading request body: {}", e)))?;
                Ok(OutboundBody::Full(bytes))
            }
            _ => Ok(OutboundBody::Stream(body)),
        }
    }
}

/// Outbound URL: upstream base + re-encoded path + verbatim query.
pub fn outbound_url(config: &ProxyConfig, parts: &Parts) -> String {
    let path = routed_path(config, parts.uri.path());
    config
        .upstream()
        .resolve(&reencode_wire_path(path), parts.uri.query())
}

/// The part of the inbound path that is sent upstream.
fn routed_path<'a>(config: &ProxyConfig, path: &'a str) -> &'a str {
    if config.strip_prefix() {
        let prefix = config.path_prefix().trim_end_matches('/');
        if let Some(rest) = path.strip_prefix(prefix) {
            return rest;
        }
    }
    path
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use axum::http::{HeaderMap, Method, StatusCode};

    use super::*;
    use crate::config::ProxyDefinition;

    #[derive(Debug)]
    struct Recorded {
        method: Method,
        url: String,
        headers: HeaderMap,
        body: Option<Bytes>,
    }

    /// Records every call; fails the first `failures` calls as unreachable.
    #[derive(Default)]
    struct RecordingTransport {
        calls: Mutex<Vec<Recorded>>,
        failures: AtomicU32,
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        async fn send(&self, request: OutboundRequest) -> Result<UpstreamResponse, ForwardError> {
            let body = match request.body {
                OutboundBody::Full(bytes) => Some(bytes),
                OutboundBody::Stream(_) => None,
            };
            self.calls.lock().unwrap().push(Recorded {
                method: request.method,
                url: request.url.clone(),
                headers: request.headers,
                body,
            });

            let remaining = self.failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures.store(remaining - 1, Ordering::SeqCst);
                return Err(ForwardError::UpstreamUnavailable {
                    url: request.url,
                    reason: "connection refused".into(),
                });
            }

            Ok(UpstreamResponse {
                url: request.url,
                status: StatusCode::OK,
                headers: HeaderMap::new(),
                body: Body::empty(),
            })
        }
    }

    fn proxy(upstream: &str) -> ProxyConfig {
        ProxyConfig::new(&ProxyDefinition {
            upstream: Some(upstream.to_string()),
            ..Default::default()
        })
        .unwrap()
    }

    fn forwarder(transport: Arc<RecordingTransport>, retries: RetryConfig) -> RequestForwarder {
        RequestForwarder::new(transport, retries)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn only_cookie() -> HeaderMap {
        let mut expected = HeaderMap::new();
        expected.insert(header::COOKIE, "".parse().unwrap());
        expected
    }

    #[tokio::test]
    async fn tilde_is_not_escaped() {
        let transport = Arc::new(RecordingTransport::default());
        forwarder(transport.clone(), RetryConfig::default())
            .forward(get("/~"), &proxy("http://example.com"))
            .await
            .unwrap();

        let calls = transport.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].method, Method::GET);
        assert_eq!(calls[0].url, "http://example.com/~");
        assert_eq!(calls[0].headers, only_cookie());
        assert_eq!(calls[0].body, Some(Bytes::new()));
    }

    #[tokio::test]
    async fn space_is_escaped() {
        let transport = Arc::new(RecordingTransport::default());
        forwarder(transport.clone(), RetryConfig::default())
            .forward(get("/%20test%20test"), &proxy("http://example.com"))
            .await
            .unwrap();

        let calls = transport.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].url, "http://example.com/+test+test");
        assert_eq!(calls[0].headers, only_cookie());
    }

    #[tokio::test]
    async fn query_and_body_are_forwarded() {
        let transport = Arc::new(RecordingTransport::default());
        let request = Request::builder()
            .method(Method::POST)
            .uri("/form?next=%2Fhome")
            .header("content-type", "application/x-www-form-urlencoded")
            .header("cookie", "session=abc")
            .body(Body::from("a=1"))
            .unwrap();

        forwarder(transport.clone(), RetryConfig::default())
            .forward(request, &proxy("http://example.com/"))
            .await
            .unwrap();

        let calls = transport.calls.lock().unwrap();
        assert_eq!(calls[0].method, Method::POST);
        assert_eq!(calls[0].url, "http://example.com/form?next=%2Fhome");
        assert_eq!(calls[0].headers.get("cookie").unwrap(), "session=abc");
        assert_eq!(
            calls[0].headers.get("content-type").unwrap(),
            "application/x-www-form-urlencoded"
        );
        // Not replayable, so streamed, with the length it arrived with.
        assert_eq!(calls[0].body, None);
        assert_eq!(calls[0].headers.get("content-length").unwrap(), "3");
    }

    #[tokio::test]
    async fn body_of_unknown_length_has_no_content_length() {
        let transport = Arc::new(RecordingTransport::default());
        let chunks: Vec<Result<Bytes, std::io::Error>> = vec![Ok(Bytes::from("a=")), Ok(Bytes::from("1"))];
        let request = Request::builder()
            .method(Method::PUT)
            .uri("/upload")
            .header("transfer-encoding", "chunked")
            .body(Body::from_stream(futures_util::stream::iter(chunks)))
            .unwrap();

        forwarder(transport.clone(), RetryConfig::default())
            .forward(request, &proxy("http://example.com"))
            .await
            .unwrap();

        let calls = transport.calls.lock().unwrap();
        assert!(calls[0].headers.get("content-length").is_none());
        assert!(calls[0].headers.get("transfer-encoding").is_none());
    }

    #[tokio::test]
    async fn remote_user_is_injected() {
        let transport = Arc::new(RecordingTransport::default());
        let config = ProxyConfig::new(&ProxyDefinition {
            upstream: Some("http://example.com".to_string()),
            add_remote_user: true,
            ..Default::default()
        })
        .unwrap();

        let mut request = get("/");
        request
            .extensions_mut()
            .insert(RemoteUser("alice".to_string()));
        forwarder(transport.clone(), RetryConfig::default())
            .forward(request, &config)
            .await
            .unwrap();

        let calls = transport.calls.lock().unwrap();
        assert_eq!(calls[0].headers.get("remote_user").unwrap(), "alice");
    }

    #[tokio::test]
    async fn strips_route_prefix() {
        let transport = Arc::new(RecordingTransport::default());
        let config = ProxyConfig::new(&ProxyDefinition {
            upstream: Some("http://example.com/base".to_string()),
            path_prefix: "/app/".to_string(),
            strip_prefix: true,
            ..Default::default()
        })
        .unwrap();

        forwarder(transport.clone(), RetryConfig::default())
            .forward(get("/app/page?x=1"), &config)
            .await
            .unwrap();

        let calls = transport.calls.lock().unwrap();
        assert_eq!(calls[0].url, "http://example.com/base/page?x=1");
    }

    #[tokio::test]
    async fn no_retry_by_default() {
        let transport = Arc::new(RecordingTransport::default());
        transport.failures.store(1, Ordering::SeqCst);

        let err = forwarder(transport.clone(), RetryConfig::default())
            .forward(get("/"), &proxy("http://example.com"))
            .await
            .err()
            .unwrap();

        assert!(matches!(err, ForwardError::UpstreamUnavailable { .. }));
        assert_eq!(transport.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn retries_when_enabled() {
        let transport = Arc::new(RecordingTransport::default());
        transport.failures.store(2, Ordering::SeqCst);
        let retries = RetryConfig {
            enabled: true,
            max_attempts: 3,
            base_delay_ms: 1,
            max_delay_ms: 5,
            ..Default::default()
        };

        let request = Request::builder()
            .method(Method::PUT)
            .uri("/doc")
            .header("content-length", "5")
            .body(Body::from("hello"))
            .unwrap();
        forwarder(transport.clone(), retries)
            .forward(request, &proxy("http://example.com"))
            .await
            .unwrap();

        let calls = transport.calls.lock().unwrap();
        assert_eq!(calls.len(), 3);
        for call in calls.iter() {
            assert_eq!(call.body.as_deref(), Some(&b"hello"[..]));
            assert!(call.headers.get("content-length").is_none());
        }
    }

    #[tokio::test]
    async fn post_is_never_retried() {
        let transport = Arc::new(RecordingTransport::default());
        transport.failures.store(1, Ordering::SeqCst);
        let retries = RetryConfig {
            enabled: true,
            max_attempts: 3,
            ..Default::default()
        };

        let request = Request::builder()
            .method(Method::POST)
            .uri("/")
            .body(Body::from("x"))
            .unwrap();
        let result = forwarder(transport.clone(), retries)
            .forward(request, &proxy("http://example.com"))
            .await;

        assert!(result.is_err());
        assert_eq!(transport.calls.lock().unwrap().len(), 1);
    }
}

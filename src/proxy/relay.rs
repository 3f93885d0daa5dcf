//! Upstream response → client response.
//!
//! # Responsibilities
//! - Copy status and end-to-end headers; stream the body through
//! - For themed proxies, buffer eligible HTML and run the rewrite pipeline
//! - Fall back to the untouched upstream body whenever theming fails
//!
//! # Design Decisions
//! - Redirects and errors are relayed like any other response
//! - Bodies are only buffered when they will be rewritten, and never past
//!   `max_body_bytes`; an oversized body is relayed as already-read bytes
//!   followed by the rest of the stream
//! - Rewriting runs on a blocking thread

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::Response;
use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;

use crate::observability::metrics::{record_rewrite, RewriteOutcomeKind};
use crate::proxy::error::ForwardError;
use crate::proxy::headers::client_headers;
use crate::proxy::transport::UpstreamResponse;
use crate::theming::decode::{content_coding, decode_text, decompress, is_html, ContentCoding};
use crate::theming::{ContentRewritePipeline, RewriteContext, RewriteError, RewriteOutcome};

const THEMED_CONTENT_TYPE: &str = "text/html; charset=utf-8";

/// Pipeline and context used to theme one proxy's responses.
#[derive(Clone)]
pub struct Theming {
    pub pipeline: ContentRewritePipeline,
    pub context: Arc<RewriteContext>,
}

/// Relays upstream responses to the client.
#[derive(Debug, Clone)]
pub struct ResponseRelay {
    max_body_bytes: usize,
}

enum Collected {
    Complete(Bytes),
    /// Limit exceeded; the body replays what was read, then the rest.
    Overflow(Body),
}

impl ResponseRelay {
    pub fn new(max_body_bytes: usize) -> Self {
        Self { max_body_bytes }
    }

    /// Build the client response for `upstream`.
    ///
    /// `theming` is `None` when the proxy does not theme or the request
    /// cannot be themed (e.g. `HEAD`).
    pub async fn relay(
        &self,
        proxy: &str,
        upstream: UpstreamResponse,
        theming: Option<&Theming>,
    ) -> Result<Response, ForwardError> {
        let Some(theming) = theming else {
            return Ok(passthrough(upstream));
        };
        if !self.eligible(upstream.status, &upstream.headers) {
            record_rewrite(proxy, RewriteOutcomeKind::Skipped);
            return Ok(passthrough(upstream));
        }

        let UpstreamResponse {
            url,
            status,
            headers,
            body,
        } = upstream;

        let raw = match collect(body, self.max_body_bytes).await {
            Ok(Collected::Complete(bytes)) => bytes,
            Ok(Collected::Overflow(body)) => {
                tracing::debug!(proxy, limit = self.max_body_bytes, "HTML body too large to theme");
                record_rewrite(proxy, RewriteOutcomeKind::Skipped);
                return Ok(respond(status, client_headers(&headers, false), body));
            }
            Err(e) => {
                return Err(ForwardError::UpstreamProtocol {
                    url,
                    reason: format!("reading response body: {}", e),
                })
            }
        };

        let outcome = {
            let pipeline = theming.pipeline.clone();
            let context = theming.context.clone();
            let headers = headers.clone();
            let raw = raw.clone();
            let limit = self.max_body_bytes;
            tokio::task::spawn_blocking(move || rewrite(&pipeline, &context, &headers, &raw, limit)).await
        };

        match outcome {
            Ok(Ok(RewriteOutcome {
                html: Some(html),
                warnings,
            })) => {
                for warning in &warnings {
                    if warning.is_unmatched() {
                        tracing::debug!(proxy, url = %url, %warning, "Theming rule skipped");
                    } else {
                        tracing::warn!(proxy, url = %url, %warning, "Theming rule skipped");
                    }
                }
                record_rewrite(proxy, RewriteOutcomeKind::Themed);

                let mut client = client_headers(&headers, true);
                client.insert(header::CONTENT_TYPE, HeaderValue::from_static(THEMED_CONTENT_TYPE));
                client.insert(header::CONTENT_LENGTH, HeaderValue::from(html.len()));
                Ok(respond(status, client, Body::from(html)))
            }
            Ok(Ok(RewriteOutcome { html: None, .. })) => {
                tracing::debug!(proxy, url = %url, "Response opted out of theming");
                record_rewrite(proxy, RewriteOutcomeKind::Skipped);
                Ok(respond(status, client_headers(&headers, false), Body::from(raw)))
            }
            Ok(Err(e)) => {
                tracing::warn!(proxy, url = %url, error = %e, "Theming failed, relaying upstream body");
                record_rewrite(proxy, RewriteOutcomeKind::Fallback);
                Ok(respond(status, client_headers(&headers, false), Body::from(raw)))
            }
            Err(e) => {
                tracing::error!(proxy, url = %url, error = %e, "Theming task failed, relaying upstream body");
                record_rewrite(proxy, RewriteOutcomeKind::Fallback);
                Ok(respond(status, client_headers(&headers, false), Body::from(raw)))
            }
        }
    }

    /// Whether a response with this head can be themed.
    pub fn eligible(&self, status: StatusCode, headers: &HeaderMap) -> bool {
        if status.is_informational()
            || status == StatusCode::NO_CONTENT
            || status == StatusCode::NOT_MODIFIED
        {
            return false;
        }
        if !is_html(headers) || content_coding(headers).is_none() {
            return false;
        }
        let declared = headers
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<usize>().ok());
        !matches!(declared, Some(len) if len > self.max_body_bytes)
    }
}

fn rewrite(
    pipeline: &ContentRewritePipeline,
    context: &RewriteContext,
    headers: &HeaderMap,
    raw: &[u8],
    limit: usize,
) -> Result<RewriteOutcome, RewriteError> {
    let coding = content_coding(headers).unwrap_or(ContentCoding::Identity);
    let body = decompress(raw, coding, limit)?;
    let text = decode_text(&body, headers);
    pipeline.rewrite(&text, context)
}

async fn collect(body: Body, limit: usize) -> Result<Collected, axum::Error> {
    let mut stream = body.into_data_stream();
    let mut buffered = BytesMut::new();

    while let Some(chunk) = stream.next().await {
        buffered.extend_from_slice(&chunk?);
        if buffered.len() > limit {
            let head = buffered.freeze();
            let replay = futures_util::stream::once(async move { Ok::<_, axum::Error>(head) }).chain(stream);
            return Ok(Collected::Overflow(Body::from_stream(replay)));
        }
    }
    Ok(Collected::Complete(buffered.freeze()))
}

fn passthrough(upstream: UpstreamResponse) -> Response {
    respond(
        upstream.status,
        client_headers(&upstream.headers, false),
        upstream.body,
    )
}

fn respond(status: StatusCode, headers: HeaderMap, body: Body) -> Response {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

//! Header translation between the client leg and the upstream leg.
//!
//! # Responsibilities
//! - Copy inbound headers upstream minus hop-by-hop and framing headers
//! - Always send a `Cookie` header, empty when the client sent none
//! - Inject the authenticated principal when the proxy asks for it
//! - Copy upstream response headers back minus hop-by-hop headers and, for
//!   rewritten bodies, headers describing the original body
//!
//! # Design Decisions
//! - Headers named in `Connection` are hop-by-hop as well (RFC 9110 §7.6.1)
//! - An inbound `remote_user` header is never trusted
//! - Order of the remaining headers is kept

use std::collections::HashSet;

use axum::http::{header, HeaderMap, HeaderName, HeaderValue};

/// Header carrying the authenticated principal upstream.
pub static REMOTE_USER: HeaderName = HeaderName::from_static("remote_user");

/// Headers meaningful for a single transport leg only.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-connection",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Response headers that no longer describe a rewritten body.
const INVALIDATED_BY_REWRITE: &[&str] = &[
    "content-length",
    "content-encoding",
    "content-md5",
    "content-type",
    "etag",
];

/// Principal authenticated by whatever sits in front of the proxy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteUser(pub String);

/// Lower-cased header names listed in `Connection`.
fn connection_tokens(headers: &HeaderMap) -> HashSet<String> {
    headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|t| t.trim().trim_matches('"').to_ascii_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

fn is_hop_by_hop(name: &HeaderName, tokens: &HashSet<String>) -> bool {
    HOP_BY_HOP.contains(&name.as_str()) || tokens.contains(name.as_str())
}

/// Build the header set sent upstream.
pub fn outbound_headers(
    inbound: &HeaderMap,
    add_remote_user: bool,
    remote_user: Option<&RemoteUser>,
) -> HeaderMap {
    let tokens = connection_tokens(inbound);
    let mut outbound = HeaderMap::with_capacity(inbound.len() + 1);

    for (name, value) in inbound.iter() {
        if is_hop_by_hop(name, &tokens)
            || name == header::HOST
            || name == header::CONTENT_LENGTH
            || name == header::COOKIE
            || name == REMOTE_USER
        {
            continue;
        }
        outbound.append(name.clone(), value.clone());
    }

    outbound.insert(header::COOKIE, cookie_header(inbound));

    if add_remote_user {
        if let Some(user) = remote_user {
            match HeaderValue::from_str(&user.0) {
                Ok(value) => {
                    outbound.insert(REMOTE_USER.clone(), value);
                }
                Err(_) => {
                    tracing::warn!(user = %user.0, "Principal is not a valid header value, not forwarded");
                }
            }
        }
    }

    outbound
}

/// Join every inbound `Cookie` header into one; empty when there are none.
fn cookie_header(inbound: &HeaderMap) -> HeaderValue {
    let mut cookies = inbound.get_all(header::COOKIE).iter();
    let Some(first) = cookies.next() else {
        return HeaderValue::from_static("");
    };

    let mut joined = first.as_bytes().to_vec();
    for next in cookies {
        joined.extend_from_slice(b"; ");
        joined.extend_from_slice(next.as_bytes());
    }
    HeaderValue::from_bytes(&joined).unwrap_or_else(|_| first.clone())
}

/// Build the header set returned to the client.
pub fn client_headers(upstream: &HeaderMap, rewritten: bool) -> HeaderMap {
    let tokens = connection_tokens(upstream);
    let mut client = HeaderMap::with_capacity(upstream.len());

    for (name, value) in upstream.iter() {
        if is_hop_by_hop(name, &tokens) {
            continue;
        }
        if rewritten && INVALIDATED_BY_REWRITE.contains(&name.as_str()) {
            continue;
        }
        client.append(name.clone(), value.clone());
    }

    client
}

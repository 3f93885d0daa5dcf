//! Responses produced by the proxy itself rather than an upstream.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// No proxy definition matches the request.
pub fn no_route() -> Response {
    (StatusCode::NOT_FOUND, "No matching proxy").into_response()
}

//! Identity middleware.
//!
//! A gateway in front of the proxy authenticates users and names them in a
//! trusted header. The principal is moved from that header into a
//! [`RemoteUser`] extension so the forwarder can inject it upstream; the
//! header itself never travels further.

use axum::{
    body::Body,
    extract::State,
    http::{HeaderName, Request},
    middleware::Next,
    response::Response,
};

use crate::config::{ConfigurationError, IdentityConfig};
use crate::proxy::headers::RemoteUser;

/// Where to read the principal from.
#[derive(Debug, Clone, Default)]
pub struct IdentityState {
    trusted_header: Option<HeaderName>,
}

impl IdentityState {
    pub fn new(config: &IdentityConfig) -> Result<Self, ConfigurationError> {
        let trusted_header = match config.trusted_header.as_deref() {
            Some(name) => Some(HeaderName::from_bytes(name.as_bytes()).map_err(|_| {
                ConfigurationError::Invalid(format!("identity.trusted_header `{}` is not a header name", name))
            })?),
            None => None,
        };
        Ok(Self { trusted_header })
    }
}

pub async fn identity_middleware(
    State(state): State<IdentityState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    if let Some(name) = &state.trusted_header {
        if let Some(value) = req.headers_mut().remove(name) {
            match value.to_str().map(str::trim) {
                Ok(user) if !user.is_empty() => {
                    req.extensions_mut().insert(RemoteUser(user.to_string()));
                }
                _ => {
                    tracing::warn!(header = %name, "Ignoring unusable identity header");
                }
            }
        }
    }

    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::get, Router};
    use tower::ServiceExt;

    async fn echo(req: Request<Body>) -> String {
        let user = req
            .extensions()
            .get::<RemoteUser>()
            .map(|u| u.0.clone())
            .unwrap_or_default();
        let header_seen = req.headers().contains_key("x-auth-user");
        format!("{}|{}", user, header_seen)
    }

    fn app(trusted: Option<&str>) -> Router {
        let state = IdentityState::new(&IdentityConfig {
            trusted_header: trusted.map(str::to_string),
        })
        .unwrap();
        Router::new()
            .route("/", get(echo))
            .layer(axum::middleware::from_fn_with_state(state, identity_middleware))
    }

    async fn call(app: Router, user: Option<&str>) -> String {
        let mut builder = Request::builder().uri("/");
        if let Some(user) = user {
            builder = builder.header("x-auth-user", user);
        }
        let response = app.oneshot(builder.body(Body::empty()).unwrap()).await.unwrap();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn moves_principal_into_extension() {
        assert_eq!(call(app(Some("X-Auth-User")), Some("alice")).await, "alice|false");
        assert_eq!(call(app(Some("x-auth-user")), None).await, "|false");
    }

    #[tokio::test]
    async fn untrusted_header_is_left_alone() {
        assert_eq!(call(app(None), Some("alice")).await, "|true");
    }

    #[test]
    fn rejects_invalid_header_name() {
        let config = IdentityConfig {
            trusted_header: Some("bad header".to_string()),
        };
        assert!(IdentityState::new(&config).is_err());
    }
}

//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build one [`Proxy`] per definition and the routing table over them
//! - Create the Axum router with the catch-all proxy handler
//! - Wire up middleware (request ID, tracing, identity)
//! - Leave upstream deadlines to the transport, so a slow upstream surfaces
//!   as a gateway timeout
//! - Serve until the shutdown signal, then drain

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    response::Response,
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::{ConfigurationError, ProxyConfig, ServerConfig};
use crate::http::middleware::{identity_middleware, IdentityState};
use crate::http::request::{request_span, MakeRequestUuidV4, RequestIdExt, X_REQUEST_ID};
use crate::http::response::no_route;
use crate::proxy::{PooledTransport, Proxy, RequestForwarder, ResponseRelay, Transport};
use crate::routing::{RouteRule, Router as ProxyRouter};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub router: Arc<ProxyRouter<Proxy>>,
}

/// HTTP server for the reverse proxy.
pub struct HttpServer {
    router: Router,
    config: ServerConfig,
}

impl HttpServer {
    /// Create a server forwarding over a pooled connection transport.
    pub fn new(config: ServerConfig) -> Result<Self, ConfigurationError> {
        let transport = PooledTransport::new(&config.timeouts, &config.transport)
            .map_err(|e| ConfigurationError::Invalid(format!("building upstream client: {}", e)))?;
        Self::with_transport(config, Arc::new(transport))
    }

    /// Create a server forwarding over `transport`.
    pub fn with_transport(
        config: ServerConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, ConfigurationError> {
        let forwarder = RequestForwarder::new(transport, config.retries.clone());
        let relay = ResponseRelay::new(config.theming.max_body_bytes);

        let mut entries = Vec::with_capacity(config.proxies.len());
        for definition in &config.proxies {
            let proxy_config = ProxyConfig::new(definition)?;
            tracing::info!(
                proxy = %proxy_config.name(),
                upstream = %proxy_config.upstream(),
                host = ?proxy_config.host(),
                path_prefix = %proxy_config.path_prefix(),
                theming = proxy_config.theming().is_some(),
                "Proxy configured"
            );

            let rule = RouteRule {
                host: proxy_config.host().map(str::to_string),
                path_prefix: proxy_config.path_prefix().to_string(),
                priority: proxy_config.priority(),
            };
            let proxy = Proxy::new(
                proxy_config,
                forwarder.clone(),
                relay.clone(),
                &config.theming.template_dirs,
            );
            entries.push((rule, proxy));
        }

        let identity = IdentityState::new(&config.identity)?;
        let state = AppState {
            router: Arc::new(ProxyRouter::new(entries)),
        };
        let router = Self::build_router(state, identity);
        Ok(Self { router, config })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState, identity: IdentityState) -> Router {
        Router::new()
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(state)
            .layer(axum::middleware::from_fn_with_state(identity, identity_middleware))
            .layer(PropagateRequestIdLayer::new(X_REQUEST_ID.clone()))
            .layer(TraceLayer::new_for_http().make_span_with(request_span::<Body>))
            .layer(SetRequestIdLayer::new(X_REQUEST_ID.clone(), MakeRequestUuidV4))
    }

    /// Serve connections from `listener` until `shutdown` fires, then let
    /// in-flight requests finish.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            proxies = self.config.proxies.len(),
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// The Axum router, for driving the server without a socket.
    pub fn into_router(self) -> Router {
        self.router
    }
}

/// Route the request to its proxy.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    match state.router.route(&request) {
        Some(proxy) => proxy.handle(request).await,
        None => {
            tracing::warn!(
                request_id = %request.request_id(),
                host = ?request.headers().get(axum::http::header::HOST),
                path = %request.uri().path(),
                "No proxy matched"
            );
            no_route()
        }
    }
}

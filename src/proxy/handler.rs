//! One configured proxy: forward, then relay.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::http::{Method, Request};
use axum::response::{IntoResponse, Response};

use crate::config::ProxyConfig;
use crate::observability::metrics::{record_request, record_upstream_error};
use crate::proxy::forwarder::RequestForwarder;
use crate::proxy::relay::{ResponseRelay, Theming};
use crate::theming::{ContentRewritePipeline, FsTemplateLoader, RewriteContext, TemplateLoader};

/// A proxy definition bound to the shared forwarder.
pub struct Proxy {
    config: ProxyConfig,
    forwarder: RequestForwarder,
    relay: ResponseRelay,
    theming: Option<Theming>,
}

impl Proxy {
    /// `template_dirs` are searched for the theme template before the
    /// proxy's resource root.
    pub fn new(
        config: ProxyConfig,
        forwarder: RequestForwarder,
        relay: ResponseRelay,
        template_dirs: &[PathBuf],
    ) -> Self {
        let theming = config.theming().map(|settings| {
            let loader: Arc<dyn TemplateLoader> = Arc::new(FsTemplateLoader::with_resource_root(
                template_dirs,
                config.resource_root(),
            ));
            Theming {
                pipeline: ContentRewritePipeline::new(loader),
                context: Arc::new(RewriteContext {
                    theme_template: settings.template.clone(),
                    rules: settings.rules.clone(),
                    html5: config.html5(),
                }),
            }
        });

        Self {
            config,
            forwarder,
            relay,
            theming,
        }
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Serve one request end to end. Failures become gateway responses.
    pub async fn handle(&self, request: Request<Body>) -> Response {
        let start = Instant::now();
        let method = request.method().clone();
        let name = self.config.name();

        // A HEAD response has no body to theme.
        let theming = if method == Method::HEAD {
            None
        } else {
            self.theming.as_ref()
        };

        let result = match self.forwarder.forward(request, &self.config).await {
            Ok(upstream) => self.relay.relay(name, upstream, theming).await,
            Err(e) => Err(e),
        };

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(proxy = %name, error = %e, "Upstream exchange failed");
                record_upstream_error(name, e.kind());
                e.into_response()
            }
        };

        let elapsed = start.elapsed();
        tracing::debug!(
            proxy = %name,
            method = %method,
            status = response.status().as_u16(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Request proxied"
        );
        record_request(name, method.as_str(), response.status().as_u16(), elapsed);
        response
    }
}

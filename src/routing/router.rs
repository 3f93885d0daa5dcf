//! Route lookup.
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - Higher priority first, then longer path prefix, then host-scoped
//!   before host-less, then definition order
//! - Explicit `None` rather than a silent default route

use axum::body::Body;
use axum::http::Request;

use crate::routing::matcher::{AndMatcher, HostMatcher, Matcher, PathPrefixMatcher};

/// Conditions a request must meet to reach a target.
#[derive(Debug, Clone, Default)]
pub struct RouteRule {
    pub host: Option<String>,
    pub path_prefix: String,
    pub priority: u32,
}

#[derive(Debug)]
struct Route<T> {
    matcher: AndMatcher,
    priority: u32,
    prefix_len: usize,
    host_scoped: bool,
    target: T,
}

/// Ordered routing table.
#[derive(Debug)]
pub struct Router<T> {
    routes: Vec<Route<T>>,
}

impl<T> Router<T> {
    pub fn new(entries: impl IntoIterator<Item = (RouteRule, T)>) -> Self {
        let mut routes: Vec<Route<T>> = entries
            .into_iter()
            .map(|(rule, target)| {
                let prefix = PathPrefixMatcher::new(rule.path_prefix);
                let prefix_len = prefix.len();
                let host_scoped = rule.host.is_some();
                let mut matchers: Vec<Box<dyn Matcher>> = vec![Box::new(prefix)];
                if let Some(host) = rule.host {
                    matchers.push(Box::new(HostMatcher::new(host)));
                }
                Route {
                    matcher: AndMatcher::new(matchers),
                    priority: rule.priority,
                    prefix_len,
                    host_scoped,
                    target,
                }
            })
            .collect();

        // Stable sort keeps definition order among equals.
        routes.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then(b.prefix_len.cmp(&a.prefix_len))
                .then(b.host_scoped.cmp(&a.host_scoped))
        });

        Self { routes }
    }

    /// First target whose rule matches `req`.
    pub fn route(&self, req: &Request<Body>) -> Option<&T> {
        self.routes
            .iter()
            .find(|r| r.matcher.matches(req))
            .map(|r| &r.target)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

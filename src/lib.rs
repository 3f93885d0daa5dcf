//! Reverse proxy with optional HTML theming.
//!
//! Each configured proxy forwards requests to one upstream, preserving
//! method, body and most headers, and relays the answer. Proxies with theming
//! enabled merge upstream HTML into a site theme on the way back.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod proxy;
pub mod resilience;
pub mod routing;
pub mod theming;

pub use config::{ProxyConfig, ServerConfig};
pub use http::HttpServer;
pub use lifecycle::Shutdown;

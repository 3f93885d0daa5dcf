//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Directory holding the rule-set and theme template shipped with the crate.
pub const PACKAGED_RESOURCE_ROOT: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/resources");

/// Theme template used when a proxy does not name one.
pub const DEFAULT_THEME_TEMPLATE: &str = "diazo.html";

/// Root configuration for the reverse proxy server.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Shared upstream connection pool settings.
    pub transport: TransportConfig,

    /// Retry configuration.
    pub retries: RetryConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Authenticated identity propagation.
    pub identity: IdentityConfig,

    /// Settings shared by every theming proxy.
    pub theming: ThemingConfig,

    /// Proxy definitions, one per upstream.
    pub proxies: Vec<ProxyDefinition>,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Timeout configuration for upstream exchanges.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Deadline for the upstream response headers in seconds.
    pub request_secs: u64,

    /// Idle pooled connection lifetime in seconds.
    pub idle_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            request_secs: 30,
            idle_secs: 90,
        }
    }
}

/// Pooled transport configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Idle connections kept per upstream host.
    pub max_idle_per_host: usize,

    /// Maximum concurrently in-flight requests per upstream host.
    pub max_connections_per_host: usize,

    /// How long a request waits for a free slot, in seconds.
    pub acquire_timeout_secs: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_idle_per_host: 32,
            max_connections_per_host: 128,
            acquire_timeout_secs: 5,
        }
    }
}

/// Retry configuration. Disabled unless a deployment opts in.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Enable retries.
    pub enabled: bool,

    /// Maximum number of attempts, including the first one.
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,

    /// Largest request body buffered so it can be replayed.
    pub max_buffered_body: usize,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_attempts: 2,
            base_delay_ms: 100,
            max_delay_ms: 2000,
            max_buffered_body: 1024 * 1024,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Identity propagation configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct IdentityConfig {
    /// Header carrying the principal authenticated by a gateway in front of
    /// the proxy. Unset means requests are never authenticated.
    pub trusted_header: Option<String>,
}

/// Settings for the content rewrite pipeline.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ThemingConfig {
    /// HTML bodies larger than this are relayed without theming.
    pub max_body_bytes: usize,

    /// Directories searched for theme templates before a proxy's resource root.
    pub template_dirs: Vec<PathBuf>,
}

impl Default for ThemingConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 10 * 1024 * 1024,
            template_dirs: Vec::new(),
        }
    }
}

/// A single proxy definition as written in the config file.
///
/// Turned into a validated [`ProxyConfig`](crate::config::ProxyConfig) before
/// any request is served.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProxyDefinition {
    /// Identifier used in logs and metrics.
    pub name: String,

    /// Host header to match (case-insensitive, port ignored).
    pub host: Option<String>,

    /// Path prefix to match.
    pub path_prefix: String,

    /// Remove `path_prefix` from the path sent upstream.
    pub strip_prefix: bool,

    /// Route priority (higher = checked first).
    pub priority: u32,

    /// Upstream base URL. Required.
    pub upstream: Option<String>,

    /// Run eligible HTML responses through the theme.
    pub theming: bool,

    /// Emit the HTML5 doctype on themed output.
    pub html5: bool,

    /// Send the authenticated principal upstream.
    pub add_remote_user: bool,

    /// Explicit rule-set path. Defaults to `diazo.xml` in the resource root.
    #[serde(alias = "diazoRules")]
    pub diazo_rules: Option<PathBuf>,

    /// Theme template identifier.
    #[serde(alias = "diazoThemeTemplate")]
    pub diazo_theme_template: String,

    /// Directory the default rule-set and templates are resolved against.
    pub resource_root: Option<PathBuf>,
}

impl Default for ProxyDefinition {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            host: None,
            path_prefix: "/".to_string(),
            strip_prefix: false,
            priority: 0,
            upstream: None,
            theming: false,
            html5: false,
            add_remote_user: false,
            diazo_rules: None,
            diazo_theme_template: DEFAULT_THEME_TEMPLATE.to_string(),
            resource_root: None,
        }
    }
}

impl ProxyDefinition {
    /// Resource root, falling back to the packaged resources directory.
    pub fn resource_root(&self) -> PathBuf {
        self.resource_root
            .clone()
            .unwrap_or_else(|| PathBuf::from(PACKAGED_RESOURCE_ROOT))
    }
}

//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize, anchor relative paths)
//!     → validation.rs (semantic checks)
//!     → ServerConfig (validated, immutable)
//!     → proxy.rs: one ProxyConfig per [[proxies]] entry
//!     → shared via Arc to the request path
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - A proxy without an upstream is rejected at startup, never per request

pub mod loader;
pub mod proxy;
pub mod schema;
pub mod validation;

pub use proxy::{ConfigurationError, ProxyConfig, ThemeSettings};
pub use schema::IdentityConfig;
pub use schema::ListenerConfig;
pub use schema::ObservabilityConfig;
pub use schema::ProxyDefinition;
pub use schema::RetryConfig;
pub use schema::ServerConfig;
pub use schema::ThemingConfig;
pub use schema::TimeoutConfig;
pub use schema::TransportConfig;

//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, attempts >= 1)
//! - Check every proxy definition can be turned into a `ProxyConfig`
//! - Detect duplicate proxy names
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use crate::config::proxy::ProxyConfig;
use crate::config::schema::ServerConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Validate a loaded configuration.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("`{}` is not a socket address", config.listener.bind_address),
        ));
    }

    if config.timeouts.connect_secs == 0 {
        errors.push(ValidationError::new("timeouts.connect_secs", "must be greater than 0"));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }
    if config.transport.max_connections_per_host == 0 {
        errors.push(ValidationError::new(
            "transport.max_connections_per_host",
            "must be greater than 0",
        ));
    }
    if config.retries.enabled && config.retries.max_attempts == 0 {
        errors.push(ValidationError::new("retries.max_attempts", "must be at least 1"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("`{}` is not a socket address", config.observability.metrics_address),
        ));
    }

    if let Some(name) = config.identity.trusted_header.as_deref() {
        if axum::http::HeaderName::from_bytes(name.as_bytes()).is_err() {
            errors.push(ValidationError::new(
                "identity.trusted_header",
                format!("`{}` is not a valid header name", name),
            ));
        }
    }

    if config.proxies.is_empty() {
        errors.push(ValidationError::new("proxies", "at least one proxy must be defined"));
    }

    let mut names = HashSet::new();
    for (i, def) in config.proxies.iter().enumerate() {
        if !names.insert(def.name.as_str()) {
            errors.push(ValidationError::new(
                format!("proxies[{}].name", i),
                format!("duplicate proxy name `{}`", def.name),
            ));
        }
        if let Err(e) = ProxyConfig::new(def) {
            errors.push(ValidationError::new(format!("proxies[{}]", i), e.to_string()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::ProxyDefinition;

    fn proxy(name: &str, upstream: Option<&str>) -> ProxyDefinition {
        ProxyDefinition {
            name: name.to_string(),
            upstream: upstream.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn accepts_valid_config() {
        let mut config = ServerConfig::default();
        config.proxies.push(proxy("site", Some("http://127.0.0.1:8000")));
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn reports_every_error() {
        let mut config = ServerConfig::default();
        config.listener.bind_address = "nowhere".to_string();
        config.timeouts.request_secs = 0;
        config.proxies.push(proxy("site", None));
        config.proxies.push(proxy("site", Some("http://127.0.0.1:8000")));

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec!["listener.bind_address", "timeouts.request_secs", "proxies[0]", "proxies[1].name"]
        );
    }

    #[test]
    fn requires_a_proxy() {
        let errors = validate_config(&ServerConfig::default()).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "proxies");
    }
}

//! Validated, immutable per-proxy configuration.
//!
//! A [`ProxyDefinition`] from the config file becomes a [`ProxyConfig`] once,
//! at startup. Everything that can be wrong with a definition is reported
//! here, before a single request is accepted.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::schema::ProxyDefinition;
use crate::proxy::upstream::Upstream;
use crate::theming::resolver::{self, RuleResolutionError, RuleSet};

/// A proxy definition that cannot be served.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// No upstream was configured.
    #[error("proxy `{proxy}` has no upstream configured")]
    MissingUpstream { proxy: String },

    /// The upstream is not an absolute http(s) URL.
    #[error("proxy `{proxy}` has an invalid upstream `{upstream}`: {reason}")]
    InvalidUpstream {
        proxy: String,
        upstream: String,
        reason: String,
    },

    /// The rule-set could not be located.
    #[error("proxy `{proxy}`: {source}")]
    RuleResolution {
        proxy: String,
        #[source]
        source: RuleResolutionError,
    },

    /// The server-level configuration was rejected.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Configuration of one proxy instance.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    name: String,
    upstream: Upstream,
    host: Option<String>,
    path_prefix: String,
    strip_prefix: bool,
    priority: u32,
    html5: bool,
    add_remote_user: bool,
    theming: Option<ThemeSettings>,
    resource_root: PathBuf,
}

/// Theme inputs of a theming proxy.
#[derive(Debug, Clone)]
pub struct ThemeSettings {
    pub rules: RuleSet,
    pub template: String,
}

impl ProxyConfig {
    /// Validate a definition.
    pub fn new(def: &ProxyDefinition) -> Result<Self, ConfigurationError> {
        let raw = def
            .upstream
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| ConfigurationError::MissingUpstream {
                proxy: def.name.clone(),
            })?;
        let upstream = Upstream::parse(&def.name, raw)?;

        let resource_root = def.resource_root();
        let theming = if def.theming {
            let rules = resolver::resolve(def.diazo_rules.as_deref(), &resource_root).map_err(
                |source| ConfigurationError::RuleResolution {
                    proxy: def.name.clone(),
                    source,
                },
            )?;
            Some(ThemeSettings {
                rules,
                template: def.diazo_theme_template.clone(),
            })
        } else {
            None
        };

        let mut path_prefix = def.path_prefix.clone();
        if !path_prefix.starts_with('/') {
            path_prefix.insert(0, '/');
        }

        Ok(Self {
            name: def.name.clone(),
            upstream,
            host: def.host.clone(),
            path_prefix,
            strip_prefix: def.strip_prefix,
            priority: def.priority,
            html5: def.html5,
            add_remote_user: def.add_remote_user,
            theming,
            resource_root,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn upstream(&self) -> &Upstream {
        &self.upstream
    }

    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    pub fn path_prefix(&self) -> &str {
        &self.path_prefix
    }

    pub fn strip_prefix(&self) -> bool {
        self.strip_prefix
    }

    pub fn priority(&self) -> u32 {
        self.priority
    }

    pub fn html5(&self) -> bool {
        self.html5
    }

    pub fn add_remote_user(&self) -> bool {
        self.add_remote_user
    }

    /// Theme inputs, `None` for a plain forwarding proxy.
    pub fn theming(&self) -> Option<&ThemeSettings> {
        self.theming.as_ref()
    }

    pub fn resource_root(&self) -> &Path {
        &self.resource_root
    }
}

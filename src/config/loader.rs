//! Configuration loading from disk.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::schema::ServerConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load and validate configuration from a TOML file.
///
/// Relative `resource_root`, `diazo_rules` and `template_dirs` paths are
/// resolved against the directory holding the config file, never the working
/// directory.
pub fn load_config(path: &Path) -> Result<ServerConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    let mut config: ServerConfig = toml::from_str(&content).map_err(ConfigError::Parse)?;

    let base = path
        .canonicalize()
        .map_err(ConfigError::Io)?
        .parent()
        .map(Path::to_path_buf);
    if let Some(base) = base {
        for proxy in &mut config.proxies {
            if let Some(root) = proxy.resource_root.as_mut() {
                absolutize(root, &base);
            }
            if let Some(rules) = proxy.diazo_rules.as_mut() {
                absolutize(rules, &base);
            }
        }
        for dir in &mut config.theming.template_dirs {
            absolutize(dir, &base);
        }
    }

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

fn absolutize(path: &mut PathBuf, base: &Path) {
    if path.is_relative() {
        *path = base.join(&*path);
    }
}

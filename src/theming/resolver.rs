//! Rule-set location.
//!
//! # Responsibilities
//! - Pick the rule file for a proxy: explicit override, else `diazo.xml` in
//!   the proxy's resource root
//! - Reject an override that points at nothing
//!
//! # Design Decisions
//! - Pure function of the configuration; never consults the working directory
//! - The packaged default is compiled in, so a binary installed away from its
//!   source tree still themes with it

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::schema::PACKAGED_RESOURCE_ROOT;
use crate::theming::error::RewriteError;

/// File name of the default rule-set inside a resource root.
pub const DEFAULT_RULES_FILE: &str = "diazo.xml";

/// The packaged rule-set, used when its file is not on disk.
pub const PACKAGED_RULES: &str = include_str!("../../resources/diazo.xml");

/// Errors raised while locating a rule-set.
#[derive(Debug, Error)]
pub enum RuleResolutionError {
    /// The explicitly configured rule file does not exist.
    #[error("rule file {} does not exist", .0.display())]
    Missing(PathBuf),
}

/// Resolved location of a transformation rule file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleSet {
    path: PathBuf,
    packaged: Option<&'static str>,
}

impl RuleSet {
    /// Path of the rule file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the rule document. The packaged default falls back to its
    /// compiled-in copy when the file is missing.
    pub fn load(&self) -> Result<String, RewriteError> {
        match (std::fs::read_to_string(&self.path), self.packaged) {
            (Ok(source), _) => Ok(source),
            (Err(e), Some(packaged)) if e.kind() == std::io::ErrorKind::NotFound => {
                Ok(packaged.to_string())
            }
            (Err(source), _) => Err(RewriteError::RuleIo {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

/// Resolve the rule-set for a proxy.
///
/// An override is honored verbatim when it exists. Without an override the
/// default file next to the proxy's resources is used.
pub fn resolve(
    override_path: Option<&Path>,
    resource_root: &Path,
) -> Result<RuleSet, RuleResolutionError> {
    match override_path {
        Some(path) => {
            if !path.is_file() {
                return Err(RuleResolutionError::Missing(path.to_path_buf()));
            }
            Ok(RuleSet {
                path: path.to_path_buf(),
                packaged: None,
            })
        }
        None => Ok(RuleSet {
            path: resource_root.join(DEFAULT_RULES_FILE),
            packaged: (resource_root == Path::new(PACKAGED_RESOURCE_ROOT)).then_some(PACKAGED_RULES),
        }),
    }
}

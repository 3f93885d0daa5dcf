//! Theme template lookup.

use std::path::{Component, Path, PathBuf};

use crate::config::schema::{DEFAULT_THEME_TEMPLATE, PACKAGED_RESOURCE_ROOT};
use crate::theming::error::RewriteError;

/// The packaged theme, used when its file is not on disk.
pub const PACKAGED_THEME: &str = include_str!("../../resources/diazo.html");

/// Loads theme markup by template name.
pub trait TemplateLoader: Send + Sync {
    fn load(&self, name: &str) -> Result<String, RewriteError>;
}

/// Looks templates up in an ordered list of directories; the first
/// directory holding the file wins.
#[derive(Debug, Clone)]
pub struct FsTemplateLoader {
    dirs: Vec<PathBuf>,
    /// Serve the compiled-in default theme when no directory has it.
    packaged: bool,
}

impl FsTemplateLoader {
    pub fn new(dirs: Vec<PathBuf>) -> Self {
        Self { dirs, packaged: false }
    }

    /// Search `template_dirs` first, then `resource_root`.
    pub fn with_resource_root(template_dirs: &[PathBuf], resource_root: &Path) -> Self {
        let mut dirs = template_dirs.to_vec();
        dirs.push(resource_root.to_path_buf());
        Self {
            dirs,
            packaged: resource_root == Path::new(PACKAGED_RESOURCE_ROOT),
        }
    }
}

impl TemplateLoader for FsTemplateLoader {
    fn load(&self, name: &str) -> Result<String, RewriteError> {
        let relative = Path::new(name);
        let plain = !name.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !plain {
            return Err(RewriteError::Template {
                name: name.to_string(),
                reason: "template names must be relative paths without `..`".to_string(),
            });
        }

        for dir in &self.dirs {
            let candidate = dir.join(relative);
            match std::fs::read_to_string(&candidate) {
                Ok(markup) => return Ok(markup),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(RewriteError::Template {
                        name: name.to_string(),
                        reason: format!("{}: {}", candidate.display(), e),
                    })
                }
            }
        }

        if self.packaged && name == DEFAULT_THEME_TEMPLATE {
            return Ok(PACKAGED_THEME.to_string());
        }

        Err(RewriteError::Template {
            name: name.to_string(),
            reason: "not found".to_string(),
        })
    }
}

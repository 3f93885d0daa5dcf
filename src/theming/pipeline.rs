//! The rewrite pipeline: rule file + theme template + upstream HTML.

use std::sync::Arc;

use crate::theming::error::{RewriteError, RewriteWarning};
use crate::theming::resolver::RuleSet;
use crate::theming::rules::parse_rules;
use crate::theming::template::TemplateLoader;
use crate::theming::transform;

/// What to theme with, assembled once per proxy.
#[derive(Debug, Clone)]
pub struct RewriteContext {
    pub theme_template: String,
    pub rules: RuleSet,
    pub html5: bool,
}

/// Result of a rewrite that did not fail outright.
#[derive(Debug)]
pub struct RewriteOutcome {
    /// Themed document, or `None` when a `notheme` rule opted out.
    pub html: Option<String>,
    /// Rules that were skipped.
    pub warnings: Vec<RewriteWarning>,
}

/// Applies a rule set and theme template to upstream HTML.
///
/// The rule file and template are read on every call, so edits show up
/// without a restart. Callers run this on a blocking thread.
#[derive(Clone)]
pub struct ContentRewritePipeline {
    templates: Arc<dyn TemplateLoader>,
}

impl ContentRewritePipeline {
    pub fn new(templates: Arc<dyn TemplateLoader>) -> Self {
        Self { templates }
    }

    pub fn rewrite(&self, html: &str, context: &RewriteContext) -> Result<RewriteOutcome, RewriteError> {
        let source = context.rules.load()?;
        let document = parse_rules(&source)?;
        let theme = self.templates.load(&context.theme_template)?;

        let mut warnings = document.warnings;
        let html = transform::merge(html, &theme, &document.rules, context.html5, &mut warnings);
        Ok(RewriteOutcome { html, warnings })
    }
}

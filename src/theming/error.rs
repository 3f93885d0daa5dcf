//! Rewrite errors and warnings.

use std::path::PathBuf;

use thiserror::Error;

/// A failure that prevents theming a response. The upstream body is relayed
/// unchanged instead.
#[derive(Debug, Error)]
pub enum RewriteError {
    /// The rule document is not well-formed.
    #[error("invalid rule syntax: {0}")]
    RuleSyntax(String),

    /// The rule file could not be read.
    #[error("reading rule file {}: {source}", path.display())]
    RuleIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The theme template could not be loaded.
    #[error("theme template `{name}`: {reason}")]
    Template { name: String, reason: String },

    /// The upstream body could not be decoded.
    #[error("decoding upstream body: {0}")]
    Decode(String),
}

/// A rule that was skipped. Reported, never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RewriteWarning {
    #[error("unknown rule <{0}> ignored")]
    UnknownRule(String),

    #[error("element <{0}> nested inside a rule ignored")]
    Nested(String),

    #[error("<{rule}> is missing the `{attribute}` attribute")]
    MissingAttribute {
        rule: &'static str,
        attribute: &'static str,
    },

    #[error("invalid selector `{selector}`: {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("<{rule}> theme selector `{selector}` matched nothing")]
    NoThemeMatch {
        rule: &'static str,
        selector: String,
    },

    #[error("<{rule}> content selector `{selector}` matched nothing")]
    NoContentMatch {
        rule: &'static str,
        selector: String,
    },
}

impl RewriteWarning {
    /// A selector that matched nothing; expected for pages lacking optional
    /// parts, so logged quietly.
    pub fn is_unmatched(&self) -> bool {
        matches!(
            self,
            RewriteWarning::NoThemeMatch { .. } | RewriteWarning::NoContentMatch { .. }
        )
    }
}

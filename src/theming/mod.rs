//! HTML theming.
//!
//! Upstream HTML is merged into a site theme according to a rule document:
//!
//! ```text
//! upstream body ──▶ decode ──▶ transform::merge(content, theme, rules) ──▶ themed HTML
//!                                   ▲              ▲
//!                          TemplateLoader      rules::parse_rules
//! ```
//!
//! Anything that goes wrong here is reported as a [`RewriteError`]; the
//! caller then relays the upstream body as it was.

pub mod decode;
pub mod error;
pub mod pipeline;
pub mod resolver;
pub mod rules;
pub mod template;
pub mod transform;

pub use error::{RewriteError, RewriteWarning};
pub use pipeline::{ContentRewritePipeline, RewriteContext, RewriteOutcome};
pub use resolver::{RuleResolutionError, RuleSet};
pub use template::{FsTemplateLoader, TemplateLoader};

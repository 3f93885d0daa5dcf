//! Rule document parsing.
//!
//! A rule document maps theme insertion points to upstream content, both
//! addressed with CSS selectors:
//!
//! ```xml
//! <rules>
//!   <notheme if-content="body.raw" />
//!   <drop content=".ads" />
//!   <replace theme="#content" content="#main" />
//!   <replace-children theme="title" content="title" />
//!   <append theme="head" content="head link[rel=stylesheet]" />
//!   <prepend theme="body" content="#banner" if-content="#banner" />
//!   <before theme="#footer" content=".notice" />
//!   <after theme="#nav" content="#breadcrumbs" />
//!   <drop theme="#sidebar" />
//! </rules>
//! ```
//!
//! Rules run in document order, except that `notheme` rules and `drop`
//! rules on content are evaluated first. Malformed XML fails the whole
//! document; a rule that merely lacks an attribute or has an unknown name is
//! skipped with a warning.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::theming::error::{RewriteError, RewriteWarning};

/// What a rule does with its matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleAction {
    Replace,
    ReplaceChildren,
    Before,
    After,
    Prepend,
    Append,
    Drop,
    NoTheme,
}

impl RuleAction {
    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "replace" => RuleAction::Replace,
            "replace-children" => RuleAction::ReplaceChildren,
            "before" => RuleAction::Before,
            "after" => RuleAction::After,
            "prepend" => RuleAction::Prepend,
            "append" => RuleAction::Append,
            "drop" => RuleAction::Drop,
            "notheme" => RuleAction::NoTheme,
            _ => return None,
        })
    }

    /// Element name of the rule.
    pub fn name(self) -> &'static str {
        match self {
            RuleAction::Replace => "replace",
            RuleAction::ReplaceChildren => "replace-children",
            RuleAction::Before => "before",
            RuleAction::After => "after",
            RuleAction::Prepend => "prepend",
            RuleAction::Append => "append",
            RuleAction::Drop => "drop",
            RuleAction::NoTheme => "notheme",
        }
    }
}

/// A single parsed rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub action: RuleAction,
    pub theme: Option<String>,
    pub content: Option<String>,
    pub if_content: Option<String>,
}

/// Parsed rules plus the problems found while reading them.
#[derive(Debug, Default)]
pub struct RuleDocument {
    pub rules: Vec<Rule>,
    pub warnings: Vec<RewriteWarning>,
}

/// Parse a rule document.
pub fn parse_rules(xml: &str) -> Result<RuleDocument, RewriteError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut document = RuleDocument::default();
    let mut depth = 0usize;
    let mut seen_root = false;

    loop {
        let event = reader.read_event().map_err(|e| {
            RewriteError::RuleSyntax(format!("at byte {}: {}", reader.error_position(), e))
        })?;

        match event {
            Event::Start(ref element) | Event::Empty(ref element) => {
                let is_start = matches!(event, Event::Start(_));
                let name = String::from_utf8_lossy(element.name().as_ref()).into_owned();

                match depth {
                    0 => {
                        if seen_root {
                            return Err(RewriteError::RuleSyntax(
                                "more than one root element".to_string(),
                            ));
                        }
                        if name != "rules" {
                            return Err(RewriteError::RuleSyntax(format!(
                                "root element must be <rules>, found <{}>",
                                name
                            )));
                        }
                        seen_root = true;
                    }
                    1 => match RuleAction::from_name(&name) {
                        Some(action) => {
                            if let Some(rule) = read_rule(action, element, &mut document.warnings)? {
                                document.rules.push(rule);
                            }
                        }
                        None => document.warnings.push(RewriteWarning::UnknownRule(name)),
                    },
                    _ => document.warnings.push(RewriteWarning::Nested(name)),
                }

                if is_start {
                    depth += 1;
                }
            }
            Event::End(_) => depth = depth.saturating_sub(1),
            Event::Text(ref text) if depth == 0 => {
                return Err(RewriteError::RuleSyntax(format!(
                    "text outside the root element: {:?}",
                    String::from_utf8_lossy(text.as_ref())
                )));
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if depth != 0 {
        return Err(RewriteError::RuleSyntax("unclosed element at end of document".to_string()));
    }
    if !seen_root {
        return Err(RewriteError::RuleSyntax("missing <rules> root element".to_string()));
    }

    Ok(document)
}

fn read_rule(
    action: RuleAction,
    element: &BytesStart<'_>,
    warnings: &mut Vec<RewriteWarning>,
) -> Result<Option<Rule>, RewriteError> {
    let mut rule = Rule {
        action,
        theme: None,
        content: None,
        if_content: None,
    };

    for attr in element.attributes() {
        let attr = attr.map_err(|e| RewriteError::RuleSyntax(e.to_string()))?;
        let value = attr
            .unescape_value()
            .map_err(|e| RewriteError::RuleSyntax(e.to_string()))?
            .trim()
            .to_string();
        match attr.key.as_ref() {
            b"theme" => rule.theme = Some(value),
            b"content" => rule.content = Some(value),
            b"if-content" => rule.if_content = Some(value),
            _ => {}
        }
    }

    let missing = |attribute| RewriteWarning::MissingAttribute {
        rule: action.name(),
        attribute,
    };
    match action {
        RuleAction::NoTheme => {}
        RuleAction::Drop => {
            if rule.theme.is_none() && rule.content.is_none() {
                warnings.push(missing("theme"));
                return Ok(None);
            }
        }
        _ => {
            if rule.theme.is_none() {
                warnings.push(missing("theme"));
                return Ok(None);
            }
            if rule.content.is_none() {
                warnings.push(missing("content"));
                return Ok(None);
            }
        }
    }

    Ok(Some(rule))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rules_in_order() {
        let doc = parse_rules(
            r##"<?xml version="1.0"?>
            <!-- site rules -->
            <rules>
                <replace theme="#content" content="#main" />
                <drop theme="#sidebar"/>
                <append theme="head" content="head link" if-content="head link"></append>
            </rules>"##,
        )
        .unwrap();

        assert!(doc.warnings.is_empty());
        let actions: Vec<_> = doc.rules.iter().map(|r| r.action).collect();
        assert_eq!(actions, vec![RuleAction::Replace, RuleAction::Drop, RuleAction::Append]);
        assert_eq!(doc.rules[0].theme.as_deref(), Some("#content"));
        assert_eq!(doc.rules[0].content.as_deref(), Some("#main"));
        assert_eq!(doc.rules[2].if_content.as_deref(), Some("head link"));
    }

    #[test]
    fn unescapes_attribute_values() {
        let doc = parse_rules(r#"<rules><drop content="a[href^=&quot;http&quot;]"/></rules>"#).unwrap();
        assert_eq!(doc.rules[0].content.as_deref(), Some(r#"a[href^="http"]"#));
    }

    #[test]
    fn bad_rules_are_warnings() {
        let doc = parse_rules(
            r##"<rules>
                <replace theme="#a" />
                <drop />
                <transmogrify theme="#a" content="#b" />
                <before theme="#a" content="#b"><nested /></before>
                <notheme />
            </rules>"##,
        )
        .unwrap();

        assert_eq!(doc.rules.len(), 2);
        assert_eq!(doc.rules[0].action, RuleAction::Before);
        assert_eq!(doc.rules[1].action, RuleAction::NoTheme);
        assert_eq!(
            doc.warnings,
            vec![
                RewriteWarning::MissingAttribute {
                    rule: "replace",
                    attribute: "content"
                },
                RewriteWarning::MissingAttribute {
                    rule: "drop",
                    attribute: "theme"
                },
                RewriteWarning::UnknownRule("transmogrify".to_string()),
                RewriteWarning::Nested("nested".to_string()),
            ]
        );
    }

    #[test]
    fn malformed_xml_is_fatal() {
        assert!(matches!(
            parse_rules("<rules><replace theme='#a' content='#b'></rules>"),
            Err(RewriteError::RuleSyntax(_))
        ));
        assert!(matches!(parse_rules("<rules>"), Err(RewriteError::RuleSyntax(_))));
        assert!(matches!(parse_rules(""), Err(RewriteError::RuleSyntax(_))));
        assert!(matches!(parse_rules("<theme/>"), Err(RewriteError::RuleSyntax(_))));
        assert!(matches!(
            parse_rules("<rules/><rules/>"),
            Err(RewriteError::RuleSyntax(_))
        ));
    }
}

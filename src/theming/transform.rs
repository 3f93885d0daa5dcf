//! Merging upstream content into a theme document.
//!
//! Both documents are parsed leniently with `scraper`; content nodes are
//! deep-copied into the theme tree, so the upstream document is never
//! mutated by merge rules (only by `drop content=` rules, which run first).

use std::collections::{HashMap, HashSet};

use ego_tree::{NodeId, NodeMut, NodeRef};
use scraper::{ElementRef, Html, Node, Selector};

use crate::theming::error::RewriteWarning;
use crate::theming::rules::{Rule, RuleAction};

/// Doctype emitted for HTML5 output.
pub const HTML5_DOCTYPE: &str = "<!DOCTYPE html>";

/// Merge `content_markup` into `theme_markup` following `rules`.
///
/// Returns `None` when a `notheme` rule matched, i.e. the response must be
/// relayed unthemed.
pub fn merge(
    content_markup: &str,
    theme_markup: &str,
    rules: &[Rule],
    html5: bool,
    warnings: &mut Vec<RewriteWarning>,
) -> Option<String> {
    let mut content = Html::parse_document(content_markup);
    let mut theme = Html::parse_document(theme_markup);
    let mut selectors = Selectors::default();

    for rule in rules.iter().filter(|r| r.action == RuleAction::NoTheme) {
        if condition_holds(rule, &content, &mut selectors, warnings) {
            return None;
        }
    }

    for rule in rules.iter().filter(|r| r.action == RuleAction::Drop) {
        let Some(source) = rule.content.as_deref() else {
            continue;
        };
        if !condition_holds(rule, &content, &mut selectors, warnings) {
            continue;
        }
        let Some(selector) = selectors.get(source, warnings) else {
            continue;
        };
        let matched = matched_ids(&content, &selector);
        if matched.is_empty() {
            warnings.push(RewriteWarning::NoContentMatch {
                rule: rule.action.name(),
                selector: source.to_string(),
            });
            continue;
        }
        detach_all(&mut content, matched);
    }

    for rule in rules {
        match rule.action {
            RuleAction::NoTheme => {}
            RuleAction::Drop => {
                let Some(source) = rule.theme.as_deref() else {
                    continue;
                };
                if !condition_holds(rule, &content, &mut selectors, warnings) {
                    continue;
                }
                let Some(selector) = selectors.get(source, warnings) else {
                    continue;
                };
                let targets = matched_ids(&theme, &selector);
                if targets.is_empty() {
                    warnings.push(RewriteWarning::NoThemeMatch {
                        rule: rule.action.name(),
                        selector: source.to_string(),
                    });
                    continue;
                }
                detach_all(&mut theme, targets);
            }
            _ => {
                if condition_holds(rule, &content, &mut selectors, warnings) {
                    apply(rule, &mut theme, &content, &mut selectors, warnings);
                }
            }
        }
    }

    let doctype = if html5 {
        Some(HTML5_DOCTYPE)
    } else {
        leading_doctype(theme_markup)
    };
    Some(serialize(&theme, doctype))
}

/// Compiled selectors, each source compiled (and reported) once per merge.
#[derive(Default)]
struct Selectors {
    compiled: HashMap<String, Option<Selector>>,
}

impl Selectors {
    fn get(&mut self, source: &str, warnings: &mut Vec<RewriteWarning>) -> Option<Selector> {
        self.compiled
            .entry(source.to_string())
            .or_insert_with(|| match Selector::parse(source) {
                Ok(selector) => Some(selector),
                Err(e) => {
                    warnings.push(RewriteWarning::InvalidSelector {
                        selector: source.to_string(),
                        reason: e.to_string(),
                    });
                    None
                }
            })
            .clone()
    }
}

fn condition_holds(
    rule: &Rule,
    content: &Html,
    selectors: &mut Selectors,
    warnings: &mut Vec<RewriteWarning>,
) -> bool {
    match rule.if_content.as_deref() {
        None => true,
        Some(source) => match selectors.get(source, warnings) {
            Some(selector) => content.select(&selector).next().is_some(),
            None => false,
        },
    }
}

fn apply(
    rule: &Rule,
    theme: &mut Html,
    content: &Html,
    selectors: &mut Selectors,
    warnings: &mut Vec<RewriteWarning>,
) {
    let (Some(theme_source), Some(content_source)) = (rule.theme.as_deref(), rule.content.as_deref())
    else {
        return;
    };
    let (Some(theme_selector), Some(content_selector)) = (
        selectors.get(theme_source, warnings),
        selectors.get(content_source, warnings),
    ) else {
        return;
    };

    let targets = matched_ids(theme, &theme_selector);
    if targets.is_empty() {
        warnings.push(RewriteWarning::NoThemeMatch {
            rule: rule.action.name(),
            selector: theme_source.to_string(),
        });
        return;
    }

    let sources = outermost(content.select(&content_selector).map(|e| *e).collect());
    if sources.is_empty() {
        warnings.push(RewriteWarning::NoContentMatch {
            rule: rule.action.name(),
            selector: content_source.to_string(),
        });
        return;
    }

    for target_id in targets {
        if rule.action == RuleAction::ReplaceChildren {
            let old_children: Vec<NodeId> = match theme.tree.get(target_id) {
                Some(node) => node.children().map(|c| c.id()).collect(),
                None => continue,
            };
            detach_all(theme, old_children);
        }

        let Some(mut target) = theme.tree.get_mut(target_id) else {
            continue;
        };
        match rule.action {
            RuleAction::Replace => {
                for source in &sources {
                    let mut copy = target.insert_before(source.value().clone());
                    copy_children(&mut copy, *source);
                }
                target.detach();
            }
            RuleAction::ReplaceChildren => {
                for source in &sources {
                    copy_children(&mut target, *source);
                }
            }
            RuleAction::Before => {
                for source in &sources {
                    let mut copy = target.insert_before(source.value().clone());
                    copy_children(&mut copy, *source);
                }
            }
            RuleAction::After => {
                for source in sources.iter().rev() {
                    let mut copy = target.insert_after(source.value().clone());
                    copy_children(&mut copy, *source);
                }
            }
            RuleAction::Prepend => {
                for source in sources.iter().rev() {
                    let mut copy = target.prepend(source.value().clone());
                    copy_children(&mut copy, *source);
                }
            }
            RuleAction::Append => {
                for source in &sources {
                    let mut copy = target.append(source.value().clone());
                    copy_children(&mut copy, *source);
                }
            }
            RuleAction::Drop | RuleAction::NoTheme => {}
        }
    }
}

fn matched_ids(document: &Html, selector: &Selector) -> Vec<NodeId> {
    outermost(document.select(selector).map(|e| *e).collect())
        .iter()
        .map(|n| n.id())
        .collect()
}

/// Drop matches nested inside other matches; their outermost match already
/// carries them.
fn outermost(nodes: Vec<NodeRef<'_, Node>>) -> Vec<NodeRef<'_, Node>> {
    let ids: HashSet<NodeId> = nodes.iter().map(|n| n.id()).collect();
    nodes
        .into_iter()
        .filter(|n| !n.ancestors().any(|a| ids.contains(&a.id())))
        .collect()
}

fn detach_all(document: &mut Html, ids: Vec<NodeId>) {
    for id in ids {
        if let Some(mut node) = document.tree.get_mut(id) {
            node.detach();
        }
    }
}

fn copy_children(target: &mut NodeMut<'_, Node>, source: NodeRef<'_, Node>) {
    for child in source.children() {
        let mut copy = target.append(child.value().clone());
        copy_children(&mut copy, child);
    }
}

/// The doctype declaration at the start of `markup`, if any.
pub fn leading_doctype(markup: &str) -> Option<&str> {
    let trimmed = markup.trim_start_matches(|c: char| c.is_whitespace() || c == '\u{feff}');
    let opener = trimmed.get(..9)?;
    if !opener.eq_ignore_ascii_case("<!doctype") {
        return None;
    }
    let end = trimmed.find('>')?;
    Some(&trimmed[..=end])
}

fn serialize(document: &Html, doctype: Option<&str>) -> String {
    let mut out = String::new();
    if let Some(doctype) = doctype {
        out.push_str(doctype);
        out.push('\n');
    }

    for child in document.tree.root().children() {
        match child.value() {
            Node::Element(_) => {
                if let Some(element) = ElementRef::wrap(child) {
                    out.push_str(&element.html());
                }
            }
            Node::Comment(comment) => {
                out.push_str("<!--");
                out.push_str(comment);
                out.push_str("-->");
            }
            _ => {}
        }
    }
    out
}

//! Query selector support.
//!
//! Supports type, universal (`*`), `#id` and `.class` simple selectors,
//! compounds of them (`button.primary#go`) and comma-separated lists.
//! Combinators and attribute or pseudo selectors are not supported.

use std::rc::Rc;

use rustkit_common::{Result, RustKitError};
use tracing::warn;

use crate::{Document, Node};

/// A compound selector: every part must match the same element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompoundSelector {
    /// Lowercased tag name; `None` for `*` or when omitted.
    pub tag_name: Option<String>,
    pub id: Option<String>,
    pub classes: Vec<String>,
}

impl CompoundSelector {
    /// Whether `node` matches.
    pub fn matches(&self, node: &Node) -> bool {
        let Some(tag_name) = node.tag_name() else {
            return false;
        };

        if let Some(wanted) = &self.tag_name {
            if !tag_name.eq_ignore_ascii_case(wanted) {
                return false;
            }
        }

        if let Some(wanted) = &self.id {
            if node.get_attribute("id") != Some(wanted.as_str()) {
                return false;
            }
        }

        self.classes.iter().all(|class| node.has_class(class))
    }

    fn parse(input: &str) -> Result<Self> {
        let mut compound = CompoundSelector::default();
        let mut rest = input;

        if let Some(after) = rest.strip_prefix('*') {
            rest = after;
        } else {
            let (tag, after) = split_ident(rest);
            if !tag.is_empty() {
                compound.tag_name = Some(tag.to_ascii_lowercase());
            }
            rest = after;
        }

        while let Some(marker) = rest.chars().next() {
            let (name, after) = split_ident(&rest[marker.len_utf8()..]);
            if name.is_empty() {
                return Err(unsupported(input));
            }
            match marker {
                '#' if compound.id.is_none() => compound.id = Some(name.to_string()),
                '.' => compound.classes.push(name.to_string()),
                _ => return Err(unsupported(input)),
            }
            rest = after;
        }

        if compound == CompoundSelector::default() && !input.starts_with('*') {
            return Err(unsupported(input));
        }
        Ok(compound)
    }
}

/// A comma-separated list of compound selectors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorList(Vec<CompoundSelector>);

impl SelectorList {
    /// Parse a selector list.
    pub fn parse(selector: &str) -> Result<Self> {
        let selector = selector.trim();
        if selector.is_empty() {
            return Err(RustKitError::InvalidArgument("empty selector".into()));
        }

        selector
            .split(',')
            .map(|part| CompoundSelector::parse(part.trim()))
            .collect::<Result<Vec<_>>>()
            .map(Self)
    }

    /// Whether any selector in the list matches `node`.
    pub fn matches(&self, node: &Node) -> bool {
        self.0.iter().any(|compound| compound.matches(node))
    }

    pub fn compounds(&self) -> &[CompoundSelector] {
        &self.0
    }
}

/// Selector-based element lookup.
pub struct QuerySelector;

impl QuerySelector {
    /// All elements matching `selector`, in document order.
    ///
    /// Unsupported selectors match nothing.
    pub fn select(doc: &Document, selector: &str) -> Vec<Rc<Node>> {
        match SelectorList::parse(selector) {
            Ok(list) => Self::select_parsed(doc, &list),
            Err(e) => {
                warn!(selector, error = %e, "Selector not supported, matching nothing");
                Vec::new()
            }
        }
    }

    /// All elements matching an already parsed list, in document order.
    pub fn select_parsed(doc: &Document, list: &SelectorList) -> Vec<Rc<Node>> {
        let mut matched = Vec::new();
        doc.traverse(|node| {
            if list.matches(node) {
                matched.push(node.clone());
            }
        });
        matched
    }
}

fn split_ident(input: &str) -> (&str, &str) {
    let end = input
        .find(|c: char| !(c.is_alphanumeric() || c == '-' || c == '_'))
        .unwrap_or(input.len());
    input.split_at(end)
}

fn unsupported(selector: &str) -> RustKitError {
    RustKitError::dom(format!("unsupported selector `{selector}`"))
}

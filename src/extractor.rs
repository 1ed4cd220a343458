//! Translation directive extraction from HTML template fragments
//!
//! Templates mark translatable content with an `i18n` (or `t`) attribute:
//!
//! ```html
//! <template>
//!   <h1 i18n="home.title">Welcome</h1>
//!   <input i18n="home.search[placeholder];home.search_hint[title]"
//!          placeholder="Search" title="Type to search">
//!   <p i18n="home.intro[html]">Read the <b>docs</b></p>
//! </template>
//! ```
//!
//! The attribute holds `;`-separated dotted keys, each with an optional `[modifier]` that
//! decides which part of the element supplies the source text. Extracting the fragment above
//! yields
//!
//! ```json
//! {
//!     "home": {
//!         "title": "Welcome",
//!         "search": "Search",
//!         "search_hint": "Type to search",
//!         "intro": "Read the <b>docs</b>"
//!     }
//! }
//! ```

use std::collections::BTreeSet;

use kuchiki::traits::*;
use kuchiki::{ElementData, NodeDataRef, NodeRef};
use regex::Regex;
use tracing::{debug, warn};

use crate::error::ExtractError;
use crate::fragments::Fragment;
use crate::tree::{KeyPathTree, SetOutcome};

pub const I18N_ATTRIBUTE: &str = "i18n";
pub const T_ATTRIBUTE: &str = "t";

const DIRECTIVE_SELECTOR: &str = "[i18n], [t]";

/// Which part of an element a directive captures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureTarget {
    /// Rendered text content. Used without a modifier and for `[text]`.
    Text,
    /// The `placeholder` attribute.
    Placeholder,
    /// The `title` attribute.
    Title,
    /// Inner markup, trimmed. Used by `[html]`, `[append]`, `[prepend]` and unknown modifiers.
    Markup(String),
}

impl CaptureTarget {
    fn from_modifier(modifier: &str) -> Self {
        match modifier {
            "text" => CaptureTarget::Text,
            "placeholder" => CaptureTarget::Placeholder,
            "title" => CaptureTarget::Title,
            other => CaptureTarget::Markup(other.to_string()),
        }
    }

    pub fn is_markup(&self) -> bool {
        matches!(self, CaptureTarget::Markup(_))
    }
}

/// One `key[modifier]` entry of a directive attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    pub key: String,
    pub target: CaptureTarget,
}

/// Keys pulled out of a single fragment.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub fragment: String,
    pub tree: KeyPathTree,
    /// Directives that produced a value.
    pub keys: usize,
    /// Directives that overwrote a key already set in this fragment.
    pub duplicates: usize,
    /// Keys whose value is inner markup rather than plain text.
    pub markup_keys: BTreeSet<String>,
}

pub struct DirectiveExtractor {
    modifier: Regex,
    placeholder: String,
}

impl DirectiveExtractor {
    /// `placeholder` is recorded for directives whose source attribute is missing, so the key
    /// still exists and gets picked up by the translation pass.
    pub fn new(placeholder: &str) -> Self {
        Self {
            modifier: Regex::new(r"\[([^\]]+)\]").expect("modifier pattern is valid"),
            placeholder: placeholder.to_string(),
        }
    }

    /// Split a directive attribute value into its directives.
    pub fn parse_directives(&self, attribute: &str) -> Vec<Directive> {
        attribute
            .split(';')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(|entry| match self.modifier.captures(entry) {
                Some(caps) => Directive {
                    key: self.modifier.replace(entry, "").trim().to_string(),
                    target: CaptureTarget::from_modifier(caps[1].trim()),
                },
                None => Directive {
                    key: entry.to_string(),
                    target: CaptureTarget::Text,
                },
            })
            .collect()
    }

    /// Extract every directive of one fragment into a fresh tree.
    pub fn extract(&self, fragment: &Fragment) -> Result<Extraction, ExtractError> {
        let document = kuchiki::parse_html().one(format!(
            "<html><body>{}</body></html>",
            fragment.markup
        ));
        materialize_template(&document, &fragment.id)?;

        let elements = document
            .select(DIRECTIVE_SELECTOR)
            .map_err(|()| ExtractError::Selector {
                fragment: fragment.id.clone(),
                selector: DIRECTIVE_SELECTOR.to_string(),
            })?;

        let mut extraction = Extraction {
            fragment: fragment.id.clone(),
            ..Default::default()
        };

        for element in elements {
            let Some(attribute) = directive_attribute(&element) else {
                continue;
            };
            for directive in self.parse_directives(&attribute) {
                let text = self.capture(&element, &directive, &fragment.id);
                match extraction.tree.set_path(&directive.key, text, false) {
                    Ok(outcome) => {
                        extraction.keys += 1;
                        if outcome == SetOutcome::Replaced {
                            extraction.duplicates += 1;
                        }
                        if directive.target.is_markup() {
                            extraction.markup_keys.insert(directive.key.clone());
                        } else {
                            extraction.markup_keys.remove(&directive.key);
                        }
                    }
                    Err(err) => {
                        warn!(fragment = %fragment.id, error = %err, "Skipping directive");
                    }
                }
            }
        }

        debug!(
            fragment = %fragment.id,
            keys = extraction.keys,
            "Extracted translation keys"
        );
        Ok(extraction)
    }

    fn capture(
        &self,
        element: &NodeDataRef<ElementData>,
        directive: &Directive,
        fragment: &str,
    ) -> String {
        let attribute = |name: &str| {
            let value = element.attributes.borrow().get(name).map(str::to_string);
            value.unwrap_or_else(|| {
                warn!(
                    fragment,
                    key = %directive.key,
                    "Element has no '{}' attribute, recording a placeholder",
                    name
                );
                self.placeholder.clone()
            })
        };

        match &directive.target {
            CaptureTarget::Text => element.as_node().text_contents(),
            CaptureTarget::Placeholder => attribute("placeholder"),
            CaptureTarget::Title => attribute("title"),
            CaptureTarget::Markup(_) => inner_markup(element.as_node()).trim().to_string(),
        }
    }
}

impl Default for DirectiveExtractor {
    fn default() -> Self {
        Self::new(crate::DEFAULT_PLACEHOLDER)
    }
}

/// Move the content of the first `<template>` into `<body>` so that directive queries see it
/// like regular markup.
fn materialize_template(document: &NodeRef, fragment: &str) -> Result<(), ExtractError> {
    let missing = || ExtractError::MissingTemplate(fragment.to_string());

    let template = document.select_first("template").map_err(|()| missing())?;
    let contents = template.template_contents.clone().ok_or_else(missing)?;
    let body = document.select_first("body").map_err(|()| missing())?;

    let children: Vec<NodeRef> = contents.children().collect();
    for child in children {
        body.as_node().append(child);
    }
    Ok(())
}

/// `t` wins over `i18n` when both are present and non-empty.
fn directive_attribute(element: &NodeDataRef<ElementData>) -> Option<String> {
    let attributes = element.attributes.borrow();
    [T_ATTRIBUTE, I18N_ATTRIBUTE]
        .into_iter()
        .filter_map(|name| attributes.get(name))
        .find(|value| !value.trim().is_empty())
        .map(str::to_string)
}

fn inner_markup(node: &NodeRef) -> String {
    node.children().map(|child| child.to_string()).collect()
}

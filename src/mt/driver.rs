//! Machine translation pass over a locale tree
//!
//! The driver walks a target-locale tree and asks the translator for every string leaf:
//!
//! - a regular string is translated as is,
//! - a placeholder is translated from the base-locale string at the same dotted key, and stays
//!   a placeholder when the base locale has nothing there.
//!
//! Keys captured as inner markup are sent through [`MachineTranslator::translate_markup`], every
//! other key as plain text. Requests run concurrently up to a cap. Results are written back one at a time by the task
//! that owns the tree, at exactly the dotted key they were requested for.

use std::collections::BTreeSet;

use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use crate::mt::translator::{MachineTranslator, TextFormat};
use crate::tree::{KeyPathTree, TreeNode};

/// One leaf that needs a translation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationRequest {
    pub key: String,
    pub source_text: String,
    pub format: TextFormat,
}

/// Counters for one translated tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TranslationStats {
    pub requested: usize,
    pub translated: usize,
    pub failed: usize,
    /// Placeholders left in place because the base locale had no text for them.
    pub unresolved: usize,
}

pub struct MachineTranslationDriver<'a> {
    translator: &'a dyn MachineTranslator,
    base_locale: String,
    placeholder: String,
    concurrency: usize,
    markup_keys: BTreeSet<String>,
}

impl<'a> MachineTranslationDriver<'a> {
    pub fn new(translator: &'a dyn MachineTranslator, base_locale: &str, placeholder: &str) -> Self {
        Self {
            translator,
            base_locale: base_locale.to_string(),
            placeholder: placeholder.to_string(),
            concurrency: crate::DEFAULT_CONCURRENCY,
            markup_keys: BTreeSet::new(),
        }
    }

    /// Dotted keys whose values are inner markup.
    pub fn with_markup_keys(mut self, keys: &BTreeSet<String>) -> Self {
        self.markup_keys = keys.clone();
        self
    }

    /// Maximum number of requests in flight. Zero is treated as one.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Decide which leaves of `target` need a request, and with which source text.
    ///
    /// Returns the requests and the number of placeholders that could not be resolved.
    pub fn plan(&self, target: &KeyPathTree, base: &KeyPathTree) -> (Vec<TranslationRequest>, usize) {
        let mut requests = Vec::new();
        let mut unresolved = 0;

        target.walk(|_, node, dotted| {
            let TreeNode::Leaf(value) = node else {
                return;
            };
            let format = if self.markup_keys.contains(dotted) {
                TextFormat::Html
            } else {
                TextFormat::Text
            };
            if *value != self.placeholder {
                requests.push(TranslationRequest {
                    key: dotted.to_string(),
                    source_text: value.clone(),
                    format,
                });
                return;
            }
            match base.get_path(dotted) {
                Ok(TreeNode::Leaf(base_text)) if *base_text != self.placeholder => {
                    requests.push(TranslationRequest {
                        key: dotted.to_string(),
                        source_text: base_text.clone(),
                        format,
                    });
                }
                _ => {
                    debug!(key = dotted, "No base text for placeholder, leaving it");
                    unresolved += 1;
                }
            }
        });

        (requests, unresolved)
    }

    /// Translate `target` in place from the base locale into `target_locale`.
    ///
    /// Returns once every request has settled. Failed requests keep the previous value.
    pub async fn translate_tree(
        &self,
        target_locale: &str,
        target: &mut KeyPathTree,
        base: &KeyPathTree,
    ) -> TranslationStats {
        let (requests, unresolved) = self.plan(target, base);
        let mut stats = TranslationStats {
            requested: requests.len(),
            unresolved,
            ..Default::default()
        };
        info!(
            locale = target_locale,
            requests = stats.requested,
            unresolved,
            provider = self.translator.provider_name(),
            "Translating locale tree"
        );

        let mut results = stream::iter(requests)
            .map(|request| async move {
                let (text, source) = (&request.source_text, &self.base_locale);
                let result = match request.format {
                    TextFormat::Text => self.translator.translate(text, source, target_locale).await,
                    TextFormat::Html => {
                        self.translator
                            .translate_markup(text, source, target_locale)
                            .await
                    }
                };
                (request, result)
            })
            .buffer_unordered(self.concurrency);

        // Only this loop touches `target`, so write-backs never interleave.
        while let Some((request, result)) = results.next().await {
            match result {
                Ok(translated) => match target.set_path(&request.key, translated, true) {
                    Ok(_) => stats.translated += 1,
                    Err(err) => {
                        warn!(key = %request.key, error = %err, "Cannot write translation back");
                        stats.failed += 1;
                    }
                },
                Err(err) => {
                    warn!(
                        locale = target_locale,
                        key = %request.key,
                        error = %err,
                        "Translation request failed"
                    );
                    stats.failed += 1;
                }
            }
        }

        info!(
            locale = target_locale,
            translated = stats.translated,
            failed = stats.failed,
            "Finished translating locale tree"
        );
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DEFAULT_PLACEHOLDER;
    use crate::mt::mock::{MockMode, MockTranslator};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::collections::HashSet;

    fn tree(value: serde_json::Value) -> KeyPathTree {
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn test_placeholder_translated_from_base() {
        let mock = MockTranslator::with_mappings("fr", [("Hello", "Bonjour")]);
        let driver = MachineTranslationDriver::new(&mock, "en", DEFAULT_PLACEHOLDER);
        let mut target = tree(json!({"greeting": DEFAULT_PLACEHOLDER}));
        let base = tree(json!({"greeting": "Hello"}));

        let stats = driver.translate_tree("fr", &mut target, &base).await;

        assert_eq!(target, tree(json!({"greeting": "Bonjour"})));
        assert_eq!(
            stats,
            TranslationStats {
                requested: 1,
                translated: 1,
                failed: 0,
                unresolved: 0
            }
        );
    }

    #[tokio::test]
    async fn test_string_leaves_translated_in_place() {
        let mock = MockTranslator::new(MockMode::Suffix);
        let driver = MachineTranslationDriver::new(&mock, "en", DEFAULT_PLACEHOLDER);
        let mut target = tree(json!({"home": {"title": "Welcome", "nav": {"back": "Back"}}}));

        driver
            .translate_tree("fr", &mut target, &KeyPathTree::new())
            .await;

        assert_eq!(
            target,
            tree(json!({"home": {"title": "Welcome_fr", "nav": {"back": "Back_fr"}}}))
        );
    }

    #[tokio::test]
    async fn test_placeholder_without_base_text_is_left() {
        let mock = MockTranslator::new(MockMode::Suffix);
        let driver = MachineTranslationDriver::new(&mock, "en", DEFAULT_PLACEHOLDER);
        let mut target = tree(json!({"a": DEFAULT_PLACEHOLDER, "b": DEFAULT_PLACEHOLDER}));
        // `b` is itself untranslated in the base locale.
        let base = tree(json!({"b": DEFAULT_PLACEHOLDER}));

        let stats = driver.translate_tree("fr", &mut target, &base).await;

        assert_eq!(
            target,
            tree(json!({"a": DEFAULT_PLACEHOLDER, "b": DEFAULT_PLACEHOLDER}))
        );
        assert_eq!(stats.requested, 0);
        assert_eq!(stats.unresolved, 2);
        assert!(mock.requests().is_empty());
    }

    #[tokio::test]
    async fn test_failure_does_not_block_siblings() {
        let mock = MockTranslator::new(MockMode::FailOn(HashSet::from(["Broken".to_string()])));
        let driver =
            MachineTranslationDriver::new(&mock, "en", DEFAULT_PLACEHOLDER).with_concurrency(2);
        let mut target = tree(json!({
            "ok1": "One",
            "bad": "Broken",
            "group": {"ok2": "Two", "ok3": DEFAULT_PLACEHOLDER}
        }));
        let base = tree(json!({"group": {"ok3": "Three"}}));

        let stats = driver.translate_tree("fr", &mut target, &base).await;

        assert_eq!(
            target,
            tree(json!({
                "ok1": "One_fr",
                "bad": "Broken",
                "group": {"ok2": "Two_fr", "ok3": "Three_fr"}
            }))
        );
        assert_eq!(stats.requested, 4);
        assert_eq!(stats.translated, 3);
        assert_eq!(stats.failed, 1);
    }

    #[tokio::test]
    async fn test_every_request_fails() {
        let mock = MockTranslator::new(MockMode::Error("down".to_string()));
        let driver = MachineTranslationDriver::new(&mock, "en", DEFAULT_PLACEHOLDER);
        let original = tree(json!({"a": "A", "b": DEFAULT_PLACEHOLDER}));
        let mut target = original.clone();

        let stats = driver
            .translate_tree("fr", &mut target, &tree(json!({"b": "B"})))
            .await;

        assert_eq!(target, original);
        assert_eq!(stats.failed, 2);
        assert_eq!(stats.translated, 0);
    }

    #[tokio::test]
    async fn test_concurrent_requests_all_written() {
        let mock = MockTranslator::with_delay(MockMode::Suffix, 5);
        let driver =
            MachineTranslationDriver::new(&mock, "en", DEFAULT_PLACEHOLDER).with_concurrency(8);
        let mut target = KeyPathTree::new();
        for i in 0..40 {
            target
                .set_path(&format!("section{}.item{}", i % 4, i), format!("text{}", i), false)
                .unwrap();
        }

        let stats = driver
            .translate_tree("de", &mut target, &KeyPathTree::new())
            .await;

        assert_eq!(stats.translated, 40);
        for i in 0..40 {
            assert_eq!(
                target.get_path(&format!("section{}.item{}", i % 4, i)),
                Ok(&TreeNode::Leaf(format!("text{}_de", i)))
            );
        }
    }

    #[test]
    fn test_plan_skips_branches() {
        let mock = MockTranslator::new(MockMode::Suffix);
        let driver = MachineTranslationDriver::new(&mock, "en", DEFAULT_PLACEHOLDER);
        let target = tree(json!({"group": {"leaf": "x"}}));
        let (requests, unresolved) = driver.plan(&target, &KeyPathTree::new());
        assert_eq!(
            requests,
            vec![TranslationRequest {
                key: "group.leaf".to_string(),
                source_text: "x".to_string(),
                format: TextFormat::Text,
            }]
        );
        assert_eq!(unresolved, 0);
    }

    #[tokio::test]
    async fn test_only_markup_keys_use_markup_translation() {
        let mock = MockTranslator::new(MockMode::Suffix);
        let markup_keys = BTreeSet::from(["intro".to_string()]);
        let driver = MachineTranslationDriver::new(&mock, "en", DEFAULT_PLACEHOLDER)
            .with_markup_keys(&markup_keys);
        let mut target = tree(json!({
            "legal": "Terms & Conditions",
            "intro": DEFAULT_PLACEHOLDER
        }));
        let base = tree(json!({"intro": "Read the <b>docs</b>"}));

        driver.translate_tree("fr", &mut target, &base).await;

        assert_eq!(mock.markup_requests(), vec!["Read the <b>docs</b>"]);
        assert_eq!(
            target,
            tree(json!({
                "legal": "Terms & Conditions_fr",
                "intro": "Read the <b>docs</b>_fr"
            }))
        );
    }

    #[test]
    fn test_zero_concurrency_clamped() {
        let mock = MockTranslator::new(MockMode::Suffix);
        let driver =
            MachineTranslationDriver::new(&mock, "en", DEFAULT_PLACEHOLDER).with_concurrency(0);
        assert_eq!(driver.concurrency, 1);
    }
}

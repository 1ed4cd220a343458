//! The extraction → reconciliation → translation run
//!
//! Each stage takes the trees it needs and returns the trees it produced:
//!
//! 1. [`Pipeline::extract`] parses every fragment in parallel and folds the per-fragment trees
//!    into one extracted tree on the calling thread.
//! 2. [`Pipeline::reconcile`] rebuilds the staging tree of every tracked locale, optionally
//!    syncing target key sets with the base locale, and persists them.
//! 3. [`Pipeline::translate`] machine-translates each target staging tree and publishes it,
//!    together with the untouched base tree, as the final trees of the store and every mirror.
//!
//! Only storage failures abort a run. Every tree a stage needs is read before the stage writes
//! anything, so a malformed locale file leaves the store as it was. Bad fragments and failed
//! translations are logged, counted in the [`RunReport`] and skipped.

use std::collections::BTreeSet;

use rayon::prelude::*;
use tracing::{error, info, warn};

use crate::builder::{SyncStats, TranslationTreeBuilder, sync_with_base};
use crate::config::Config;
use crate::error::HarvestResult;
use crate::extractor::{DirectiveExtractor, Extraction};
use crate::fragments::{FragmentSource, GlobFragmentSource};
use crate::mt::{MachineTranslationDriver, MachineTranslator};
use crate::report::RunReport;
use crate::storage::{LocaleStore, TreeKind};
use crate::tree::KeyPathTree;

/// Keys harvested from every fragment of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedKeys {
    pub tree: KeyPathTree,
    /// Dotted keys whose values are inner markup.
    pub markup_keys: BTreeSet<String>,
}

/// Staging trees of every tracked locale.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocaleTrees {
    pub base: KeyPathTree,
    pub targets: Vec<(String, KeyPathTree)>,
    /// Dotted keys translated as markup.
    pub markup_keys: BTreeSet<String>,
}

pub struct Pipeline<'a> {
    config: &'a Config,
    store: &'a dyn LocaleStore,
    mirrors: Vec<&'a dyn LocaleStore>,
    extractor: DirectiveExtractor,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a Config, store: &'a dyn LocaleStore) -> Self {
        Self {
            config,
            store,
            mirrors: Vec::new(),
            extractor: DirectiveExtractor::new(&config.placeholder),
        }
    }

    /// Stores that receive a copy of every published final tree.
    pub fn with_mirrors(mut self, mirrors: Vec<&'a dyn LocaleStore>) -> Self {
        self.mirrors = mirrors;
        self
    }

    /// The fragment files named by the configured glob patterns.
    pub fn fragment_source(&self) -> HarvestResult<GlobFragmentSource> {
        Ok(GlobFragmentSource::new(&self.config.fragments)?)
    }

    /// Extract all fragments and fold them into a single tree.
    pub fn extract(&self, source: &dyn FragmentSource) -> (ExtractedKeys, RunReport) {
        let (fragments, load_errors) = source.fragments();
        let mut report = RunReport {
            fragments: fragments.len(),
            failed_fragments: load_errors.len(),
            ..Default::default()
        };
        for err in &load_errors {
            error!(error = %err, "Skipping fragment");
        }

        let extractor = &self.extractor;
        let results: Vec<_> = fragments
            .par_iter()
            .map(|fragment| extractor.extract(fragment))
            .collect();

        let mut extracted = ExtractedKeys::default();
        for result in results {
            match result {
                Ok(Extraction {
                    tree,
                    keys,
                    duplicates,
                    markup_keys,
                    ..
                }) => {
                    report.extracted_keys += keys;
                    report.duplicate_keys += duplicates + extracted.tree.absorb(&tree);
                    // The fragment that wrote a key last decides how it is translated.
                    for (key, _) in tree.leaves() {
                        if markup_keys.contains(&key) {
                            extracted.markup_keys.insert(key);
                        } else {
                            extracted.markup_keys.remove(&key);
                        }
                    }
                }
                Err(err) => {
                    error!(error = %err, "Skipping fragment");
                    report.fragments -= 1;
                    report.failed_fragments += 1;
                }
            }
        }

        info!(
            fragments = report.fragments,
            keys = extracted.tree.leaf_count(),
            duplicates = report.duplicate_keys,
            "Extraction finished"
        );
        (extracted, report)
    }

    /// Rebuild the staging tree of every tracked locale and persist them all.
    ///
    /// Nothing is written unless every locale could be read.
    pub fn reconcile(&self, extracted: &ExtractedKeys) -> HarvestResult<(LocaleTrees, RunReport)> {
        let builder = TranslationTreeBuilder::new(self.store);
        let mut report = RunReport::default();

        let base = builder.prepare(&self.config.base_locale, &extracted.tree)?;
        let mut targets = Vec::with_capacity(self.config.target_locales.len());
        for locale in &self.config.target_locales {
            let mut tree = builder.prepare(locale, &extracted.tree)?;
            if self.config.sync.enabled {
                report.add_sync(&self.sync_target(locale, &mut tree, &base));
            }
            targets.push((locale.clone(), tree));
        }

        let trees = LocaleTrees {
            base,
            targets,
            markup_keys: extracted.markup_keys.clone(),
        };
        report.trees_written += self.write_staging(&trees)?;
        Ok((trees, report))
    }

    /// Read the persisted staging trees without extracting anything.
    ///
    /// The returned trees carry no markup keys, so every key is translated as plain text unless
    /// the caller fills [`LocaleTrees::markup_keys`] in.
    pub fn load_staging(&self) -> HarvestResult<LocaleTrees> {
        let base = self.store.read(&self.config.base_locale, TreeKind::Staging)?;
        let targets = self
            .config
            .target_locales
            .iter()
            .map(|locale| Ok((locale.clone(), self.store.read(locale, TreeKind::Staging)?)))
            .collect::<HarvestResult<Vec<_>>>()?;
        Ok(LocaleTrees {
            base,
            targets,
            markup_keys: BTreeSet::new(),
        })
    }

    /// Align every persisted target staging tree with the base staging tree.
    pub fn sync(&self) -> HarvestResult<RunReport> {
        let mut trees = self.load_staging()?;
        let mut report = RunReport::default();
        for (locale, tree) in &mut trees.targets {
            report.add_sync(&self.sync_target(locale, tree, &trees.base));
        }
        for (locale, tree) in &trees.targets {
            self.store.write(locale, TreeKind::Staging, tree)?;
            report.trees_written += 1;
        }
        Ok(report)
    }

    fn sync_target(&self, locale: &str, tree: &mut KeyPathTree, base: &KeyPathTree) -> SyncStats {
        let stats = sync_with_base(tree, base, &self.config.placeholder, self.config.sync.prune);
        info!(
            locale,
            added = stats.added,
            pruned = stats.pruned,
            "Synced key set with base locale"
        );
        stats
    }

    fn write_staging(&self, trees: &LocaleTrees) -> HarvestResult<usize> {
        let locales = std::iter::once((&self.config.base_locale, &trees.base))
            .chain(trees.targets.iter().map(|(locale, tree)| (locale, tree)));
        let mut written = 0;
        for (locale, tree) in locales {
            self.store.write(locale, TreeKind::Staging, tree)?;
            info!(locale = %locale, keys = tree.leaf_count(), "Rebuilt staging tree");
            written += 1;
        }
        Ok(written)
    }

    /// Translate every target tree, then publish all final trees.
    pub async fn translate(
        &self,
        translator: &dyn MachineTranslator,
        trees: LocaleTrees,
    ) -> HarvestResult<RunReport> {
        let mut report = RunReport::default();
        let driver =
            MachineTranslationDriver::new(translator, &self.config.base_locale, &self.config.placeholder)
                .with_concurrency(self.config.concurrency)
                .with_markup_keys(&trees.markup_keys);

        let mut translated = Vec::with_capacity(trees.targets.len());
        for (locale, mut tree) in trees.targets {
            let stats = driver.translate_tree(&locale, &mut tree, &trees.base).await;
            if stats.failed > 0 {
                warn!(
                    locale = %locale,
                    failed = stats.failed,
                    "Some keys keep their previous value"
                );
            }
            report.add_translation(&stats);
            translated.push((locale, tree));
        }

        // The base locale is published as extracted.
        report.trees_written += self.publish(&self.config.base_locale, &trees.base)?;
        for (locale, tree) in &translated {
            report.trees_written += self.publish(locale, tree)?;
        }

        Ok(report)
    }

    /// Extract, reconcile and translate in one go.
    pub async fn run(
        &self,
        source: &dyn FragmentSource,
        translator: &dyn MachineTranslator,
    ) -> HarvestResult<RunReport> {
        let (extracted, mut report) = self.extract(source);
        let (trees, reconciled) = self.reconcile(&extracted)?;
        report.merge(&reconciled);
        let translated = self.translate(translator, trees).await?;
        report.merge(&translated);
        Ok(report)
    }

    /// Write a final tree to the store and every mirror. Returns the number of trees written.
    fn publish(&self, locale: &str, tree: &KeyPathTree) -> HarvestResult<usize> {
        let mut written = 0;
        for store in std::iter::once(self.store).chain(self.mirrors.iter().copied()) {
            store.write(locale, TreeKind::Final, tree)?;
            info!(locale, store = %store.describe(), "Published final tree");
            written += 1;
        }
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DEFAULT_PLACEHOLDER;
    use crate::fragments::Fragment;
    use crate::mt::{MockMode, MockTranslator};
    use crate::error::StorageError;
    use crate::storage::{FsLocaleStore, MemoryLocaleStore};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::collections::HashSet;

    fn tree(value: serde_json::Value) -> KeyPathTree {
        serde_json::from_value(value).unwrap()
    }

    fn keys(value: serde_json::Value) -> ExtractedKeys {
        ExtractedKeys {
            tree: tree(value),
            ..Default::default()
        }
    }

    fn fragments() -> Vec<Fragment> {
        vec![
            Fragment::new(
                "home.html",
                r#"<template>
                    <h1 i18n="home.title">Welcome</h1>
                    <input i18n="home.search[placeholder]" placeholder="Search">
                </template>"#,
            ),
            Fragment::new(
                "nav.html",
                r#"<template><a t="nav.back" href="/">Back</a></template>"#,
            ),
            Fragment::new("broken.html", "<div i18n=\"lost\">No template</div>"),
        ]
    }

    #[test]
    fn test_extract_accumulates_and_counts() {
        let config = Config::default();
        let store = MemoryLocaleStore::new();
        let pipeline = Pipeline::new(&config, &store);

        let (extracted, report) = pipeline.extract(&fragments());

        assert_eq!(
            extracted.tree,
            tree(json!({
                "home": {"title": "Welcome", "search": "Search"},
                "nav": {"back": "Back"}
            }))
        );
        assert_eq!(report.fragments, 2);
        assert_eq!(report.failed_fragments, 1);
        assert_eq!(report.extracted_keys, 3);
        assert_eq!(report.duplicate_keys, 0);
    }

    #[test]
    fn test_duplicates_across_fragments_are_counted() {
        let config = Config::default();
        let store = MemoryLocaleStore::new();
        let pipeline = Pipeline::new(&config, &store);
        let source = vec![
            Fragment::new("a.html", r#"<template><p i18n="shared">A</p></template>"#),
            Fragment::new("b.html", r#"<template><p i18n="shared">B</p></template>"#),
        ];

        let (extracted, report) = pipeline.extract(&source);

        assert_eq!(extracted.tree, tree(json!({"shared": "B"})));
        assert_eq!(report.duplicate_keys, 1);
    }

    #[test]
    fn test_markup_keys_follow_the_last_fragment() {
        let config = Config::default();
        let store = MemoryLocaleStore::new();
        let pipeline = Pipeline::new(&config, &store);
        let source = vec![
            Fragment::new("a.html", r#"<template><p i18n="k[html]"><b>A</b></p></template>"#),
            Fragment::new("b.html", r#"<template><p i18n="k">B</p></template>"#),
            Fragment::new("c.html", r#"<template><p i18n="doc[html]">See <a>x</a></p></template>"#),
        ];

        let (extracted, _) = pipeline.extract(&source);

        assert_eq!(extracted.markup_keys, BTreeSet::from(["doc".to_string()]));
    }

    #[test]
    fn test_bad_fragment_pattern_is_a_config_error() {
        let config = Config {
            fragments: vec!["src/[".to_string()],
            ..Config::default()
        };
        let store = MemoryLocaleStore::new();
        let pipeline = Pipeline::new(&config, &store);

        assert!(matches!(
            pipeline.fragment_source(),
            Err(crate::error::HarvestError::Config(_))
        ));
    }

    #[test]
    fn test_reconcile_persists_staging_per_locale() {
        let config = Config::default();
        let store = MemoryLocaleStore::new()
            .with_tree("fr", TreeKind::Final, tree(json!({"old": "Ancien"})));
        let pipeline = Pipeline::new(&config, &store);

        let (trees, report) = pipeline
            .reconcile(&keys(json!({"greeting": "Hello"})))
            .unwrap();

        assert_eq!(trees.base, tree(json!({"greeting": "Hello"})));
        assert_eq!(
            trees.targets,
            vec![(
                "fr".to_string(),
                tree(json!({"old": "Ancien", "greeting": "Hello"}))
            )]
        );
        assert_eq!(report.trees_written, 2);
        assert_eq!(
            store.read("fr", TreeKind::Staging).unwrap(),
            trees.targets[0].1
        );
    }

    #[test]
    fn test_reconcile_with_sync_adds_placeholders() {
        let config = Config {
            sync: crate::config::SyncConfig {
                enabled: true,
                prune: true,
            },
            ..Config::default()
        };
        let store = MemoryLocaleStore::new()
            .with_tree("en", TreeKind::Final, tree(json!({"bye": "Goodbye"})))
            .with_tree("fr", TreeKind::Final, tree(json!({"stale": "Périmé"})));
        let pipeline = Pipeline::new(&config, &store);

        let (trees, report) = pipeline.reconcile(&ExtractedKeys::default()).unwrap();

        assert_eq!(
            trees.targets[0].1,
            tree(json!({"bye": DEFAULT_PLACEHOLDER}))
        );
        assert_eq!(report.synced_keys, 1);
        assert_eq!(report.pruned_keys, 1);
        assert_eq!(report.trees_written, 2);
        assert_eq!(store.read("fr", TreeKind::Staging).unwrap(), trees.targets[0].1);
    }

    #[test]
    fn test_malformed_locale_file_aborts_before_any_write() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            locales_dir: dir.path().to_path_buf(),
            target_locales: vec!["de".to_string(), "fr".to_string()],
            ..Config::default()
        };
        let store = config.locale_store();
        store
            .write("en", TreeKind::Staging, &tree(json!({"old": "Old"})))
            .unwrap();
        let en_staging = store.path_for("en", TreeKind::Staging);
        let before = std::fs::read_to_string(&en_staging).unwrap();
        let fr_final = store.path_for("fr", TreeKind::Final);
        std::fs::create_dir_all(fr_final.parent().unwrap()).unwrap();
        std::fs::write(&fr_final, "{ broken").unwrap();
        let pipeline = Pipeline::new(&config, &store);

        let result = pipeline.reconcile(&keys(json!({"greeting": "Hello"})));

        assert!(matches!(
            result,
            Err(crate::error::HarvestError::Storage(StorageError::Malformed { .. }))
        ));
        assert_eq!(std::fs::read_to_string(&en_staging).unwrap(), before);
        assert!(!store.path_for("de", TreeKind::Staging).exists());
        assert!(!store.path_for("fr", TreeKind::Staging).exists());
    }

    #[tokio::test]
    async fn test_translate_publishes_to_store_and_mirrors() {
        let config = Config::default();
        let store = MemoryLocaleStore::new();
        let mirror = MemoryLocaleStore::new();
        let pipeline = Pipeline::new(&config, &store).with_mirrors(vec![&mirror as &dyn LocaleStore]);
        let mock = MockTranslator::with_mappings("fr", [("Hello", "Bonjour")]);
        let trees = LocaleTrees {
            base: tree(json!({"greeting": "Hello"})),
            targets: vec![(
                "fr".to_string(),
                tree(json!({"greeting": DEFAULT_PLACEHOLDER})),
            )],
            ..Default::default()
        };

        let report = pipeline.translate(&mock, trees).await.unwrap();

        let expected_fr = tree(json!({"greeting": "Bonjour"}));
        assert_eq!(store.read("fr", TreeKind::Final).unwrap(), expected_fr);
        assert_eq!(mirror.read("fr", TreeKind::Final).unwrap(), expected_fr);
        assert_eq!(
            mirror.read("en", TreeKind::Final).unwrap(),
            tree(json!({"greeting": "Hello"}))
        );
        assert_eq!(report.trees_written, 4);
        assert_eq!(report.translated, 1);
    }

    #[tokio::test]
    async fn test_full_run_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            locales_dir: dir.path().join("locales"),
            output_dirs: vec![dir.path().join("dist")],
            target_locales: vec!["fr".to_string(), "de".to_string()],
            ..Config::default()
        };
        let store = config.locale_store();
        let mirrors = config.mirror_stores();
        // A previous run left a finished French translation.
        store
            .write("fr", TreeKind::Final, &tree(json!({"nav": {"back": "Retour"}})))
            .unwrap();

        let pipeline = Pipeline::new(&config, &store)
            .with_mirrors(mirrors.iter().map(|m| m as &dyn LocaleStore).collect());
        let mock = MockTranslator::new(MockMode::FailOn(HashSet::from(["Search".to_string()])));

        let report = pipeline.run(&fragments(), &mock).await.unwrap();

        let dist = FsLocaleStore::new(dir.path().join("dist"));
        assert_eq!(
            dist.read("fr", TreeKind::Final).unwrap(),
            tree(json!({
                "nav": {"back": "Back_fr"},
                "home": {"title": "Welcome_fr", "search": "Search"}
            }))
        );
        assert_eq!(
            store.read("de", TreeKind::Final).unwrap(),
            tree(json!({
                "home": {"title": "Welcome_de", "search": "Search"},
                "nav": {"back": "Back_de"}
            }))
        );
        assert_eq!(
            store.read("en", TreeKind::Final).unwrap(),
            store.read("en", TreeKind::Staging).unwrap()
        );
        assert_eq!(report.failed_fragments, 1);
        assert_eq!(report.failed_translations, 2);
        assert_eq!(report.translated, 4);
        // 3 staging trees, then 3 final trees into two stores each.
        assert_eq!(report.trees_written, 9);

        let raw = std::fs::read_to_string(dir.path().join("locales/en/translation.json")).unwrap();
        assert!(raw.starts_with("{\n\t\"home\": {\n\t\t\"title\": \"Welcome\""));
    }

    #[tokio::test]
    async fn test_plain_text_with_ampersand_is_not_sent_as_markup() {
        let config = Config::default();
        let store = MemoryLocaleStore::new();
        let pipeline = Pipeline::new(&config, &store);
        let mock = MockTranslator::new(MockMode::Suffix);
        let source = vec![Fragment::new(
            "legal.html",
            r#"<template>
                <span i18n="legal">Terms &amp; Conditions</span>
                <p i18n="intro[html]">Read the <b>docs</b></p>
            </template>"#,
        )];

        pipeline.run(&source, &mock).await.unwrap();

        assert_eq!(mock.markup_requests(), vec!["Read the <b>docs</b>"]);
        assert_eq!(
            store.read("fr", TreeKind::Final).unwrap(),
            tree(json!({
                "legal": "Terms & Conditions_fr",
                "intro": "Read the <b>docs</b>_fr"
            }))
        );
    }

    #[tokio::test]
    async fn test_translate_from_persisted_staging() {
        let config = Config::default();
        let store = MemoryLocaleStore::new()
            .with_tree("en", TreeKind::Staging, tree(json!({"a": "Yes", "b": "No"})))
            .with_tree(
                "fr",
                TreeKind::Staging,
                tree(json!({"a": DEFAULT_PLACEHOLDER, "c": DEFAULT_PLACEHOLDER})),
            );
        let pipeline = Pipeline::new(&config, &store);
        let mock = MockTranslator::new(MockMode::Suffix);

        let trees = pipeline.load_staging().unwrap();
        let report = pipeline.translate(&mock, trees).await.unwrap();

        assert_eq!(
            store.read("fr", TreeKind::Final).unwrap(),
            tree(json!({"a": "Yes_fr", "c": DEFAULT_PLACEHOLDER}))
        );
        assert_eq!(report.unresolved_placeholders, 1);
    }

    #[test]
    fn test_sync_command_rewrites_targets() {
        let config = Config::default();
        let store = MemoryLocaleStore::new()
            .with_tree("en", TreeKind::Staging, tree(json!({"a": "A", "b": "B"})))
            .with_tree("fr", TreeKind::Staging, tree(json!({"a": "Le A"})));
        let pipeline = Pipeline::new(&config, &store);

        let report = pipeline.sync().unwrap();

        assert_eq!(report.synced_keys, 1);
        assert_eq!(
            store.read("fr", TreeKind::Staging).unwrap(),
            tree(json!({"a": "Le A", "b": DEFAULT_PLACEHOLDER}))
        );
    }
}

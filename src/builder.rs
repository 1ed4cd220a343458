//! Reconciling freshly extracted keys with the trees already on disk
//!
//! The new staging tree of a locale is
//!
//! ```text
//! deep_merge(existing staging, existing final, extracted keys)
//! ```
//!
//! so a finished translation replaces a stale placeholder, and newly extracted source text
//! replaces both because it has to be processed again. Keys nobody touched are kept.

use tracing::{debug, info};

use crate::error::StorageError;
use crate::storage::{LocaleStore, TreeKind};
use crate::tree::{KeyPathTree, TreeNode, deep_merge};

/// Compute a new staging tree. Precedence, highest first: `extracted`, `existing_final`,
/// `existing_staging`.
pub fn reconcile(
    existing_staging: KeyPathTree,
    existing_final: &KeyPathTree,
    extracted: &KeyPathTree,
) -> KeyPathTree {
    deep_merge(existing_staging, &[Some(existing_final), Some(extracted)])
}

/// Rebuilds the staging tree of each tracked locale from the store.
pub struct TranslationTreeBuilder<'a> {
    store: &'a dyn LocaleStore,
}

impl<'a> TranslationTreeBuilder<'a> {
    pub fn new(store: &'a dyn LocaleStore) -> Self {
        Self { store }
    }

    /// Reconcile `extracted` into the trees persisted for `locale` and persist the result as the
    /// new staging tree.
    pub fn rebuild(
        &self,
        locale: &str,
        extracted: &KeyPathTree,
    ) -> Result<KeyPathTree, StorageError> {
        let rebuilt = self.prepare(locale, extracted)?;
        self.store.write(locale, TreeKind::Staging, &rebuilt)?;
        info!(locale, keys = rebuilt.leaf_count(), "Rebuilt staging tree");
        Ok(rebuilt)
    }

    /// Like [`rebuild`](Self::rebuild), without writing anything back.
    pub fn prepare(
        &self,
        locale: &str,
        extracted: &KeyPathTree,
    ) -> Result<KeyPathTree, StorageError> {
        let staging = self.store.read(locale, TreeKind::Staging)?;
        let existing_final = self.store.read(locale, TreeKind::Final)?;
        debug!(
            locale,
            staging = staging.leaf_count(),
            finalized = existing_final.leaf_count(),
            extracted = extracted.leaf_count(),
            "Reconciling locale trees"
        );

        Ok(reconcile(staging, &existing_final, extracted))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    /// Base keys added to the target as placeholders.
    pub added: usize,
    /// Target keys removed because the base no longer has them.
    pub pruned: usize,
}

/// Give `target` the key set of `base`.
///
/// Every base leaf missing from `target` is added with `placeholder`. With `prune`, target
/// leaves whose key is not a leaf in `base` are removed.
pub fn sync_with_base(
    target: &mut KeyPathTree,
    base: &KeyPathTree,
    placeholder: &str,
    prune: bool,
) -> SyncStats {
    let mut stats = SyncStats::default();

    for (key, _) in base.leaves() {
        if matches!(target.get_path(&key), Ok(TreeNode::Leaf(_))) {
            continue;
        }
        if target.set_path(&key, placeholder, false).is_ok() {
            stats.added += 1;
        }
    }

    if prune {
        let stale: Vec<String> = target
            .leaves()
            .into_iter()
            .map(|(key, _)| key)
            .filter(|key| !matches!(base.get_path(key), Ok(TreeNode::Leaf(_))))
            .collect();
        for key in stale {
            if target.remove_path(&key).is_ok() {
                stats.pruned += 1;
            }
        }
    }

    stats
}

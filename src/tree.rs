//! Nested locale trees addressed by dotted keys
//!
//! A [`KeyPathTree`] is the in-memory form of a locale file such as
//!
//! ```json
//! {
//!     "home": { "title": "Welcome", "cta": "Sign up" },
//!     "footer": "Goodbye"
//! }
//! ```
//!
//! where `home.title` is the dotted key of `"Welcome"`. Entry order is preserved so that
//! rewritten files keep the layout a human gave them.
//!
//! # Example
//!
//! ```
//! use i18n_harvest::tree::{KeyPathTree, TreeNode};
//!
//! let mut tree = KeyPathTree::new();
//! tree.set_path("home.title", "Welcome", false).unwrap();
//! assert_eq!(
//!     tree.get_path("home.title"),
//!     Ok(&TreeNode::Leaf("Welcome".to_string()))
//! );
//! ```

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::TreeError;

/// A single entry in a [`KeyPathTree`]: either translated text or a nested tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TreeNode {
    Leaf(String),
    Branch(KeyPathTree),
}

impl TreeNode {
    pub fn is_branch(&self) -> bool {
        matches!(self, TreeNode::Branch(_))
    }
}

/// What [`KeyPathTree::set_path`] did at the terminal segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOutcome {
    Inserted,
    /// A value already existed and was overwritten (last write wins).
    Replaced,
}

/// Ordered mapping from key segment to [`TreeNode`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyPathTree(IndexMap<String, TreeNode>);

/// Split a dotted key into its segments, rejecting empty segments.
pub fn split_key(key: &str) -> Result<Vec<&str>, TreeError> {
    let segments: Vec<&str> = key.split('.').collect();
    if segments.iter().any(|segment| segment.is_empty()) {
        return Err(TreeError::InvalidKey(key.to_string()));
    }
    Ok(segments)
}

fn join_key(prefix: &str, segment: &str) -> String {
    if prefix.is_empty() {
        segment.to_string()
    } else {
        format!("{}.{}", prefix, segment)
    }
}

impl KeyPathTree {
    pub fn new() -> Self {
        KeyPathTree(IndexMap::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of direct children.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, segment: &str) -> Option<&TreeNode> {
        self.0.get(segment)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &TreeNode)> {
        self.0.iter()
    }

    /// Insert `value` at `key`, creating intermediate branches on demand.
    ///
    /// An existing leaf at the terminal segment is overwritten. Unless `silent` is set the
    /// overwrite is reported as a duplicate key. Turning a branch into a leaf, or a leaf into a
    /// branch, is always reported because it discards a whole subtree or value.
    pub fn set_path(
        &mut self,
        key: &str,
        value: impl Into<String>,
        silent: bool,
    ) -> Result<SetOutcome, TreeError> {
        let segments = split_key(key)?;
        Ok(self.set_segments(&segments, key, value.into(), silent))
    }

    fn set_segments(
        &mut self,
        segments: &[&str],
        full_key: &str,
        value: String,
        silent: bool,
    ) -> SetOutcome {
        let (head, rest) = match segments.split_first() {
            Some(parts) => parts,
            None => return SetOutcome::Inserted,
        };

        if rest.is_empty() {
            return match self.0.insert(head.to_string(), TreeNode::Leaf(value)) {
                None => SetOutcome::Inserted,
                Some(TreeNode::Branch(_)) => {
                    warn!(key = full_key, "Translation key replaces a nested group. Last in wins.");
                    SetOutcome::Replaced
                }
                Some(TreeNode::Leaf(_)) => {
                    if !silent {
                        warn!("Duplicate translation key ({}) found. Last in wins.", full_key);
                    }
                    SetOutcome::Replaced
                }
            };
        }

        let slot = self
            .0
            .entry(head.to_string())
            .or_insert_with(|| TreeNode::Branch(KeyPathTree::new()));
        if !slot.is_branch() {
            warn!(
                key = full_key,
                segment = *head,
                "Translation key nests under an existing string. Last in wins."
            );
            *slot = TreeNode::Branch(KeyPathTree::new());
        }
        match slot {
            TreeNode::Branch(child) => child.set_segments(rest, full_key, value, silent),
            TreeNode::Leaf(_) => unreachable!("slot was converted to a branch above"),
        }
    }

    /// Look up the node at `key`.
    pub fn get_path(&self, key: &str) -> Result<&TreeNode, TreeError> {
        let segments = split_key(key)?;
        let not_found = || TreeError::KeyNotFound(key.to_string());

        let (last, parents) = segments.split_last().ok_or_else(not_found)?;
        let mut tree = self;
        for segment in parents {
            match tree.0.get(*segment) {
                Some(TreeNode::Branch(child)) => tree = child,
                _ => return Err(not_found()),
            }
        }
        tree.0.get(*last).ok_or_else(not_found)
    }

    /// Remove the node at `key`, returning it. Branches left empty are removed as well.
    pub fn remove_path(&mut self, key: &str) -> Result<TreeNode, TreeError> {
        let segments = split_key(key)?;
        self.remove_segments(&segments)
            .ok_or_else(|| TreeError::KeyNotFound(key.to_string()))
    }

    fn remove_segments(&mut self, segments: &[&str]) -> Option<TreeNode> {
        let (head, rest) = segments.split_first()?;
        if rest.is_empty() {
            return self.0.shift_remove(*head);
        }
        let removed = match self.0.get_mut(*head) {
            Some(TreeNode::Branch(child)) => child.remove_segments(rest)?,
            _ => return None,
        };
        if matches!(self.0.get(*head), Some(TreeNode::Branch(child)) if child.is_empty()) {
            self.0.shift_remove(*head);
        }
        Some(removed)
    }

    /// Merge `overlay` into `self`. Branches present on both sides merge recursively; any other
    /// overlay value replaces what `self` holds.
    pub fn merge_from(&mut self, overlay: &KeyPathTree) {
        for (key, value) in &overlay.0 {
            match (self.0.get_mut(key), value) {
                (Some(TreeNode::Branch(existing)), TreeNode::Branch(incoming)) => {
                    existing.merge_from(incoming);
                }
                _ => {
                    self.0.insert(key.clone(), value.clone());
                }
            }
        }
    }

    /// Depth-first pre-order traversal. `visit` receives the local key, the node and the full
    /// dotted key of every entry, branches included.
    pub fn walk<F>(&self, mut visit: F)
    where
        F: FnMut(&str, &TreeNode, &str),
    {
        self.walk_from("", &mut visit);
    }

    fn walk_from<F>(&self, prefix: &str, visit: &mut F)
    where
        F: FnMut(&str, &TreeNode, &str),
    {
        for (key, node) in &self.0 {
            let dotted = join_key(prefix, key);
            visit(key, node, &dotted);
            if let TreeNode::Branch(child) = node {
                child.walk_from(&dotted, visit);
            }
        }
    }

    /// All string leaves as `(dotted_key, text)` pairs in traversal order.
    pub fn leaves(&self) -> Vec<(String, String)> {
        let mut leaves = Vec::new();
        self.walk(|_, node, dotted| {
            if let TreeNode::Leaf(text) = node {
                leaves.push((dotted.to_string(), text.clone()));
            }
        });
        leaves
    }

    pub fn leaf_count(&self) -> usize {
        self.0
            .values()
            .map(|node| match node {
                TreeNode::Leaf(_) => 1,
                TreeNode::Branch(child) => child.leaf_count(),
            })
            .sum()
    }

    /// Copy every leaf of `other` into `self` through non-silent [`set_path`](Self::set_path).
    ///
    /// Returns how many leaves overwrote an existing value.
    pub fn absorb(&mut self, other: &KeyPathTree) -> usize {
        let mut duplicates = 0;
        for (key, text) in other.leaves() {
            match self.set_path(&key, text, false) {
                Ok(SetOutcome::Replaced) => duplicates += 1,
                Ok(SetOutcome::Inserted) => {}
                Err(err) => warn!(error = %err, "Skipping unaddressable key"),
            }
        }
        duplicates
    }
}

/// Apply `overlays` onto `base` from left to right and return the result.
///
/// `None` overlays are skipped. Later overlays win over earlier ones and over `base`.
pub fn deep_merge(mut base: KeyPathTree, overlays: &[Option<&KeyPathTree>]) -> KeyPathTree {
    for overlay in overlays.iter().flatten() {
        base.merge_from(overlay);
    }
    base
}

impl FromIterator<(String, TreeNode)> for KeyPathTree {
    fn from_iter<I: IntoIterator<Item = (String, TreeNode)>>(iter: I) -> Self {
        KeyPathTree(iter.into_iter().collect())
    }
}

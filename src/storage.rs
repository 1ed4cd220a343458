//! Persisted locale trees
//!
//! Every locale owns two trees: a *staging* tree that accumulates freshly extracted keys and a
//! *final* tree consumed by the running application. A [`LocaleStore`] reads and writes them as
//! tab-indented JSON so the files stay easy to review and diff.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::PathBuf;
use std::sync::Mutex;

use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::StorageError;
use crate::tree::KeyPathTree;

pub const DEFAULT_STAGING_FILE: &str = "toTranslate_translation.json";
pub const DEFAULT_FINAL_FILE: &str = "translation.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TreeKind {
    Staging,
    Final,
}

impl fmt::Display for TreeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TreeKind::Staging => write!(f, "staging"),
            TreeKind::Final => write!(f, "final"),
        }
    }
}

/// Storage surface for locale trees, addressed by locale code and tree kind.
pub trait LocaleStore: Send + Sync {
    /// Read a tree. A tree that was never written reads as empty.
    fn read(&self, locale: &str, kind: TreeKind) -> Result<KeyPathTree, StorageError>;

    /// Replace a tree as a whole.
    fn write(&self, locale: &str, kind: TreeKind, tree: &KeyPathTree) -> Result<(), StorageError>;

    /// Human readable location, used in logs.
    fn describe(&self) -> String;
}

/// Serialize a tree the way locale files are stored: pretty-printed with tabs.
pub fn to_tab_json(tree: &KeyPathTree) -> Result<Vec<u8>, serde_json::Error> {
    let mut buffer = Vec::new();
    let formatter = PrettyFormatter::with_indent(b"\t");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
    tree.serialize(&mut serializer)?;
    Ok(buffer)
}

/// Locale files on disk, laid out as `<root>/<locale>/<file>`.
#[derive(Debug, Clone)]
pub struct FsLocaleStore {
    root: PathBuf,
    staging_file: String,
    final_file: String,
}

impl FsLocaleStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            staging_file: DEFAULT_STAGING_FILE.to_string(),
            final_file: DEFAULT_FINAL_FILE.to_string(),
        }
    }

    pub fn with_file_names(mut self, staging_file: &str, final_file: &str) -> Self {
        self.staging_file = staging_file.to_string();
        self.final_file = final_file.to_string();
        self
    }

    pub fn path_for(&self, locale: &str, kind: TreeKind) -> PathBuf {
        let file = match kind {
            TreeKind::Staging => &self.staging_file,
            TreeKind::Final => &self.final_file,
        };
        self.root.join(locale).join(file)
    }
}

impl LocaleStore for FsLocaleStore {
    fn read(&self, locale: &str, kind: TreeKind) -> Result<KeyPathTree, StorageError> {
        let path = self.path_for(locale, kind);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "No {} tree yet, starting empty", kind);
                return Ok(KeyPathTree::new());
            }
            Err(source) => return Err(StorageError::Read { path, source }),
        };

        if content.trim().is_empty() {
            return Ok(KeyPathTree::new());
        }
        serde_json::from_str(&content).map_err(|source| StorageError::Malformed { path, source })
    }

    fn write(&self, locale: &str, kind: TreeKind, tree: &KeyPathTree) -> Result<(), StorageError> {
        let path = self.path_for(locale, kind);
        let content = to_tab_json(tree).map_err(|source| StorageError::Serialize {
            locale: locale.to_string(),
            source,
        })?;

        let dir = path.parent().unwrap_or(&self.root);
        let write_err = |source| StorageError::Write {
            path: path.clone(),
            source,
        };
        fs::create_dir_all(dir).map_err(write_err)?;

        // Write beside the target and rename so readers never observe a partial file.
        let mut staged = NamedTempFile::new_in(dir).map_err(write_err)?;
        staged.write_all(&content).map_err(write_err)?;
        staged
            .persist(&path)
            .map_err(|err| write_err(err.error))?;

        debug!(path = %path.display(), keys = tree.leaf_count(), "Wrote {} tree", kind);
        Ok(())
    }

    fn describe(&self) -> String {
        self.root.display().to_string()
    }
}

/// In-memory store, used for dry runs and tests.
#[derive(Debug, Default)]
pub struct MemoryLocaleStore {
    trees: Mutex<HashMap<(String, TreeKind), KeyPathTree>>,
}

impl MemoryLocaleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tree(self, locale: &str, kind: TreeKind, tree: KeyPathTree) -> Self {
        self.lock().insert((locale.to_string(), kind), tree);
        self
    }

    #[cfg(test)]
    pub fn contains(&self, locale: &str, kind: TreeKind) -> bool {
        self.lock().contains_key(&(locale.to_string(), kind))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<(String, TreeKind), KeyPathTree>> {
        // A poisoned map still holds whole trees; each write replaces one atomically.
        self.trees.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl LocaleStore for MemoryLocaleStore {
    fn read(&self, locale: &str, kind: TreeKind) -> Result<KeyPathTree, StorageError> {
        Ok(self
            .lock()
            .get(&(locale.to_string(), kind))
            .cloned()
            .unwrap_or_default())
    }

    fn write(&self, locale: &str, kind: TreeKind, tree: &KeyPathTree) -> Result<(), StorageError> {
        self.lock().insert((locale.to_string(), kind), tree.clone());
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn tree(value: serde_json::Value) -> KeyPathTree {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_tab_indented_output() {
        let t = tree(json!({"home": {"title": "Hi"}, "end": "Bye"}));
        assert_eq!(
            String::from_utf8(to_tab_json(&t).unwrap()).unwrap(),
            "{\n\t\"home\": {\n\t\t\"title\": \"Hi\"\n\t},\n\t\"end\": \"Bye\"\n}"
        );
    }

    #[test]
    fn test_fs_missing_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsLocaleStore::new(dir.path());
        assert!(store.read("fr", TreeKind::Final).unwrap().is_empty());
    }

    #[test]
    fn test_fs_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsLocaleStore::new(dir.path());
        let t = tree(json!({"greeting": "Bonjour", "nav": {"back": "Retour"}}));

        store.write("fr", TreeKind::Staging, &t).unwrap();

        let path = dir.path().join("fr").join(DEFAULT_STAGING_FILE);
        assert!(path.exists());
        assert_eq!(store.read("fr", TreeKind::Staging).unwrap(), t);
        assert!(store.read("fr", TreeKind::Final).unwrap().is_empty());
    }

    #[test]
    fn test_fs_custom_file_names() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsLocaleStore::new(dir.path()).with_file_names("staging.json", "final.json");
        store
            .write("en", TreeKind::Final, &tree(json!({"a": "b"})))
            .unwrap();
        assert!(dir.path().join("en").join("final.json").exists());
    }

    #[test]
    fn test_fs_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsLocaleStore::new(dir.path());
        let path = store.path_for("fr", TreeKind::Final);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "{ not json").unwrap();

        match store.read("fr", TreeKind::Final) {
            Err(StorageError::Malformed { path: p, .. }) => assert_eq!(p, path),
            other => panic!("Expected Malformed, got {:?}", other),
        }
    }

    #[test]
    fn test_memory_store_round_trip() {
        let store = MemoryLocaleStore::new();
        assert!(!store.contains("en", TreeKind::Final));
        let t = tree(json!({"a": "b"}));
        store.write("en", TreeKind::Final, &t).unwrap();
        assert!(store.contains("en", TreeKind::Final));
        assert_eq!(store.read("en", TreeKind::Final).unwrap(), t);
        assert!(store.read("en", TreeKind::Staging).unwrap().is_empty());
    }
}

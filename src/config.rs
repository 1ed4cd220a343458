//! Run configuration
//!
//! Loaded from a JSON file (default `i18n-harvest.json`); every field is optional:
//!
//! ```json
//! {
//!     "fragments": ["src/**/*.html"],
//!     "locales_dir": "locales",
//!     "output_dirs": ["dist/locales"],
//!     "base_locale": "en",
//!     "target_locales": ["fr"],
//!     "placeholder": "__NEEDS_TRANSLATION__",
//!     "concurrency": 8,
//!     "sync": { "enabled": true, "prune": false }
//! }
//! ```

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigError;
use crate::mt::validate_locale;
use crate::storage::{DEFAULT_FINAL_FILE, DEFAULT_STAGING_FILE, FsLocaleStore};

pub const DEFAULT_CONFIG_FILE: &str = "i18n-harvest.json";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub enabled: bool,
    pub prune: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Glob patterns of template fragments.
    pub fragments: Vec<String>,
    /// Root of the locale store.
    pub locales_dir: PathBuf,
    /// Extra roots that receive a copy of every final tree.
    pub output_dirs: Vec<PathBuf>,
    pub base_locale: String,
    pub target_locales: Vec<String>,
    pub placeholder: String,
    pub concurrency: usize,
    pub staging_file: String,
    pub final_file: String,
    pub sync: SyncConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fragments: vec!["src/**/*.html".to_string()],
            locales_dir: PathBuf::from("locales"),
            output_dirs: Vec::new(),
            base_locale: "en".to_string(),
            target_locales: vec!["fr".to_string()],
            placeholder: crate::DEFAULT_PLACEHOLDER.to_string(),
            concurrency: crate::DEFAULT_CONCURRENCY,
            staging_file: DEFAULT_STAGING_FILE.to_string(),
            final_file: DEFAULT_FINAL_FILE.to_string(),
            sync: SyncConfig::default(),
        }
    }
}

impl Config {
    /// Load and validate a config file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config = match fs::read_to_string(path) {
            Ok(content) => {
                serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
                    path: path.to_path_buf(),
                    source,
                })?
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "No config file, using defaults");
                Config::default()
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        for locale in std::iter::once(&self.base_locale).chain(&self.target_locales) {
            if let Err(err) = validate_locale(locale) {
                return invalid(err.to_string());
            }
        }
        if self.target_locales.contains(&self.base_locale) {
            return invalid(format!(
                "base locale '{}' cannot also be a target locale",
                self.base_locale
            ));
        }
        if self.placeholder.is_empty() {
            return invalid("placeholder must not be empty".to_string());
        }
        if self.staging_file == self.final_file {
            return invalid("staging_file and final_file must differ".to_string());
        }
        Ok(())
    }

    pub fn locale_store(&self) -> FsLocaleStore {
        FsLocaleStore::new(&self.locales_dir).with_file_names(&self.staging_file, &self.final_file)
    }

    pub fn mirror_stores(&self) -> Vec<FsLocaleStore> {
        self.output_dirs
            .iter()
            .map(|dir| FsLocaleStore::new(dir).with_file_names(&self.staging_file, &self.final_file))
            .collect()
    }
}

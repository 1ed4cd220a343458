//! Error types shared across the harvest pipeline.
//!
//! Only [`StorageError`] and [`ConfigError`] are fatal for a run. Everything else is
//! reported and skipped by the stage that produced it.

use std::path::PathBuf;

use thiserror::Error;

/// Errors from addressing a [`crate::tree::KeyPathTree`] by dotted key.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("invalid dotted key '{0}': segments must be non-empty")]
    InvalidKey(String),
    #[error("key not found: {0}")]
    KeyNotFound(String),
}

/// Errors from extracting directives out of a single template fragment.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    #[error("fragment '{0}' has no <template> element")]
    MissingTemplate(String),
    #[error("failed to query fragment '{fragment}' with selector '{selector}'")]
    Selector { fragment: String, selector: String },
    #[error("failed to read fragment '{path}': {message}")]
    Unreadable { path: PathBuf, message: String },
}

/// Errors from reading or writing persisted locale trees.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed locale tree in {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to serialize locale tree for '{locale}': {source}")]
    Serialize {
        locale: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors from loading or validating [`crate::config::Config`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid fragment pattern '{pattern}': {message}")]
    Pattern { pattern: String, message: String },
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Umbrella error for a pipeline run.
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type HarvestResult<T> = Result<T, HarvestError>;

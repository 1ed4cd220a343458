//! Harvest translation keys from HTML template fragments and keep per-locale translation trees
//! up to date.
//!
//! Elements opt in with an `i18n` (or `t`) attribute holding `;`-separated directives such as
//! `home.title` or `[placeholder]search.hint`. A run extracts every directive into a nested
//! [`KeyPathTree`], reconciles it with the staging and final trees already stored for each
//! locale, then machine-translates the target locales and publishes the final trees.
//!
//! ```
//! use i18n_harvest::{DirectiveExtractor, Fragment};
//!
//! let fragment = Fragment::new(
//!     "home.html",
//!     r#"<template><h1 i18n="home.title">Welcome</h1></template>"#,
//! );
//! let extraction = DirectiveExtractor::default().extract(&fragment).unwrap();
//! assert_eq!(extraction.tree.leaves(), vec![("home.title".to_string(), "Welcome".to_string())]);
//! ```

pub mod builder;
pub mod config;
pub mod error;
pub mod extractor;
pub mod fragments;
pub mod mt;
pub mod pipeline;
pub mod report;
pub mod storage;
pub mod tree;

/// Sentinel stored for keys that still need a translation.
pub const DEFAULT_PLACEHOLDER: &str = "__NEEDS_TRANSLATION__";

/// Default number of machine translation requests in flight.
pub const DEFAULT_CONCURRENCY: usize = 8;

pub use builder::{SyncStats, TranslationTreeBuilder, reconcile, sync_with_base};
pub use config::Config;
pub use error::{ConfigError, ExtractError, HarvestError, HarvestResult, StorageError, TreeError};
pub use extractor::{CaptureTarget, Directive, DirectiveExtractor, Extraction};
pub use fragments::{Fragment, FragmentSource, GlobFragmentSource};
pub use pipeline::{ExtractedKeys, LocaleTrees, Pipeline};
pub use report::RunReport;
pub use storage::{FsLocaleStore, LocaleStore, MemoryLocaleStore, TreeKind};
pub use tree::{KeyPathTree, SetOutcome, TreeNode, deep_merge};

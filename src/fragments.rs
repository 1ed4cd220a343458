//! Sources of template fragments.

use std::fs;

use tracing::warn;

use crate::error::{ConfigError, ExtractError};

/// One template file: an identifier (usually its path) and its raw markup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub id: String,
    pub markup: String,
}

impl Fragment {
    pub fn new(id: impl Into<String>, markup: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            markup: markup.into(),
        }
    }
}

/// Supplies the fragments of one run.
///
/// Fragments that cannot be loaded are returned in the error list rather than failing the
/// whole source, so one unreadable file does not stop the batch.
pub trait FragmentSource {
    fn fragments(&self) -> (Vec<Fragment>, Vec<ExtractError>);
}

impl FragmentSource for Vec<Fragment> {
    fn fragments(&self) -> (Vec<Fragment>, Vec<ExtractError>) {
        (self.clone(), Vec::new())
    }
}

/// Fragments read from files matching glob patterns.
#[derive(Debug, Clone)]
pub struct GlobFragmentSource {
    patterns: Vec<String>,
}

impl GlobFragmentSource {
    /// Validate the patterns up front; a bad pattern is a configuration mistake.
    pub fn new(patterns: &[String]) -> Result<Self, ConfigError> {
        for pattern in patterns {
            glob::Pattern::new(pattern).map_err(|err| ConfigError::Pattern {
                pattern: pattern.clone(),
                message: err.to_string(),
            })?;
        }
        Ok(Self {
            patterns: patterns.to_vec(),
        })
    }
}

impl FragmentSource for GlobFragmentSource {
    fn fragments(&self) -> (Vec<Fragment>, Vec<ExtractError>) {
        let mut fragments = Vec::new();
        let mut errors = Vec::new();

        for pattern in &self.patterns {
            let paths = match glob::glob(pattern) {
                Ok(paths) => paths,
                Err(err) => {
                    warn!(pattern = %pattern, error = %err, "Skipping invalid pattern");
                    continue;
                }
            };

            for entry in paths {
                let path = match entry {
                    Ok(path) => path,
                    Err(err) => {
                        errors.push(ExtractError::Unreadable {
                            path: err.path().to_path_buf(),
                            message: err.error().to_string(),
                        });
                        continue;
                    }
                };
                if !path.is_file() {
                    continue;
                }
                match fs::read_to_string(&path) {
                    Ok(markup) => {
                        fragments.push(Fragment::new(path.display().to_string(), markup))
                    }
                    Err(err) => errors.push(ExtractError::Unreadable {
                        path,
                        message: err.to_string(),
                    }),
                }
            }
        }

        // Overlapping patterns may match the same file twice.
        fragments.sort_by(|a, b| a.id.cmp(&b.id));
        fragments.dedup_by(|a, b| a.id == b.id);
        (fragments, errors)
    }
}

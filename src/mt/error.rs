//! Error types for the Machine Translation module

use thiserror::Error;

/// Error types for the Machine Translation module
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MtError {
    /// The provider could not be configured (missing key, rejected credentials)
    #[error("Configuration error: {0}")]
    ConfigError(String),
    /// A locale code was empty or malformed
    #[error("Invalid locale: {0}")]
    InvalidLocale(String),
    /// The request never got a response
    #[error("Network error: {0}")]
    NetworkError(String),
    /// The provider answered but did not produce a translation
    #[error("Translation error: {0}")]
    TranslationError(String),
}

impl From<reqwest::Error> for MtError {
    fn from(err: reqwest::Error) -> Self {
        MtError::NetworkError(err.to_string())
    }
}

/// Result type for MT operations
pub type MtResult<T> = Result<T, MtError>;

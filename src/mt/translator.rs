//! Machine translation provider abstraction
//!
//! The harvest pipeline only needs `translate(text, from, to)`. Providers are plugged in
//! behind [`MachineTranslator`] so runs can use Google Translate, a deterministic mock, or
//! anything else that speaks the trait.
//!
//! # Example
//!
//! ```ignore
//! use i18n_harvest::mt::{MachineTranslator, MockMode, MockTranslator};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let provider = MockTranslator::new(MockMode::Suffix);
//!     let result = provider.translate("Hello", "en", "fr").await?;
//!     assert_eq!(result, "Hello_fr");
//!     Ok(())
//! }
//! ```

use crate::mt::error::{MtError, MtResult};
use async_trait::async_trait;

/// How a provider must treat a source string.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TextFormat {
    /// Plain text. Characters such as `&` and `<` are literal.
    #[default]
    Text,
    /// Markup whose tags and entities must survive translation.
    Html,
}

impl TextFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            TextFormat::Text => "text",
            TextFormat::Html => "html",
        }
    }
}

/// Generic trait for machine translation providers
///
/// Calls are best effort and at most once: a provider reports failure through [`MtError`] and
/// the caller decides what to do with the key. Retrying is the provider's business.
#[async_trait]
pub trait MachineTranslator: Send + Sync {
    /// Translate a single text string from `source_locale` to `target_locale`.
    async fn translate(
        &self,
        text: &str,
        source_locale: &str,
        target_locale: &str,
    ) -> MtResult<String>;

    /// Translate a string of inner markup, keeping its tags and entities intact.
    ///
    /// Providers without a markup mode translate it like plain text.
    async fn translate_markup(
        &self,
        markup: &str,
        source_locale: &str,
        target_locale: &str,
    ) -> MtResult<String> {
        self.translate(markup, source_locale, target_locale).await
    }

    /// Translate several strings. Output order and length match the input.
    ///
    /// The default implementation issues one [`translate`](Self::translate) call per text;
    /// providers with a real batch endpoint override it.
    async fn translate_batch(
        &self,
        texts: &[String],
        source_locale: &str,
        target_locale: &str,
    ) -> MtResult<Vec<String>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.translate(text, source_locale, target_locale).await?);
        }
        Ok(results)
    }

    /// Name of the provider, for logs and the run report.
    fn provider_name(&self) -> &str;
}

/// Normalize a locale code by stripping region information
///
/// - `en-US` → `en`
/// - `zh-Hans` → `zh`
/// - `fr` → `fr`
pub fn normalize_locale(locale: &str) -> String {
    locale.split(['-', '_']).next().unwrap_or(locale).to_lowercase()
}

/// Check that a locale code is non-empty and only uses ASCII letters, digits, `-` and `_`.
pub fn validate_locale(locale: &str) -> MtResult<()> {
    if locale.is_empty() {
        return Err(MtError::InvalidLocale("Locale code is empty".to_string()));
    }

    if !locale
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(MtError::InvalidLocale(format!(
            "Invalid characters in locale code: {}",
            locale
        )));
    }

    Ok(())
}

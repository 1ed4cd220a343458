//! Mock Machine Translator
//!
//! A deterministic, API-free translator. The CLI uses it for `--mock` dry runs and the tests
//! use it as the translation stub.
//!
//! # Example
//!
//! ```ignore
//! use i18n_harvest::mt::{MachineTranslator, MockMode, MockTranslator};
//!
//! #[tokio::test]
//! async fn test_translation() {
//!     let mock = MockTranslator::new(MockMode::Suffix);
//!     let result = mock.translate("hello", "en", "fr").await.unwrap();
//!     assert_eq!(result, "hello_fr");
//! }
//! ```

use crate::mt::error::{MtError, MtResult};
use crate::mt::translator::{MachineTranslator, TextFormat};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

/// Mock translation modes for testing different scenarios
#[derive(Debug, Clone)]
pub enum MockMode {
    /// Append locale suffix: "hello" → "hello_fr"
    Suffix,

    /// Predefined `(text, target_locale) → translation` mappings, suffix for anything else
    Mappings(HashMap<(String, String), String>),

    /// Fail for the listed source texts, suffix for anything else
    FailOn(HashSet<String>),

    /// Every call fails with this message
    Error(String),

    /// No-op: return input unchanged
    NoOp,
}

/// Mock translator that records every text it was asked to translate
#[derive(Debug)]
pub struct MockTranslator {
    mode: MockMode,
    /// Optional simulated network delay (in milliseconds)
    delay_ms: u64,
    requests: Mutex<Vec<(String, TextFormat)>>,
}

impl MockTranslator {
    pub fn new(mode: MockMode) -> Self {
        Self::with_delay(mode, 0)
    }

    /// Create a MockTranslator that sleeps `delay_ms` before answering each call
    pub fn with_delay(mode: MockMode, delay_ms: u64) -> Self {
        Self {
            mode,
            delay_ms,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Convenience constructor for a mapping table from one source locale to `target`.
    pub fn with_mappings<'a>(
        target: &str,
        pairs: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Self {
        let map = pairs
            .into_iter()
            .map(|(from, to)| ((from.to_string(), target.to_string()), to.to_string()))
            .collect();
        Self::new(MockMode::Mappings(map))
    }

    /// Texts received so far, in call order.
    pub fn requests(&self) -> Vec<String> {
        self.recorded(|_| true)
    }

    /// Texts received through [`MachineTranslator::translate_markup`], in call order.
    pub fn markup_requests(&self) -> Vec<String> {
        self.recorded(|format| format == TextFormat::Html)
    }

    fn recorded(&self, keep: impl Fn(TextFormat) -> bool) -> Vec<String> {
        self.requests
            .lock()
            .map(|requests| {
                requests
                    .iter()
                    .filter(|(_, format)| keep(*format))
                    .map(|(text, _)| text.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn record(&self, text: &str, format: TextFormat) {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push((text.to_string(), format));
        }
    }

    async fn apply_delay(&self) {
        if self.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
        }
    }

    fn apply_translation(&self, text: &str, target: &str) -> MtResult<String> {
        let suffixed = || format!("{}_{}", text, target);
        match &self.mode {
            MockMode::Suffix => Ok(suffixed()),
            MockMode::Mappings(map) => Ok(map
                .get(&(text.to_string(), target.to_string()))
                .cloned()
                .unwrap_or_else(suffixed)),
            MockMode::FailOn(texts) if texts.contains(text) => Err(MtError::TranslationError(
                format!("mock refused to translate '{}'", text),
            )),
            MockMode::FailOn(_) => Ok(suffixed()),
            MockMode::Error(msg) => Err(MtError::TranslationError(msg.clone())),
            MockMode::NoOp => Ok(text.to_string()),
        }
    }
}

#[async_trait]
impl MachineTranslator for MockTranslator {
    async fn translate(
        &self,
        text: &str,
        _source_locale: &str,
        target_locale: &str,
    ) -> MtResult<String> {
        self.record(text, TextFormat::Text);
        self.apply_delay().await;
        self.apply_translation(text, target_locale)
    }

    async fn translate_markup(
        &self,
        markup: &str,
        _source_locale: &str,
        target_locale: &str,
    ) -> MtResult<String> {
        self.record(markup, TextFormat::Html);
        self.apply_delay().await;
        self.apply_translation(markup, target_locale)
    }

    fn provider_name(&self) -> &str {
        "Mock Translator"
    }
}

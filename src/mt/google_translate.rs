//! Google Translate API provider
//!
//! Talks to the Google Translate v2 REST endpoint. The API key is read from the
//! `GOOGLE_TRANSLATE_API_KEY` environment variable.
//!
//! [`MachineTranslator::translate_markup`] sends `format=html` so the API leaves tags alone.
//! Everything else is sent as `format=text`: in html mode the API escapes `&`, `<` and `>` in its
//! output, which would corrupt plain strings.

use crate::mt::error::{MtError, MtResult};
use crate::mt::translator::{MachineTranslator, TextFormat, normalize_locale, validate_locale};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

pub const API_KEY_ENV: &str = "GOOGLE_TRANSLATE_API_KEY";
const DEFAULT_BASE_URL: &str = "https://translation.googleapis.com/language/translate/v2";

#[derive(Debug, Deserialize)]
struct TranslateResponse {
    data: TranslateData,
}

#[derive(Debug, Deserialize)]
struct TranslateData {
    translations: Vec<Translation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Translation {
    translated_text: String,
}

/// Google Translate API v2 provider
#[derive(Clone)]
pub struct GoogleTranslateProvider {
    api_key: String,
    client: reqwest::Client,
    base_url: String,
}

impl GoogleTranslateProvider {
    /// Google Translate v2 accepts up to 128 texts per request
    const MAX_BATCH_SIZE: usize = 128;

    /// Maximum characters per string
    const MAX_CHARS_PER_STRING: usize = 30_000;

    pub fn new(api_key: String) -> MtResult<Self> {
        if api_key.trim().is_empty() {
            return Err(MtError::ConfigError("API key cannot be empty".to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| MtError::NetworkError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            api_key,
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    pub fn from_env() -> MtResult<Self> {
        let api_key = std::env::var(API_KEY_ENV).map_err(|_| {
            MtError::ConfigError(format!("{} environment variable not set", API_KEY_ENV))
        })?;

        Self::new(api_key)
    }

    /// Point the provider at another endpoint, e.g. a proxy.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn request_body(
        texts: &[String],
        source_locale: &str,
        target_locale: &str,
        format: TextFormat,
    ) -> serde_json::Value {
        json!({
            "q": texts,
            "source": normalize_locale(source_locale),
            "target": normalize_locale(target_locale),
            "format": format.as_str(),
        })
    }

    fn check_length(texts: &[String]) -> MtResult<()> {
        match texts
            .iter()
            .position(|text| text.chars().count() > Self::MAX_CHARS_PER_STRING)
        {
            Some(index) => Err(MtError::TranslationError(format!(
                "Text at index {} exceeds maximum length of {} characters",
                index,
                Self::MAX_CHARS_PER_STRING
            ))),
            None => Ok(()),
        }
    }

    /// Translate up to `MAX_BATCH_SIZE` texts in one request
    async fn translate_chunk(
        &self,
        texts: &[String],
        source_locale: &str,
        target_locale: &str,
        format: TextFormat,
    ) -> MtResult<Vec<String>> {
        let body = Self::request_body(texts, source_locale, target_locale, format);

        let url = format!("{}?key={}", self.base_url, self.api_key);
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());

            return Err(if status.is_client_error() {
                MtError::ConfigError(format!("API client error ({}): {}", status, error_text))
            } else {
                MtError::TranslationError(format!("API server error ({}): {}", status, error_text))
            });
        }

        let parsed: TranslateResponse = response.json().await.map_err(|e| {
            MtError::TranslationError(format!("Failed to parse API response: {}", e))
        })?;

        let results: Vec<String> = parsed
            .data
            .translations
            .into_iter()
            .map(|t| t.translated_text)
            .collect();

        if results.len() != texts.len() {
            return Err(MtError::TranslationError(format!(
                "API returned {} translations for {} texts",
                results.len(),
                texts.len()
            )));
        }
        Ok(results)
    }

    async fn translate_texts(
        &self,
        texts: &[String],
        source_locale: &str,
        target_locale: &str,
        format: TextFormat,
    ) -> MtResult<Vec<String>> {
        validate_locale(source_locale)?;
        validate_locale(target_locale)?;
        Self::check_length(texts)?;

        // Empty strings translate to themselves; only send the rest.
        let pending: Vec<(usize, String)> = texts
            .iter()
            .enumerate()
            .filter(|(_, text)| !text.trim().is_empty())
            .map(|(index, text)| (index, text.clone()))
            .collect();

        let mut results = texts.to_vec();
        for chunk in pending.chunks(Self::MAX_BATCH_SIZE) {
            let chunk_texts: Vec<String> = chunk.iter().map(|(_, text)| text.clone()).collect();
            debug!(
                count = chunk_texts.len(),
                format = format.as_str(),
                source_locale,
                target_locale,
                "Sending translation request"
            );
            let translated = self
                .translate_chunk(&chunk_texts, source_locale, target_locale, format)
                .await?;
            for ((index, _), text) in chunk.iter().zip(translated) {
                results[*index] = text;
            }
        }

        Ok(results)
    }

    async fn translate_one(
        &self,
        text: &str,
        source_locale: &str,
        target_locale: &str,
        format: TextFormat,
    ) -> MtResult<String> {
        let results = self
            .translate_texts(&[text.to_string()], source_locale, target_locale, format)
            .await?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| MtError::TranslationError("API returned no translation".to_string()))
    }
}

impl std::fmt::Debug for GoogleTranslateProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleTranslateProvider")
            .field("api_key", &"***")
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[async_trait]
impl MachineTranslator for GoogleTranslateProvider {
    async fn translate(
        &self,
        text: &str,
        source_locale: &str,
        target_locale: &str,
    ) -> MtResult<String> {
        self.translate_one(text, source_locale, target_locale, TextFormat::Text)
            .await
    }

    async fn translate_markup(
        &self,
        markup: &str,
        source_locale: &str,
        target_locale: &str,
    ) -> MtResult<String> {
        self.translate_one(markup, source_locale, target_locale, TextFormat::Html)
            .await
    }

    async fn translate_batch(
        &self,
        texts: &[String],
        source_locale: &str,
        target_locale: &str,
    ) -> MtResult<Vec<String>> {
        self.translate_texts(texts, source_locale, target_locale, TextFormat::Text)
            .await
    }

    fn provider_name(&self) -> &str {
        "Google Translate"
    }
}

//! Machine translation behind a never-failing service wrapper
//!
//! `TranslationService::translate` always returns text: the original when
//! the target is the default language, no backend is configured, or the
//! backend errors.

use crate::config::TranslationConfig;
use crate::error::{RelayError, Result};
use crate::types::DEFAULT_LANGUAGE;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// A translation backend
#[async_trait]
pub trait Translator: Send + Sync {
    /// Translate `text` from `source` ("auto" for detection) into `target`
    async fn translate(&self, text: &str, source: &str, target: &str) -> Result<String>;

    /// Backend name (e.g., "http")
    fn name(&self) -> &str;
}

#[derive(Serialize)]
struct TranslateRequest<'a> {
    q: &'a str,
    source: &'a str,
    target: &'a str,
    format: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    api_key: Option<&'a str>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TranslateResponse {
    translated_text: String,
}

/// Translator speaking the LibreTranslate-style `POST /translate` API
pub struct HttpTranslator {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpTranslator {
    pub fn new(endpoint: &str, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RelayError::Connection(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn url(&self) -> String {
        format!("{}/translate", self.endpoint)
    }
}

#[async_trait]
impl Translator for HttpTranslator {
    async fn translate(&self, text: &str, source: &str, target: &str) -> Result<String> {
        let body = TranslateRequest {
            q: text,
            source,
            target,
            format: "text",
            api_key: self.api_key.as_deref(),
        };

        let response = self
            .client
            .post(self.url())
            .json(&body)
            .send()
            .await
            .map_err(|e| RelayError::Upstream(format!("Translation request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RelayError::Upstream(format!(
                "Translation service returned HTTP {}",
                status.as_u16()
            )));
        }

        let parsed: TranslateResponse = response
            .json()
            .await
            .map_err(|e| RelayError::Upstream(format!("Invalid translation response: {}", e)))?;
        Ok(parsed.translated_text)
    }

    fn name(&self) -> &str {
        "http"
    }
}

/// Optional translator with fallback to the original text
#[derive(Clone, Default)]
pub struct TranslationService {
    backend: Option<Arc<dyn Translator>>,
}

impl TranslationService {
    pub fn new(backend: Option<Arc<dyn Translator>>) -> Self {
        Self { backend }
    }

    /// Service that never translates
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Build from config; no endpoint yields a disabled service
    pub fn from_config(config: &TranslationConfig) -> Result<Self> {
        let backend: Option<Arc<dyn Translator>> = match config.endpoint.as_deref() {
            Some(endpoint) if !endpoint.is_empty() => Some(Arc::new(HttpTranslator::new(
                endpoint,
                config.api_key.clone(),
                Duration::from_secs(config.timeout_secs),
            )?)),
            _ => None,
        };

        match &backend {
            Some(b) => tracing::info!(backend = b.name(), "Translation enabled"),
            None => tracing::warn!("No translation backend configured, text will pass through"),
        }
        Ok(Self { backend })
    }

    /// Whether a backend is configured
    pub fn is_available(&self) -> bool {
        self.backend.is_some()
    }

    /// Translate `text` into `target`, falling back to `text`
    pub async fn translate(&self, text: &str, target: &str) -> String {
        let Some(backend) = &self.backend else {
            return text.to_string();
        };
        if target == DEFAULT_LANGUAGE {
            return text.to_string();
        }

        match backend.translate(text, "auto", target).await {
            Ok(translated) => translated,
            Err(e) => {
                tracing::error!(target_language = %target, error = %e, "Translation error");
                text.to_string()
            }
        }
    }
}

//! Translation adapter.
//!
//! Wraps an external translation service: source text in, translated text
//! plus the detected source language out. Unsupported target languages are
//! rejected locally against a static allow-list — upstream providers
//! disagree on how they refuse a language, so the refusal must not depend
//! on them.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use agora_core::adapter::Adapter;
use agora_core::error::InvokeError;

use crate::{classify_transport_error, retry_after_hint};

const DEFAULT_BASE_URL: &str = "https://api.polyglossa.dev";

/// Safety net on the HTTP client; the dispatcher enforces the real
/// per-attempt budget.
const HTTP_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(60);

/// Target languages the marketplace commits to. ISO 639-1, sorted.
pub const SUPPORTED_TARGETS: &[&str] = &[
    "ar", "de", "en", "es", "fr", "hi", "it", "ja", "ko", "pt", "ru", "zh",
];

/// Input contract for the translation agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TranslationInput {
    /// Text to translate.
    pub text: String,

    /// Source language code; omit for auto-detection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// Target language code (ISO 639-1).
    pub target: String,
}

/// Normalized output of the translation agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationOutput {
    pub translated: String,

    /// The source language the upstream worked from — detected when the
    /// caller omitted it.
    pub detected_source: String,
}

#[derive(Debug, Deserialize)]
struct UpstreamTranslation {
    translated: String,
    detected_source: String,
}

/// Adapter for the translation agent.
pub struct TranslationAdapter {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl TranslationAdapter {
    pub fn new(api_key: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: DEFAULT_BASE_URL.into(),
            api_key,
            client,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn from_config(upstream: &agora_config::UpstreamConfig) -> Self {
        let mut adapter = Self::new(upstream.api_key.clone());
        if let Some(url) = &upstream.api_url {
            adapter = adapter.with_base_url(url);
        }
        adapter
    }

    fn parse_input(payload: &serde_json::Value) -> Result<TranslationInput, InvokeError> {
        let input: TranslationInput = serde_json::from_value(payload.clone())
            .map_err(|e| InvokeError::InvalidInput(e.to_string()))?;

        if input.text.trim().is_empty() {
            return Err(InvokeError::InvalidInput("'text' must not be empty".into()));
        }
        if let Some(source) = &input.source {
            if source.trim().is_empty() {
                return Err(InvokeError::InvalidInput(
                    "'source' must not be empty when present; omit it for auto-detection".into(),
                ));
            }
        }

        let target = input.target.trim().to_lowercase();
        if !SUPPORTED_TARGETS.contains(&target.as_str()) {
            return Err(InvokeError::UpstreamRejected(format!(
                "unsupported target language '{}'; supported: {}",
                input.target,
                SUPPORTED_TARGETS.join(", ")
            )));
        }

        Ok(input)
    }

    fn classify_status(status: u16, body: &str, retry_after: Option<u64>) -> InvokeError {
        match status {
            429 => InvokeError::UpstreamRateLimited {
                retry_after: retry_after.map(std::time::Duration::from_secs),
            },
            401 | 403 => InvokeError::Internal("translation authentication failed".into()),
            400..=499 => InvokeError::UpstreamRejected(format!("translation rejected: {body}")),
            _ => InvokeError::Internal(format!("translation service returned {status}: {body}")),
        }
    }
}

#[async_trait]
impl Adapter for TranslationAdapter {
    fn agent_id(&self) -> &str {
        "translator"
    }

    fn description(&self) -> &str {
        "Translation: translate text into a supported target language, auto-detecting the source"
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "text": {
                    "type": "string",
                    "description": "Text to translate"
                },
                "source": {
                    "type": "string",
                    "description": "Source language code; omit for auto-detection"
                },
                "target": {
                    "type": "string",
                    "enum": SUPPORTED_TARGETS,
                    "description": "Target language code (ISO 639-1)"
                }
            },
            "required": ["text", "target"],
            "additionalProperties": false
        })
    }

    fn output_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "translated": { "type": "string" },
                "detected_source": { "type": "string" }
            },
            "required": ["translated", "detected_source"]
        })
    }

    fn validate(&self, payload: &serde_json::Value) -> Result<(), InvokeError> {
        Self::parse_input(payload).map(|_| ())
    }

    async fn invoke(
        &self,
        payload: serde_json::Value,
    ) -> Result<serde_json::Value, InvokeError> {
        let input = Self::parse_input(&payload)?;
        let target = input.target.trim().to_lowercase();

        let url = format!("{}/v1/translate", self.base_url);
        let mut body = serde_json::json!({
            "text": input.text.trim(),
            "target": target,
        });
        if let Some(source) = &input.source {
            body["source"] = serde_json::json!(source.trim().to_lowercase());
        }

        debug!(%target, auto_detect = input.source.is_none(), "requesting translation");

        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.header("x-api-key", key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| classify_transport_error(e, HTTP_TIMEOUT))?;

        let status = response.status().as_u16();
        if status != 200 {
            let retry_after = retry_after_hint(response.headers());
            let body = response.text().await.unwrap_or_default();
            return Err(Self::classify_status(status, &body, retry_after));
        }

        let translation: UpstreamTranslation = response.json().await.map_err(|e| {
            InvokeError::Internal(format!("failed to parse translation response: {e}"))
        })?;

        let output = TranslationOutput {
            translated: translation.translated,
            detected_source: translation.detected_source,
        };
        serde_json::to_value(&output)
            .map_err(|e| InvokeError::Internal(format!("failed to serialize translation: {e}")))
    }
}

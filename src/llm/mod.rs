//! Schema-constrained text generation against hosted model providers.
//!
//! Each client sends the receipt prompt together with the receipt schema in
//! the provider's native structured-output form and returns the raw JSON text
//! of the first candidate. Interpreting that text is the caller's job.

mod gemini;
mod openai;
mod prompts;
mod schema;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::AiProvider;

pub use gemini::GeminiClient;
pub use openai::OpenAiClient;
pub use prompts::{build_receipt_prompt, RECEIPT_PROMPT};
pub use schema::{receipt_schema, SchemaNode, REQUIRED_FIELDS};

/// Default OpenAI model.
pub const OPENAI_DEFAULT_MODEL: &str = "gpt-4.1-mini";
/// Default Google model.
pub const GOOGLE_DEFAULT_MODEL: &str = "gemini-2.5-pro";

/// Errors that can occur talking to a model provider.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("No API key configured for {0}")]
    MissingApiKey(AiProvider),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("API error: HTTP {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Empty response from model")]
    EmptyResponse,

    #[error("Invalid model id: {0:?}")]
    InvalidModel(String),
}

/// Connection settings for one provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub endpoint: String,
    pub default_model: String,
}

impl ProviderSettings {
    pub fn openai() -> Self {
        Self {
            api_key: None,
            endpoint: "https://api.openai.com".to_string(),
            default_model: OPENAI_DEFAULT_MODEL.to_string(),
        }
    }

    pub fn google() -> Self {
        Self {
            api_key: None,
            endpoint: "https://generativelanguage.googleapis.com".to_string(),
            default_model: GOOGLE_DEFAULT_MODEL.to_string(),
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Endpoint without a trailing slash, ready for path concatenation.
    fn base_url(&self) -> &str {
        self.endpoint.trim_end_matches('/')
    }

    /// The configured key, if any non-blank one is set.
    fn require_api_key(&self, provider: AiProvider) -> Result<&str, LlmError> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or(LlmError::MissingApiKey(provider))
    }
}

/// A provider that produces schema-constrained JSON text from a prompt.
#[async_trait]
pub trait StructuredGenerator: Send + Sync {
    fn provider(&self) -> AiProvider;

    /// Model used when the caller does not name one.
    fn default_model(&self) -> &str;

    /// Send one generation request and return the candidate JSON text.
    async fn generate(&self, model: &str, prompt: &str) -> Result<String, LlmError>;
}

/// Build the shared HTTP client. Per-attempt deadlines are enforced by the
/// caller; this timeout only bounds a connection that never answers.
fn http_client() -> Result<reqwest::Client, LlmError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(300))
        .build()
        .map_err(|e| LlmError::Connection(e.to_string()))
}

/// Turn a non-success response into [`LlmError::Api`].
async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, LlmError> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    Err(LlmError::Api { status, body })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_api_key_counts_as_missing() {
        let settings = ProviderSettings::openai().with_api_key("   ");
        assert!(matches!(
            settings.require_api_key(AiProvider::OpenAi),
            Err(LlmError::MissingApiKey(AiProvider::OpenAi))
        ));
    }

    #[test]
    fn test_base_url_strips_trailing_slash() {
        let settings = ProviderSettings::google().with_endpoint("http://localhost:8080/");
        assert_eq!(settings.base_url(), "http://localhost:8080");
    }

    #[test]
    fn test_provider_defaults() {
        assert_eq!(ProviderSettings::openai().default_model, "gpt-4.1-mini");
        assert_eq!(ProviderSettings::google().default_model, "gemini-2.5-pro");
    }
}

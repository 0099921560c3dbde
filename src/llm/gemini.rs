//! Google Gemini `generateContent` with a response schema.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::schema::receipt_schema;
use super::{check_status, http_client, LlmError, ProviderSettings, StructuredGenerator};
use crate::models::AiProvider;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'a str,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
    response_schema: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

/// Gemini structured-output client.
pub struct GeminiClient {
    settings: ProviderSettings,
    client: Client,
    schema: Value,
}

impl GeminiClient {
    pub fn new(settings: ProviderSettings) -> Result<Self, LlmError> {
        Ok(Self {
            settings,
            client: http_client()?,
            schema: receipt_schema().to_gemini_schema(),
        })
    }

    fn build_request<'a>(&self, prompt: &'a str) -> GenerateRequest<'a> {
        GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
                response_schema: self.schema.clone(),
            },
        }
    }
}

/// Model ids become one URL path segment, so only `[A-Za-z0-9._-]` is allowed.
fn check_model_id(model: &str) -> Result<(), LlmError> {
    let valid = !model.is_empty()
        && !model.starts_with('.')
        && model
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'));
    if valid {
        Ok(())
    } else {
        Err(LlmError::InvalidModel(model.to_string()))
    }
}

/// Concatenated text of the first candidate.
fn candidate_text(resp: GenerateResponse) -> Result<String, LlmError> {
    if let Some(reason) = resp.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(LlmError::Api {
            status: 200,
            body: format!("prompt blocked: {}", reason),
        });
    }

    let text: String = resp
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|content| content.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(LlmError::EmptyResponse);
    }
    Ok(text)
}

#[async_trait]
impl StructuredGenerator for GeminiClient {
    fn provider(&self) -> AiProvider {
        AiProvider::Google
    }

    fn default_model(&self) -> &str {
        &self.settings.default_model
    }

    async fn generate(&self, model: &str, prompt: &str) -> Result<String, LlmError> {
        check_model_id(model)?;
        let api_key = self.settings.require_api_key(AiProvider::Google)?;
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.settings.base_url(),
            model
        );
        debug!(model, "Calling Gemini");

        let resp = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&self.build_request(prompt))
            .send()
            .await
            .map_err(|e| LlmError::Connection(e.to_string()))?;

        let generated: GenerateResponse = check_status(resp)
            .await?
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;

        candidate_text(generated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Path;
    use axum::http::{HeaderMap, Uri};
    use std::sync::{Arc, Mutex};
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::json;

    #[test]
    fn test_request_shape() {
        let client = GeminiClient::new(ProviderSettings::google()).unwrap();
        let body = serde_json::to_value(client.build_request("read this")).unwrap();
        assert_eq!(body["contents"][0]["parts"][0]["text"], "read this");
        assert_eq!(
            body["generationConfig"]["responseMimeType"],
            "application/json"
        );
        assert_eq!(body["generationConfig"]["responseSchema"]["type"], "OBJECT");
    }

    #[test]
    fn test_candidate_text_joins_parts() {
        let resp: GenerateResponse = serde_json::from_value(json!({
            "candidates": [{"content": {"parts": [{"text": "{\"total\":"}, {"text": " 11}"}]}}]
        }))
        .unwrap();
        assert_eq!(candidate_text(resp).unwrap(), "{\"total\": 11}");
    }

    #[test]
    fn test_candidate_text_empty_and_blocked() {
        let resp: GenerateResponse = serde_json::from_value(json!({"candidates": []})).unwrap();
        assert!(matches!(candidate_text(resp), Err(LlmError::EmptyResponse)));

        let resp: GenerateResponse = serde_json::from_value(json!({
            "promptFeedback": {"blockReason": "SAFETY"}
        }))
        .unwrap();
        assert!(matches!(candidate_text(resp), Err(LlmError::Api { .. })));
    }

    #[tokio::test]
    async fn test_generate_against_fake_endpoint() {
        let router = Router::new().route(
            "/v1beta/models/:call",
            post(
                |Path(call): Path<String>, headers: HeaderMap, Json(body): Json<Value>| async move {
                    assert_eq!(call, "gemini-2.5-flash:generateContent");
                    assert_eq!(headers.get("x-goog-api-key").unwrap(), "g-key");
                    assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
                    Json(json!({
                        "candidates": [{"content": {"parts": [{"text": "{\"currency\":\"USD\"}"}]}}]
                    }))
                },
            ),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        let settings = ProviderSettings::google()
            .with_endpoint(format!("http://{}", addr))
            .with_api_key("g-key");
        let client = GeminiClient::new(settings).unwrap();
        let text = client.generate("gemini-2.5-flash", "prompt").await.unwrap();
        assert_eq!(text, "{\"currency\":\"USD\"}");
    }

    #[test]
    fn test_check_model_id() {
        assert!(check_model_id("gemini-2.5-pro").is_ok());
        assert!(check_model_id("gemini_1.5.flash-001").is_ok());
        for bad in ["", "..", "../x", "a/b", "x?alt=", "m:generateContent", "a b", "a%2Fb"] {
            assert!(
                matches!(check_model_id(bad), Err(LlmError::InvalidModel(_))),
                "{bad}"
            );
        }
    }

    #[tokio::test]
    async fn test_model_id_cannot_leave_models_path() {
        let hits: Arc<Mutex<Vec<String>>> = Arc::default();
        let recorded = hits.clone();
        let router = Router::new().fallback(move |uri: Uri| {
            let recorded = recorded.clone();
            async move {
                recorded.lock().unwrap().push(uri.to_string());
                Json(json!({"candidates": [{"content": {"parts": [{"text": "{}"}]}}]}))
            }
        });
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        let settings = ProviderSettings::google()
            .with_endpoint(format!("http://{}", addr))
            .with_api_key("server-key");
        let client = GeminiClient::new(settings).unwrap();
        let err = client
            .generate("../../v1beta/tunedModels/x?alt=", "prompt")
            .await
            .unwrap_err();

        assert!(matches!(err, LlmError::InvalidModel(_)));
        assert!(hits.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_key() {
        let client = GeminiClient::new(ProviderSettings::google()).unwrap();
        let err = client.generate("gemini-2.5-pro", "p").await.unwrap_err();
        assert!(matches!(err, LlmError::MissingApiKey(AiProvider::Google)));
    }
}

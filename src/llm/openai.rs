//! OpenAI chat completions with a `json_schema` response format.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::schema::receipt_schema;
use super::{check_status, http_client, LlmError, ProviderSettings, StructuredGenerator};
use crate::models::AiProvider;

/// Chat completions request.
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
    json_schema: JsonSchemaFormat,
}

#[derive(Debug, Serialize)]
struct JsonSchemaFormat {
    name: &'static str,
    schema: Value,
}

/// Chat completions response (only the parts we read).
#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI structured-output client.
pub struct OpenAiClient {
    settings: ProviderSettings,
    client: Client,
    schema: Value,
}

impl OpenAiClient {
    pub fn new(settings: ProviderSettings) -> Result<Self, LlmError> {
        Ok(Self {
            settings,
            client: http_client()?,
            schema: receipt_schema().to_json_schema(),
        })
    }

    fn build_request<'a>(&'a self, model: &'a str, prompt: &'a str) -> ChatRequest<'a> {
        ChatRequest {
            model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            response_format: ResponseFormat {
                format_type: "json_schema",
                json_schema: JsonSchemaFormat {
                    name: "receipt_schema",
                    schema: self.schema.clone(),
                },
            },
        }
    }
}

/// Content of the first choice, or [`LlmError::EmptyResponse`].
fn first_choice_content(resp: ChatResponse) -> Result<String, LlmError> {
    resp.choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|content| !content.trim().is_empty())
        .ok_or(LlmError::EmptyResponse)
}

#[async_trait]
impl StructuredGenerator for OpenAiClient {
    fn provider(&self) -> AiProvider {
        AiProvider::OpenAi
    }

    fn default_model(&self) -> &str {
        &self.settings.default_model
    }

    async fn generate(&self, model: &str, prompt: &str) -> Result<String, LlmError> {
        let api_key = self.settings.require_api_key(AiProvider::OpenAi)?;
        let url = format!("{}/v1/chat/completions", self.settings.base_url());
        debug!(model, url = %url, "Calling OpenAI");

        let resp = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&self.build_request(model, prompt))
            .send()
            .await
            .map_err(|e| LlmError::Connection(e.to_string()))?;

        let chat: ChatResponse = check_status(resp)
            .await?
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;

        first_choice_content(chat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderMap;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::json;

    async fn spawn_fake(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[test]
    fn test_request_carries_schema_format() {
        let client = OpenAiClient::new(ProviderSettings::openai()).unwrap();
        let body = serde_json::to_value(client.build_request("gpt-4.1-mini", "hi")).unwrap();
        assert_eq!(body["model"], "gpt-4.1-mini");
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "hi");
        assert_eq!(body["response_format"]["type"], "json_schema");
        assert_eq!(body["response_format"]["json_schema"]["name"], "receipt_schema");
        assert_eq!(
            body["response_format"]["json_schema"]["schema"]["type"],
            "object"
        );
    }

    #[test]
    fn test_first_choice_content() {
        let resp: ChatResponse = serde_json::from_value(json!({
            "choices": [{"message": {"role": "assistant", "content": "{\"total\": 1}"}}]
        }))
        .unwrap();
        assert_eq!(first_choice_content(resp).unwrap(), "{\"total\": 1}");

        let resp: ChatResponse =
            serde_json::from_value(json!({"choices": [{"message": {"content": null}}]})).unwrap();
        assert!(matches!(
            first_choice_content(resp),
            Err(LlmError::EmptyResponse)
        ));

        let resp: ChatResponse = serde_json::from_value(json!({"choices": []})).unwrap();
        assert!(matches!(
            first_choice_content(resp),
            Err(LlmError::EmptyResponse)
        ));
    }

    #[tokio::test]
    async fn test_missing_key_fails_before_network() {
        // Unroutable endpoint: reaching the network would be a Connection error
        let settings = ProviderSettings::openai().with_endpoint("http://192.0.2.1:9");
        let client = OpenAiClient::new(settings).unwrap();
        let err = client.generate("gpt-4.1-mini", "prompt").await.unwrap_err();
        assert!(matches!(err, LlmError::MissingApiKey(AiProvider::OpenAi)));
    }

    #[tokio::test]
    async fn test_generate_against_fake_endpoint() {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(|headers: HeaderMap, Json(body): Json<Value>| async move {
                assert_eq!(
                    headers.get("authorization").unwrap().to_str().unwrap(),
                    "Bearer sk-test"
                );
                assert_eq!(body["model"], "gpt-4o");
                Json(json!({
                    "choices": [{"message": {"content": "{\"vendor_name\":\"Deli\"}"}}]
                }))
            }),
        );
        let endpoint = spawn_fake(router).await;

        let settings = ProviderSettings::openai()
            .with_endpoint(endpoint)
            .with_api_key("sk-test");
        let client = OpenAiClient::new(settings).unwrap();
        let text = client.generate("gpt-4o", "prompt").await.unwrap();
        assert_eq!(text, "{\"vendor_name\":\"Deli\"}");
    }

    #[tokio::test]
    async fn test_http_error_maps_to_api_error() {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(|| async { (axum::http::StatusCode::UNAUTHORIZED, "bad key") }),
        );
        let endpoint = spawn_fake(router).await;

        let settings = ProviderSettings::openai()
            .with_endpoint(endpoint)
            .with_api_key("sk-wrong");
        let client = OpenAiClient::new(settings).unwrap();
        let err = client.generate("gpt-4.1-mini", "prompt").await.unwrap_err();
        match err {
            LlmError::Api { status, body } => {
                assert_eq!(status, 401);
                assert_eq!(body, "bad key");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }
}

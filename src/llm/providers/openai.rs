//! OpenAI-compatible chat-completions provider.
//!
//! Works against OpenAI itself and any gateway speaking the same wire format
//! (LiteLLM, OpenRouter, vLLM). Selected with `DOCUFORGE_PROVIDER=openai`.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{build_http_client, mask_key, status_error, transport_error, RetryPolicy};
use crate::error::LlmError;
use crate::llm::{Choice, GenerationRequest, GenerationResponse, LlmProvider, Message, Usage};

/// Default OpenAI API base URL.
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Environment variable holding the API key.
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Environment variable overriding the base URL.
pub const OPENAI_BASE_URL_ENV: &str = "OPENAI_BASE_URL";

/// Default model for this provider.
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Provider for OpenAI-style `/chat/completions` endpoints.
pub struct OpenAiCompatibleProvider {
    client: Client,
    api_key: String,
    base_url: String,
    default_model: String,
    timeout: Duration,
    retry: RetryPolicy,
}

impl std::fmt::Debug for OpenAiCompatibleProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiCompatibleProvider")
            .field("api_key", &mask_key(&self.api_key))
            .field("base_url", &self.base_url)
            .field("default_model", &self.default_model)
            .finish_non_exhaustive()
    }
}

impl OpenAiCompatibleProvider {
    /// Create a provider for the default OpenAI endpoint.
    pub fn new(api_key: impl Into<String>) -> Result<Self, LlmError> {
        let timeout = Duration::from_secs(super::REQUEST_TIMEOUT_SECS);
        Ok(Self {
            client: build_http_client(timeout)?,
            api_key: api_key.into(),
            base_url: OPENAI_BASE_URL.to_string(),
            default_model: DEFAULT_MODEL.to_string(),
            timeout,
            retry: RetryPolicy::default(),
        })
    }

    /// Create a provider from `OPENAI_API_KEY` and optional `OPENAI_BASE_URL`.
    ///
    /// # Errors
    ///
    /// Returns `LlmError::MissingApiKey` if the key is unset or empty.
    pub fn from_env() -> Result<Self, LlmError> {
        let key = std::env::var(OPENAI_API_KEY_ENV)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| LlmError::MissingApiKey(OPENAI_API_KEY_ENV.to_string()))?;

        let provider = Self::new(key)?;
        Ok(match std::env::var(OPENAI_BASE_URL_ENV) {
            Ok(url) if !url.trim().is_empty() => provider.with_base_url(url),
            _ => provider,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn to_api_request(&self, request: GenerationRequest) -> ApiRequest {
        let model = if request.model.is_empty() {
            self.default_model.clone()
        } else {
            request.model
        };

        ApiRequest {
            model,
            messages: request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        }
    }

    async fn execute_request(&self, request: &ApiRequest) -> Result<GenerationResponse, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);

        let http_response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| transport_error(e, self.timeout))?;

        let status = http_response.status();
        if !status.is_success() {
            let error_text = http_response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error response".to_string());
            return Err(status_error(status.as_u16(), &error_text));
        }

        let api_response: ApiResponse = http_response
            .json()
            .await
            .map_err(|e| LlmError::ParseError(format!("Failed to parse API response: {}", e)))?;

        let usage = api_response.usage.unwrap_or_default();
        Ok(GenerationResponse {
            id: api_response.id,
            model: api_response.model,
            choices: api_response
                .choices
                .into_iter()
                .map(|c| Choice {
                    index: c.index,
                    message: Message {
                        role: c.message.role,
                        content: c.message.content.unwrap_or_default(),
                    },
                    finish_reason: c.finish_reason.unwrap_or_else(|| "stop".to_string()),
                })
                .collect(),
            usage: Usage {
                prompt_tokens: usage.prompt_tokens,
                completion_tokens: usage.completion_tokens,
                total_tokens: usage.total_tokens,
            },
        })
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatibleProvider {
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, LlmError> {
        let api_request = self.to_api_request(request);
        tracing::debug!(model = %api_request.model, base_url = %self.base_url, "Calling chat completions");
        self.retry
            .run("openai", || self.execute_request(&api_request))
            .await
    }
}

#[derive(Debug, Serialize)]
struct ApiRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    id: String,
    #[serde(default)]
    model: String,
    choices: Vec<ApiChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    #[serde(default)]
    index: u32,
    message: ApiMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    role: String,
    content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_request_keeps_system_message_inline() {
        let provider = OpenAiCompatibleProvider::new("sk-test-abcdef123456").expect("client");
        let request = GenerationRequest::new(
            "",
            vec![Message::system("sys"), Message::user("hi")],
        )
        .with_max_tokens(64);

        let api = provider.to_api_request(request);
        assert_eq!(api.model, DEFAULT_MODEL);
        assert_eq!(api.messages.len(), 2);
        assert_eq!(api.messages[0].role, "system");
        assert_eq!(api.max_tokens, Some(64));
    }

    #[test]
    fn test_null_content_parses() {
        let body = r#"{"id":"x","model":"m","choices":[{"index":0,"message":{"role":"assistant","content":null},"finish_reason":"stop"}]}"#;
        let parsed: ApiResponse = serde_json::from_str(body).expect("parse");
        assert!(parsed.choices[0].message.content.is_none());
        assert!(parsed.usage.is_none());
    }

    #[tokio::test]
    async fn test_generate_connection_error() {
        let provider = OpenAiCompatibleProvider::new("test-key")
            .expect("client")
            .with_base_url("http://localhost:65535")
            .with_retry_policy(RetryPolicy::none());

        let request = GenerationRequest::new("test-model", vec![Message::user("test")]);
        let result = provider.generate(request).await;
        assert!(matches!(result, Err(LlmError::RequestFailed(_))));
    }
}

//! Anthropic Messages API provider.
//!
//! This is the primary backend: every stage defaults to a Claude model and the
//! health check requires `ANTHROPIC_API_KEY`.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{build_http_client, mask_key, status_error, transport_error, RetryPolicy};
use crate::error::LlmError;
use crate::llm::{Choice, GenerationRequest, GenerationResponse, LlmProvider, Message, Usage};

/// Default Anthropic API endpoint.
pub const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";

/// API version header value.
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Environment variable holding the API key.
pub const ANTHROPIC_API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

/// Default model used when a request leaves the model empty.
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

/// Max tokens used when a request does not set one; the API requires it.
const DEFAULT_MAX_TOKENS: u32 = 4000;

/// Provider for Anthropic's Messages API.
pub struct AnthropicProvider {
    client: Client,
    api_key: String,
    base_url: String,
    default_model: String,
    timeout: Duration,
    retry: RetryPolicy,
}

impl std::fmt::Debug for AnthropicProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicProvider")
            .field("api_key", &mask_key(&self.api_key))
            .field("base_url", &self.base_url)
            .field("default_model", &self.default_model)
            .finish_non_exhaustive()
    }
}

impl AnthropicProvider {
    /// Create a provider with the given API key and default settings.
    ///
    /// # Errors
    ///
    /// Returns `LlmError::RequestFailed` if the HTTP client cannot be built.
    pub fn new(api_key: impl Into<String>) -> Result<Self, LlmError> {
        let timeout = Duration::from_secs(super::REQUEST_TIMEOUT_SECS);
        Ok(Self {
            client: build_http_client(timeout)?,
            api_key: api_key.into(),
            base_url: ANTHROPIC_BASE_URL.to_string(),
            default_model: DEFAULT_MODEL.to_string(),
            timeout,
            retry: RetryPolicy::default(),
        })
    }

    /// Create a provider from `ANTHROPIC_API_KEY`.
    ///
    /// # Errors
    ///
    /// Returns `LlmError::MissingApiKey` if the variable is unset or empty.
    pub fn from_env() -> Result<Self, LlmError> {
        let key = std::env::var(ANTHROPIC_API_KEY_ENV)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| LlmError::MissingApiKey(ANTHROPIC_API_KEY_ENV.to_string()))?;
        Self::new(key)
    }

    /// Point the provider at a different base URL (proxies, tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the model used when a request leaves the model empty.
    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    /// Override the retry policy.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Get the default model.
    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    fn to_api_request(&self, request: GenerationRequest) -> ApiRequest {
        let model = if request.model.is_empty() {
            self.default_model.clone()
        } else {
            request.model.clone()
        };

        ApiRequest {
            model,
            max_tokens: request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            temperature: request.temperature,
            system: request.system_prompt(),
            messages: request
                .conversation()
                .map(|m| ApiMessage {
                    role: m.role.clone(),
                    content: m.content.clone(),
                })
                .collect(),
        }
    }

    async fn execute_request(&self, request: &ApiRequest) -> Result<GenerationResponse, LlmError> {
        let url = format!("{}/v1/messages", self.base_url);

        let http_response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
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

        let text: String = api_response
            .content
            .iter()
            .filter(|block| block.block_type == "text")
            .filter_map(|block| block.text.as_deref())
            .collect::<Vec<_>>()
            .join("");

        let usage = api_response.usage.unwrap_or_default();
        Ok(GenerationResponse {
            id: api_response.id,
            model: api_response.model,
            choices: vec![Choice {
                index: 0,
                message: Message::assistant(text),
                finish_reason: api_response
                    .stop_reason
                    .unwrap_or_else(|| "end_turn".to_string()),
            }],
            usage: Usage {
                prompt_tokens: usage.input_tokens,
                completion_tokens: usage.output_tokens,
                total_tokens: usage.input_tokens + usage.output_tokens,
            },
        })
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, LlmError> {
        let api_request = self.to_api_request(request);
        tracing::debug!(model = %api_request.model, "Calling Anthropic Messages API");
        self.retry
            .run("anthropic", || self.execute_request(&api_request))
            .await
    }
}

#[derive(Debug, Serialize)]
struct ApiRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<ApiMessage>,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    id: String,
    model: String,
    content: Vec<ContentBlock>,
    stop_reason: Option<String>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

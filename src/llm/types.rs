//! Request/response types and the provider trait shared by every LLM backend.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::LlmError;

/// A message in a conversation with an LLM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Role of the message sender ("system", "user" or "assistant").
    pub role: String,
    /// Content of the message.
    pub content: String,
}

impl Message {
    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }

    /// Whether this is a system instruction.
    pub fn is_system(&self) -> bool {
        self.role == "system"
    }
}

/// Request for text generation from an LLM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Model identifier to use for generation. Empty means provider default.
    pub model: String,
    /// Conversation messages.
    pub messages: Vec<Message>,
    /// Sampling temperature (0.0 - 1.0).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Maximum number of tokens to generate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl GenerationRequest {
    /// Create a new generation request with default parameters.
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: None,
            max_tokens: None,
        }
    }

    /// Set the temperature for this request.
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the max tokens for this request.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Concatenated system instructions, if any.
    pub fn system_prompt(&self) -> Option<String> {
        let parts: Vec<&str> = self
            .messages
            .iter()
            .filter(|m| m.is_system())
            .map(|m| m.content.as_str())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("\n\n"))
        }
    }

    /// Messages other than system instructions.
    pub fn conversation(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter().filter(|m| !m.is_system())
    }
}

/// Response from an LLM generation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResponse {
    /// Unique identifier for this response.
    pub id: String,
    /// Model that generated this response.
    pub model: String,
    /// Generated choices/completions.
    pub choices: Vec<Choice>,
    /// Token usage statistics.
    pub usage: Usage,
}

impl GenerationResponse {
    /// Builds a single-choice response, mostly useful for providers with one output.
    pub fn single(id: impl Into<String>, model: impl Into<String>, content: String) -> Self {
        Self {
            id: id.into(),
            model: model.into(),
            choices: vec![Choice {
                index: 0,
                message: Message::assistant(content),
                finish_reason: "stop".to_string(),
            }],
            usage: Usage::default(),
        }
    }

    /// Get the content of the first choice, if available.
    pub fn first_content(&self) -> Option<&str> {
        self.choices.first().map(|c| c.message.content.as_str())
    }
}

/// A single generated choice from the LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Choice {
    /// Index of this choice in the response.
    pub index: u32,
    /// Generated message.
    pub message: Message,
    /// Reason the generation stopped (e.g., "stop", "length").
    pub finish_reason: String,
}

/// Token usage statistics for a generation request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    /// Number of tokens in the prompt.
    pub prompt_tokens: u32,
    /// Number of tokens generated.
    pub completion_tokens: u32,
    /// Total tokens used.
    pub total_tokens: u32,
}

/// Trait for LLM providers that can generate text.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate a response for the given request.
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, LlmError>;
}

/// Convenience layer over [`LlmProvider`] for the single-turn calls stages make.
#[async_trait]
pub trait LlmProviderExt: LlmProvider {
    /// Sends one system instruction and one user message and returns the text.
    ///
    /// # Errors
    ///
    /// Propagates provider errors; an empty choice list is `LlmError::EmptyResponse`.
    async fn complete(
        &self,
        system: &str,
        user: &str,
        model: &str,
        max_tokens: u32,
        temperature: f64,
    ) -> Result<String, LlmError> {
        let request = GenerationRequest::new(
            model,
            vec![Message::system(system), Message::user(user)],
        )
        .with_max_tokens(max_tokens)
        .with_temperature(temperature);

        let response = self.generate(request).await?;
        response
            .first_content()
            .map(str::to_string)
            .ok_or(LlmError::EmptyResponse)
    }
}

impl<T: LlmProvider + ?Sized> LlmProviderExt for T {}

//! LLM integration for docuforge.
//!
//! Every stage talks to a hosted chat model through the [`LlmProvider`] trait.
//! Two HTTP backends are provided:
//!
//! - [`AnthropicProvider`]: the Messages API, used by default
//! - [`OpenAiCompatibleProvider`]: any `/chat/completions` endpoint
//!
//! Stages use the single-turn [`LlmProviderExt::complete`] helper:
//!
//! ```ignore
//! use docuforge::llm::{AnthropicProvider, LlmProviderExt};
//!
//! let provider = AnthropicProvider::from_env()?;
//! let text = provider
//!     .complete("You are a researcher.", "Summarize dark matter.", "", 2000, 0.3)
//!     .await?;
//! ```
//!
//! Both providers retry rate limits, timeouts and 5xx responses with
//! exponential backoff before surfacing an [`LlmError`](crate::error::LlmError).

pub mod providers;
pub mod types;

pub use providers::{AnthropicProvider, OpenAiCompatibleProvider, RetryPolicy};
pub use types::{
    Choice, GenerationRequest, GenerationResponse, LlmProvider, LlmProviderExt, Message, Usage,
};

//! HTTP-backed LLM providers.
//!
//! Both providers share the retry loop and the status-code mapping defined
//! here, so an auth failure or a 429 looks the same no matter which backend
//! produced it.

pub mod anthropic;
pub mod openai;

pub use anthropic::AnthropicProvider;
pub use openai::OpenAiCompatibleProvider;

use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;

use crate::error::LlmError;

/// Request timeout in seconds.
pub const REQUEST_TIMEOUT_SECS: u64 = 120;

/// Maximum number of attempts for transient failures.
const MAX_ATTEMPTS: u32 = 3;

/// Base delay for exponential backoff in milliseconds.
const BASE_RETRY_DELAY_MS: u64 = 1000;

/// Retry behaviour for transient provider failures.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles afterwards.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            base_delay: Duration::from_millis(BASE_RETRY_DELAY_MS),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
        }
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        // 1x, 2x, 4x ...
        self.base_delay * (1u32 << attempt.saturating_sub(1).min(16))
    }

    /// Runs `op` until it succeeds, fails permanently, or attempts run out.
    pub async fn run<T, F, Fut>(&self, provider: &str, mut op: F) -> Result<T, LlmError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, LlmError>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut last_error = None;

        for attempt in 0..attempts {
            if attempt > 0 {
                let delay = self.delay_for(attempt);
                tracing::debug!(
                    provider,
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    "Retrying LLM request after transient failure"
                );
                tokio::time::sleep(delay).await;
            }

            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() => {
                    tracing::warn!(
                        provider,
                        attempt = attempt + 1,
                        max_attempts = attempts,
                        error = %err,
                        "Transient error, will retry"
                    );
                    last_error = Some(err);
                }
                Err(err) => return Err(err),
            }
        }

        Err(last_error.unwrap_or_else(|| {
            LlmError::RequestFailed("Max retries exceeded with no error captured".to_string())
        }))
    }
}

/// Builds the shared HTTP client with the per-call timeout.
pub(crate) fn build_http_client(timeout: Duration) -> Result<Client, LlmError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| LlmError::RequestFailed(format!("Failed to build HTTP client: {}", e)))
}

/// Converts a reqwest send error into an [`LlmError`].
pub(crate) fn transport_error(err: reqwest::Error, timeout: Duration) -> LlmError {
    if err.is_timeout() {
        LlmError::Timeout {
            seconds: timeout.as_secs(),
        }
    } else {
        LlmError::RequestFailed(err.to_string())
    }
}

/// Error envelope used by both the Anthropic and OpenAI APIs.
#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Maps a non-success status and its body to an [`LlmError`].
pub(crate) fn status_error(status_code: u16, body: &str) -> LlmError {
    let message = serde_json::from_str::<ApiErrorResponse>(body)
        .map(|r| r.error.message)
        .unwrap_or_else(|_| body.to_string());

    match status_code {
        401 | 403 => LlmError::Unauthorized(message),
        429 => LlmError::RateLimited(message),
        code => LlmError::ApiError { code, message },
    }
}

/// Masks an API key for logs, keeping the first and last four characters.
pub(crate) fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        "*".repeat(chars.len())
    } else {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}...{}", head, tail)
    }
}

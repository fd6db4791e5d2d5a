//! Error types for docuforge operations.
//!
//! Defines the error types shared across subsystems:
//! - LLM API interactions
//! - Vector store access
//! - Pipeline state construction
//! - Production package export
//!
//! Stage failures are never surfaced through these types to the orchestrator;
//! stages convert them into `errors` entries on the pipeline state.

use thiserror::Error;

/// Broad classification of an LLM failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmErrorKind {
    /// Credentials missing or rejected.
    Auth,
    /// Network failure, timeout or non-success status.
    Transport,
    /// Provider asked us to slow down.
    RateLimit,
    /// The provider answered but the body could not be used.
    Response,
}

/// Errors that can occur during LLM operations.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Missing API key: {0} environment variable not set")]
    MissingApiKey(String),

    #[error("Authentication failed: {0}")]
    Unauthorized(String),

    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Request timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("Failed to parse LLM response: {0}")]
    ParseError(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("API error ({code}): {message}")]
    ApiError { code: u16, message: String },

    #[error("LLM returned no content")]
    EmptyResponse,
}

impl LlmError {
    /// Classifies the error into the auth / transport / rate-limit families.
    pub fn kind(&self) -> LlmErrorKind {
        match self {
            LlmError::MissingApiKey(_) | LlmError::Unauthorized(_) => LlmErrorKind::Auth,
            LlmError::RateLimited(_) => LlmErrorKind::RateLimit,
            LlmError::ApiError { code, .. } if *code == 401 || *code == 403 => LlmErrorKind::Auth,
            LlmError::ApiError { code, .. } if *code == 429 => LlmErrorKind::RateLimit,
            LlmError::RequestFailed(_) | LlmError::Timeout { .. } | LlmError::ApiError { .. } => {
                LlmErrorKind::Transport
            }
            LlmError::ParseError(_) | LlmError::EmptyResponse => LlmErrorKind::Response,
        }
    }

    /// Whether retrying the same request could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::RateLimited(_) | LlmError::Timeout { .. } | LlmError::RequestFailed(_) => {
                true
            }
            LlmError::ApiError { code, .. } => *code >= 500,
            _ => false,
        }
    }
}

/// Errors that can occur during vector store operations.
#[derive(Debug, Error)]
pub enum VectorStoreError {
    #[error("Document id cannot be empty")]
    EmptyId,

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Vector store unavailable: {0}")]
    Unavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors that can occur while building a pipeline state.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("Seed must be a JSON object, got {0}")]
    NotAMapping(String),

    #[error("Reserved key '{0}' must be an array of strings")]
    InvalidAccumulator(String),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors that can occur while writing a production package.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Output path '{0}' exists and is not a directory")]
    NotADirectory(String),

    #[error("State error: {0}")]
    State(#[from] StateError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_llm_error_kind() {
        assert_eq!(
            LlmError::MissingApiKey("ANTHROPIC_API_KEY".into()).kind(),
            LlmErrorKind::Auth
        );
        assert_eq!(
            LlmError::ApiError {
                code: 401,
                message: "bad key".into()
            }
            .kind(),
            LlmErrorKind::Auth
        );
        assert_eq!(
            LlmError::RateLimited("slow down".into()).kind(),
            LlmErrorKind::RateLimit
        );
        assert_eq!(
            LlmError::Timeout { seconds: 120 }.kind(),
            LlmErrorKind::Transport
        );
        assert_eq!(
            LlmError::ApiError {
                code: 502,
                message: "bad gateway".into()
            }
            .kind(),
            LlmErrorKind::Transport
        );
        assert_eq!(LlmError::EmptyResponse.kind(), LlmErrorKind::Response);
    }

    #[test]
    fn test_llm_error_retryable() {
        assert!(LlmError::RateLimited("x".into()).is_retryable());
        assert!(LlmError::ApiError {
            code: 503,
            message: "x".into()
        }
        .is_retryable());
        assert!(!LlmError::ApiError {
            code: 400,
            message: "x".into()
        }
        .is_retryable());
        assert!(!LlmError::Unauthorized("x".into()).is_retryable());
    }

    #[test]
    fn test_error_messages() {
        let err = LlmError::RequestFailed("connection refused".into());
        assert_eq!(err.to_string(), "HTTP request failed: connection refused");

        let err = StateError::NotAMapping("array".into());
        assert_eq!(err.to_string(), "Seed must be a JSON object, got array");
    }
}

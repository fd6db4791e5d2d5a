//! Mock collaborators for unit tests.

use std::collections::{BTreeSet, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::LlmError;
use crate::llm::{GenerationRequest, GenerationResponse, LlmProvider};

/// Replies with scripted texts in order, repeating the last one when exhausted.
///
/// Calls listed with [`ScriptedProvider::failing_on`] fail with a transport
/// error and still consume their scripted reply, so later calls keep their
/// positions.
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<String>>,
    last: Mutex<String>,
    requests: Mutex<Vec<GenerationRequest>>,
    failing_calls: BTreeSet<usize>,
}

impl ScriptedProvider {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            last: Mutex::new(String::new()),
            requests: Mutex::new(Vec::new()),
            failing_calls: BTreeSet::new(),
        }
    }

    /// Makes the zero-based `call` fail with `HTTP request failed: scripted failure`.
    pub fn failing_on(mut self, call: usize) -> Self {
        self.failing_calls.insert(call);
        self
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().expect("lock not poisoned").clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().expect("lock not poisoned").len()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, LlmError> {
        let call = {
            let mut requests = self.requests.lock().expect("lock not poisoned");
            requests.push(request);
            requests.len() - 1
        };

        let mut last = self.last.lock().expect("lock not poisoned");
        if let Some(next) = self.replies.lock().expect("lock not poisoned").pop_front() {
            *last = next;
        }
        if self.failing_calls.contains(&call) {
            return Err(LlmError::RequestFailed("scripted failure".to_string()));
        }
        Ok(GenerationResponse::single("mock-id", "mock-model", last.clone()))
    }
}

/// Always fails with the configured error.
pub struct FailingProvider {
    message: String,
    status: Option<u16>,
}

impl FailingProvider {
    /// Fails like a dropped connection.
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
        }
    }

    /// Fails with an HTTP status error.
    pub fn status(code: u16, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: Some(code),
        }
    }
}

#[async_trait]
impl LlmProvider for FailingProvider {
    async fn generate(&self, _request: GenerationRequest) -> Result<GenerationResponse, LlmError> {
        Err(match self.status {
            Some(401) => LlmError::Unauthorized(self.message.clone()),
            Some(429) => LlmError::RateLimited(self.message.clone()),
            Some(code) => LlmError::ApiError {
                code,
                message: self.message.clone(),
            },
            None => LlmError::RequestFailed(self.message.clone()),
        })
    }
}

//! Shared mock collaborators for integration tests.

#![allow(dead_code)]

use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{Map, Value};

use docuforge::error::{LlmError, VectorStoreError};
use docuforge::llm::{GenerationRequest, GenerationResponse, LlmProvider};
use docuforge::vector::{VectorMatch, VectorStore};

/// Returns the same reply to every request and records the requests.
pub struct FixedLlm {
    reply: String,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl FixedLlm {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().expect("lock not poisoned").len()
    }
}

#[async_trait]
impl LlmProvider for FixedLlm {
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, LlmError> {
        self.requests.lock().expect("lock not poisoned").push(request);
        Ok(GenerationResponse::single("fixed", "fixed-model", self.reply.clone()))
    }
}

/// Fails every request like a dropped connection.
pub struct TransportFailure(pub &'static str);

#[async_trait]
impl LlmProvider for TransportFailure {
    async fn generate(&self, _request: GenerationRequest) -> Result<GenerationResponse, LlmError> {
        Err(LlmError::RequestFailed(self.0.to_string()))
    }
}

/// Accepts writes and never finds anything.
pub struct EmptyStore;

#[async_trait]
impl VectorStore for EmptyStore {
    async fn upsert(&self, _: &str, _: &str, _: Map<String, Value>) -> Result<(), VectorStoreError> {
        Ok(())
    }

    async fn query(&self, _: &str, _: usize) -> Result<Vec<VectorMatch>, VectorStoreError> {
        Ok(Vec::new())
    }

    async fn count(&self) -> Result<usize, VectorStoreError> {
        Ok(0)
    }
}

/// A reply that carries the markers every stage looks for.
pub fn rich_reply() -> String {
    let mut reply = String::from(
        "SCORE: 8/10\nCONFIDENCE: 0.8\nACCESSIBILITY SCORE: 8\n\
         Source: Rubin & Ford (2019), Astrophysical Journal. Peer-reviewed study, n=1200.\n\
         Historical context from the 1930s: Zwicky and the Coma cluster.\n\
         Controversy: some researchers dispute the modified gravity alternative.\n\
         Connection to psychology and economics of attention.\n\
         PATTERN #1: Curiosity gap\nEFFECTIVENESS SCORE: 8/10\n\
         HOOK #1: The universe is missing\nEFFECTIVENESS SCORE: 8/10\n\
         HOOK #2: Invisible mass\nEFFECTIVENESS SCORE: 6/10\n\
         RETENTION SCORE: 7/10\nTRIGGER: curiosity\nPSYCHOLOGICAL TRIGGER: awe\n\
         ACT 1\n[00:00] *Most* of the universe is missing. [PAUSE]\n\
         SCENE 1: Cold open\nSHOT 1: Wide of the night sky, b-roll of telescopes\n\
         MUSIC CUE 1: dark ambient\nGRAPHIC 1: rotation curve animation\nSFX: low hum\n\
         BUDGET: $12,000\nTIMELINE: 6 weeks\nEQUIPMENT: 4K camera\nTECHNICAL: 24fps\n\
         Viral hooks pair psychological triggers with engagement loops. Citation: source list.\n",
    );
    reply.push_str(&"The evidence keeps pointing at something unseen. ".repeat(40));
    reply
}

//! Nearest-neighbour lookup of proven techniques in the vector store.
//!
//! The only stage that never calls the LLM. An empty result is a success
//! with zero techniques; a store failure is the stage's transport failure.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::agents::{value_text, Assignment};
use crate::extraction::markers::truncate_chars;
use crate::scoring::{clamp_unit, coverage, mean, Scorecard};
use crate::stage::{complete, fail, validate, Stage, StageStatus, StageTracker};
use crate::state::{PipelineState, StateUpdate};
use crate::vector::{VectorMatch, VectorStore};

/// Matches requested when the assignment does not say.
pub const DEFAULT_TOP_K: usize = 8;

/// Research characters folded into the query.
pub const RESEARCH_QUERY_CHARS: usize = 500;

/// Context text when the store has nothing relevant.
pub const NO_TECHNIQUES: &str = "No relevant techniques found";

pub struct RetrievalAgent {
    store: Arc<dyn VectorStore>,
    top_k: usize,
}

impl std::fmt::Debug for RetrievalAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetrievalAgent")
            .field("top_k", &self.top_k)
            .finish_non_exhaustive()
    }
}

impl RetrievalAgent {
    pub const NAME: &'static str = "retrieval";

    pub fn new(store: Arc<dyn VectorStore>) -> Self {
        Self {
            store,
            top_k: DEFAULT_TOP_K,
        }
    }

    /// Default `top_k` when the assignment does not carry one.
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }
}

/// `<topic> <research excerpt> targeting <audience>`, skipping blank parts.
pub fn build_query(topic: &str, research: &str, audience: &str) -> String {
    let mut query = topic.trim().to_string();
    let research = truncate_chars(research.trim(), RESEARCH_QUERY_CHARS);
    if !research.is_empty() {
        query.push(' ');
        query.push_str(research);
    }
    if !audience.trim().is_empty() {
        query.push_str(" targeting ");
        query.push_str(audience.trim());
    }
    query
}

fn render_metadata(metadata: &Map<String, Value>) -> String {
    metadata
        .iter()
        .map(|(key, value)| format!("{}: {}", key, value_text(value)))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Numbered context block for the script prompt.
pub fn format_context(matches: &[VectorMatch]) -> String {
    if matches.is_empty() {
        return NO_TECHNIQUES.to_string();
    }
    let mut context = String::from("RELEVANT VIRAL TECHNIQUES FROM DATABASE:\n\n");
    for (i, hit) in matches.iter().enumerate() {
        context.push_str(&format!(
            "{}. (Similarity: {:.1}%)\n{}\n",
            i + 1,
            hit.similarity * 100.0,
            hit.document
        ));
        if !hit.metadata.is_empty() {
            context.push_str(&format!("   Metadata: {}\n", render_metadata(&hit.metadata)));
        }
        context.push('\n');
    }
    context
}

#[async_trait]
impl Stage for RetrievalAgent {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn required_keys(&self) -> &[&'static str] {
        &["retrieval_assignment"]
    }

    async fn run(&self, state: PipelineState) -> PipelineState {
        let mut tracker = StageTracker::new(Self::NAME);
        tracker.advance(StageStatus::Validating);
        if let Err(invalid) = validate(Self::NAME, self.required_keys(), &state) {
            tracker.advance(StageStatus::Invalid);
            return invalid;
        }

        let assignment = Assignment::of(&state, Self::NAME);
        let query = build_query(
            &assignment.text("topic", ""),
            &assignment.text("research_excerpt", ""),
            &assignment.text("target_audience", ""),
        );
        let top_k = assignment.number("top_k", self.top_k as f64).max(0.0) as usize;

        tracker.advance(StageStatus::CallingLlm);
        let matches = match self.store.query(&query, top_k).await {
            Ok(matches) => matches,
            Err(e) => {
                tracker.advance(StageStatus::LlmFailed);
                return fail(&state, Self::NAME, &e.to_string()).merge(
                    StateUpdate::new()
                        .set("retrieval_success", false)
                        .set("retrieved_technique_count", 0)
                        .set("retrieved_context", format!("Search failed: {}", e)),
                );
            }
        };

        tracker.advance(StageStatus::Extracting);
        let similarities: Vec<f64> = matches.iter().map(|m| clamp_unit(m.similarity)).collect();
        let average = mean(&similarities).unwrap_or(0.0);
        tracing::info!(
            stage = Self::NAME,
            count = matches.len(),
            avg_similarity = average,
            "Techniques retrieved"
        );

        tracker.advance(StageStatus::Scoring);
        let scorecard = Scorecard::new()
            .factor("result_count", 0.5, coverage(matches.len(), DEFAULT_TOP_K))
            .factor("similarity", 0.5, average);

        tracker.advance(StageStatus::Done);
        let outputs = StateUpdate::new()
            .set("retrieved_context", format_context(&matches))
            .set("retrieved_technique_count", matches.len())
            .set("retrieval_success", true)
            .set("retrieval_avg_similarity", average)
            .set_serialized("retrieval_results", &matches);
        complete(&state, Self::NAME, outputs, scorecard.rounded())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VectorStoreError;
    use crate::vector::{seed_techniques, InMemoryVectorStore};
    use serde_json::json;

    struct BrokenStore;

    #[async_trait]
    impl VectorStore for BrokenStore {
        async fn upsert(&self, _: &str, _: &str, _: Map<String, Value>) -> Result<(), VectorStoreError> {
            Err(VectorStoreError::Unavailable("down".into()))
        }
        async fn query(&self, _: &str, _: usize) -> Result<Vec<VectorMatch>, VectorStoreError> {
            Err(VectorStoreError::Unavailable("down".into()))
        }
        async fn count(&self) -> Result<usize, VectorStoreError> {
            Err(VectorStoreError::Unavailable("down".into()))
        }
    }

    fn seeded() -> PipelineState {
        PipelineState::create(json!({
            "topic": "Procrastination",
            "retrieval_assignment": {
                "topic": "Procrastination",
                "research_excerpt": "curiosity and open loops keep viewers watching",
                "target_audience": "students"
            }
        }))
        .expect("seed")
    }

    #[test]
    fn test_build_query() {
        assert_eq!(build_query("Sleep", "", "teens"), "Sleep targeting teens");
        let long = "r".repeat(800);
        let query = build_query("Sleep", &long, "");
        assert_eq!(query.len(), "Sleep ".len() + RESEARCH_QUERY_CHARS);
    }

    #[tokio::test]
    async fn test_empty_store_is_success() {
        let agent = RetrievalAgent::new(Arc::new(InMemoryVectorStore::new()));
        let out = agent.run(seeded()).await;

        assert_eq!(out.get_u64("retrieved_technique_count"), Some(0));
        assert_eq!(out.get_bool("retrieval_success"), Some(true));
        assert_eq!(out.get_str("retrieved_context"), Some(NO_TECHNIQUES));
        assert!(out.errors().is_empty());
        assert_eq!(out.confidence("retrieval"), 0.0);
    }

    #[tokio::test]
    async fn test_seeded_store_formats_context() {
        let store = Arc::new(InMemoryVectorStore::new());
        seed_techniques(store.as_ref()).await.expect("seed library");
        let agent = RetrievalAgent::new(store);
        let out = agent.run(seeded()).await;

        let count = out.get_u64("retrieved_technique_count").expect("count");
        assert!(count > 0);
        let context = out.get_str("retrieved_context").expect("context");
        assert!(context.starts_with("RELEVANT VIRAL TECHNIQUES FROM DATABASE:\n\n1. (Similarity: "));
        assert!(context.contains("   Metadata: "));
        let similarity = out.get_f64("retrieval_avg_similarity").expect("similarity");
        assert!((0.0..=1.0).contains(&similarity));
        assert!(out.confidence("retrieval") > 0.0);
    }

    #[tokio::test]
    async fn test_store_failure() {
        let agent = RetrievalAgent::new(Arc::new(BrokenStore));
        let input = seeded();
        let out = agent.run(input.clone()).await;

        assert_eq!(out.confidence("retrieval"), 0.0);
        assert_eq!(out.get_bool("retrieval_success"), Some(false));
        assert_eq!(out.errors().len(), input.errors().len() + 1);
        assert_eq!(out.get_str("topic"), Some("Procrastination"));
    }
}

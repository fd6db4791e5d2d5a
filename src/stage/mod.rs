//! The stage contract.
//!
//! A stage is a total async function from [`PipelineState`] to
//! [`PipelineState`]: it validates its required keys, calls the LLM (or the
//! vector store), extracts structure from the response and merges its
//! namespaced outputs plus `<name>_confidence`. Failures never escape; they
//! become a zero confidence and one entry in `errors`.
//!
//! Single-call stages implement [`LlmStage`] and delegate to
//! [`run_llm_stage`]. Gatekeepers implement [`Stage`] directly and reuse the
//! helpers in [`runner`].

pub mod runner;
pub mod status;

pub use runner::{
    call_llm, complete, fail, run_llm_stage, validate, with_assignment, Extraction, LlmStage,
    Prompt,
};
pub use status::{StageStatus, StageTracker};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::llm::providers::anthropic;
use crate::state::PipelineState;

/// Model used by every stage unless configuration overrides it.
pub const DEFAULT_MODEL: &str = anthropic::DEFAULT_MODEL;

/// Generation parameters fixed per stage at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageSettings {
    pub model: String,
    pub max_tokens: u32,
    /// Sampling temperature in `[0, 1]`.
    pub temperature: f64,
}

impl StageSettings {
    pub fn new(max_tokens: u32, temperature: f64) -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_tokens,
            temperature: temperature.clamp(0.0, 1.0),
        }
    }

    /// Overrides the model; an empty string keeps the current one.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        let model = model.into();
        if !model.trim().is_empty() {
            self.model = model;
        }
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature.clamp(0.0, 1.0);
        self
    }
}

/// A unit of work over the pipeline state.
#[async_trait]
pub trait Stage: Send + Sync {
    /// Namespace prefix for every key this stage writes.
    fn name(&self) -> &str;

    /// Keys that must be present before the stage does any work.
    fn required_keys(&self) -> &[&'static str];

    /// Runs the stage. Never fails: problems are recorded in the state.
    async fn run(&self, state: PipelineState) -> PipelineState;
}

#[async_trait]
impl<T: LlmStage> Stage for T {
    fn name(&self) -> &str {
        LlmStage::name(self)
    }

    fn required_keys(&self) -> &[&'static str] {
        LlmStage::required_keys(self)
    }

    async fn run(&self, state: PipelineState) -> PipelineState {
        run_llm_stage(self, state).await
    }
}

/// `<name>_confidence`.
pub fn confidence_key(name: &str) -> String {
    format!("{}_confidence", name)
}

/// `<name>_<field>`.
pub fn output_key(name: &str, field: &str) -> String {
    format!("{}_{}", name, field)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_defaults_and_overrides() {
        let settings = StageSettings::new(4000, 0.9);
        assert_eq!(settings.model, DEFAULT_MODEL);

        let settings = settings.with_model("claude-test").with_temperature(1.7);
        assert_eq!(settings.model, "claude-test");
        assert_eq!(settings.temperature, 1.0);

        let settings = settings.with_model("  ");
        assert_eq!(settings.model, "claude-test");
    }

    #[test]
    fn test_key_helpers() {
        assert_eq!(confidence_key("hook"), "hook_confidence");
        assert_eq!(output_key("hook", "count"), "hook_count");
    }
}

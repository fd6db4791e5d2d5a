//! Viral pattern analysis over successful videos in the niche.

use std::sync::Arc;

use serde_json::Value;

use crate::agents::{Assignment, DEFAULT_AUDIENCE};
use crate::extraction::count_exact;
use crate::llm::LlmProvider;
use crate::prompts::viral::build_pattern_prompt;
use crate::scoring::{coverage_f64, Scorecard};
use crate::stage::{Extraction, LlmStage, Prompt, StageSettings};
use crate::state::{PipelineState, StateUpdate};

/// Analysis length that earns full detail credit.
const EXPECTED_CHARS: f64 = 5000.0;

/// Ceiling on pattern confidence.
const DETAIL_CEILING: f64 = 0.95;

/// Sections shorter than this are headings or noise, not patterns.
const MIN_SECTION_CHARS: usize = 50;

const TOP_PATTERNS: usize = 5;

pub struct PatternAnalyzer {
    llm: Arc<dyn LlmProvider>,
    settings: StageSettings,
}

impl std::fmt::Debug for PatternAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PatternAnalyzer")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl PatternAnalyzer {
    pub const NAME: &'static str = "pattern";

    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self {
            llm,
            settings: StageSettings::new(4000, 0.7),
        }
    }

    pub fn with_settings(mut self, settings: StageSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.settings = self.settings.with_model(model);
        self
    }
}

/// `PATTERN NAME:` markers, falling back to `Pattern:`.
pub fn count_patterns(analysis: &str) -> usize {
    match count_exact(analysis, "PATTERN NAME:") {
        0 => count_exact(analysis, "Pattern:"),
        n => n,
    }
}

/// The first blank-line separated sections long enough to be patterns.
pub fn top_patterns(analysis: &str, limit: usize) -> Vec<String> {
    analysis
        .split("\n\n")
        .map(str::trim)
        .filter(|section| section.chars().count() > MIN_SECTION_CHARS)
        .take(limit)
        .map(str::to_string)
        .collect()
}

impl LlmStage for PatternAnalyzer {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn required_keys(&self) -> &[&'static str] {
        &["pattern_assignment"]
    }

    fn settings(&self) -> &StageSettings {
        &self.settings
    }

    fn provider(&self) -> &dyn LlmProvider {
        self.llm.as_ref()
    }

    fn build_prompt(&self, state: &PipelineState) -> Prompt {
        let assignment = Assignment::of(state, Self::NAME);
        build_pattern_prompt(
            &assignment.text("topic", ""),
            &assignment.text("target_audience", DEFAULT_AUDIENCE),
            &assignment.text("research_context", ""),
        )
    }

    fn extract(&self, _state: &PipelineState, response: &str) -> Extraction {
        let detail = coverage_f64(response.chars().count() as f64, EXPECTED_CHARS);
        let scorecard = Scorecard::new().factor("detail", 1.0, DETAIL_CEILING * detail);

        let top: Vec<Value> = top_patterns(response, TOP_PATTERNS)
            .into_iter()
            .map(Value::String)
            .collect();
        let outputs = StateUpdate::new()
            .set("pattern_analysis", response)
            .set("pattern_count", count_patterns(response))
            .set("pattern_top_patterns", Value::Array(top));
        Extraction::new(outputs, scorecard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::Stage;
    use crate::testing::ScriptedProvider;
    use serde_json::json;

    #[test]
    fn test_count_patterns_fallback() {
        assert_eq!(count_patterns("PATTERN NAME: a\nPATTERN NAME: b\nPattern: c"), 2);
        assert_eq!(count_patterns("Pattern: a\nPattern: b"), 2);
        assert_eq!(count_patterns("nothing structured"), 0);
    }

    #[test]
    fn test_top_patterns_skips_short_sections() {
        let long = "x".repeat(60);
        let text = format!("Intro\n\n{}\n\nshort\n\n{}", long, long);
        assert_eq!(top_patterns(&text, 5), vec![long.clone(), long]);
    }

    #[tokio::test]
    async fn test_confidence_tracks_length() {
        let analysis = format!("PATTERN NAME: Open loop\n\n{}", "detail ".repeat(357));
        let agent = PatternAnalyzer::new(Arc::new(ScriptedProvider::new([analysis.clone()])));
        let state = PipelineState::create(json!({"pattern_assignment": {"topic": "Sleep"}}))
            .expect("seed");
        let out = agent.run(state).await;

        assert_eq!(out.get_u64("pattern_count"), Some(1));
        assert_eq!(out.get_str("pattern_analysis"), Some(analysis.as_str()));
        // 2524 chars of 5000, scaled by 0.95
        assert!((out.confidence("pattern") - 0.48).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_long_analysis_caps_below_one() {
        let agent = PatternAnalyzer::new(Arc::new(ScriptedProvider::new(["y".repeat(9000)])));
        let state = PipelineState::create(json!({"pattern_assignment": {}})).expect("seed");
        let out = agent.run(state).await;
        assert_eq!(out.confidence("pattern"), 0.95);
    }
}

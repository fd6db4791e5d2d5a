//! Retention strategy: checkpoints, techniques and a predicted retention rate.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::agents::{Assignment, DEFAULT_AUDIENCE, DEFAULT_DURATION_MINUTES};
use crate::extraction::count_exact;
use crate::extraction::labels::extract_percentage;
use crate::llm::LlmProvider;
use crate::prompts::viral::build_engagement_prompt;
use crate::scoring::{coverage, quality, round_to, Scorecard};
use crate::stage::{Extraction, LlmStage, Prompt, StageSettings};
use crate::state::{PipelineState, StateUpdate};

/// Retention assumed when the strategy never predicts one.
pub const DEFAULT_RETENTION_PCT: f64 = 65.0;

const EXPECTED_TECHNIQUES: usize = 5;
const EXPECTED_CHECKPOINTS: usize = 5;

pub struct EngagementOptimizer {
    llm: Arc<dyn LlmProvider>,
    settings: StageSettings,
}

impl std::fmt::Debug for EngagementOptimizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngagementOptimizer")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl EngagementOptimizer {
    pub const NAME: &'static str = "engagement";

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

/// One `CHECKPOINT` block from the strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetentionCheckpoint {
    pub line: String,
    pub details: Vec<String>,
}

/// Checkpoint lines with the non-blank lines that follow each one.
pub fn retention_checkpoints(strategy: &str) -> Vec<RetentionCheckpoint> {
    let mut checkpoints: Vec<RetentionCheckpoint> = Vec::new();
    let mut open = false;
    for line in strategy.lines().map(str::trim) {
        if line.contains("CHECKPOINT") {
            checkpoints.push(RetentionCheckpoint {
                line: line.to_string(),
                details: Vec::new(),
            });
            open = true;
        } else if line.is_empty() {
            open = false;
        } else if open {
            if let Some(current) = checkpoints.last_mut() {
                current.details.push(line.to_string());
            }
        }
    }
    checkpoints
}

/// `min(10, chars / 1000 + techniques * 0.3 + checkpoints * 0.5)`.
pub fn engagement_score(chars: usize, techniques: usize, checkpoints: usize) -> f64 {
    (chars as f64 / 1000.0 + techniques as f64 * 0.3 + checkpoints as f64 * 0.5).min(10.0)
}

impl LlmStage for EngagementOptimizer {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn required_keys(&self) -> &[&'static str] {
        &["engagement_assignment"]
    }

    fn settings(&self) -> &StageSettings {
        &self.settings
    }

    fn provider(&self) -> &dyn LlmProvider {
        self.llm.as_ref()
    }

    fn build_prompt(&self, state: &PipelineState) -> Prompt {
        let assignment = Assignment::of(state, Self::NAME);
        build_engagement_prompt(
            &assignment.text("topic", ""),
            &assignment.text("target_audience", DEFAULT_AUDIENCE),
            assignment.number("duration_minutes", DEFAULT_DURATION_MINUTES),
            &assignment.text("research_context", ""),
            &assignment.text("patterns", ""),
            &assignment.text("hooks", ""),
        )
    }

    fn extract(&self, _state: &PipelineState, response: &str) -> Extraction {
        let retention = extract_percentage(response, "retention").unwrap_or(DEFAULT_RETENTION_PCT);
        let techniques = count_exact(response, "TECHNIQUE") + count_exact(response, "technique");
        let checkpoints = count_exact(response, "CHECKPOINT");
        let score = engagement_score(response.chars().count(), techniques, checkpoints);

        let scorecard = Scorecard::new()
            .factor("engagement_score", 0.5, quality(&[score], 10.0))
            .factor("techniques", 0.25, coverage(techniques, EXPECTED_TECHNIQUES))
            .factor("checkpoints", 0.25, coverage(checkpoints, EXPECTED_CHECKPOINTS));

        let outputs = StateUpdate::new()
            .set("engagement_strategy", response)
            .set("engagement_predicted_retention_pct", retention)
            .set("engagement_technique_count", techniques)
            .set("engagement_checkpoint_count", checkpoints)
            .set("engagement_score", round_to(score, 2))
            .set_serialized("engagement_checkpoints", &retention_checkpoints(response));
        Extraction::new(outputs, scorecard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::Stage;
    use crate::testing::ScriptedProvider;
    use serde_json::json;

    const STRATEGY: &str = "OVERALL RETENTION STRATEGY\nTarget retention: 72% average, 55% at minute 10\n\nCHECKPOINT 1: 0:30\nDROP-OFF RISK: slow intro\nRETENTION TECHNIQUE: open loop\n\nCHECKPOINT 2: 3:00\nRETENTION TECHNIQUE: pattern interrupt\n\nMore technique notes.";

    #[test]
    fn test_checkpoint_blocks() {
        let checkpoints = retention_checkpoints(STRATEGY);
        assert_eq!(checkpoints.len(), 2);
        assert_eq!(checkpoints[0].line, "CHECKPOINT 1: 0:30");
        assert_eq!(checkpoints[0].details.len(), 2);
        assert_eq!(checkpoints[1].details, vec!["RETENTION TECHNIQUE: pattern interrupt".to_string()]);
    }

    #[test]
    fn test_engagement_score_caps() {
        assert_eq!(engagement_score(2000, 0, 4), 4.0);
        assert_eq!(engagement_score(20_000, 0, 0), 10.0);
    }

    #[tokio::test]
    async fn test_extracts_retention_and_counts() {
        let agent = EngagementOptimizer::new(Arc::new(ScriptedProvider::new([STRATEGY])));
        let state = PipelineState::create(json!({"engagement_assignment": {"topic": "Sleep", "duration_minutes": 12}}))
            .expect("seed");
        let out = agent.run(state).await;

        assert_eq!(out.get_f64("engagement_predicted_retention_pct"), Some(72.0));
        assert_eq!(out.get_u64("engagement_technique_count"), Some(3));
        assert_eq!(out.get_u64("engagement_checkpoint_count"), Some(2));
        assert!(out.confidence("engagement") > 0.0);
    }

    #[tokio::test]
    async fn test_retention_default() {
        let agent = EngagementOptimizer::new(Arc::new(ScriptedProvider::new(["Keep it moving."])));
        let state = PipelineState::create(json!({"engagement_assignment": {}})).expect("seed");
        let out = agent.run(state).await;
        assert_eq!(
            out.get_f64("engagement_predicted_retention_pct"),
            Some(DEFAULT_RETENTION_PCT)
        );
    }
}

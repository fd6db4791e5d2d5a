//! Psychological trigger analysis and the overall viral psychology score.

use std::sync::Arc;

use crate::agents::{Assignment, DEFAULT_AUDIENCE, DEFAULT_DURATION_MINUTES};
use crate::extraction::labels::{try_extract_labeled_number, TRIGGER_EFFECTIVENESS, VIRAL_PSYCHOLOGY};
use crate::llm::LlmProvider;
use crate::prompts::viral::build_psychology_prompt;
use crate::scoring::{coverage, marker, mean, quality, round_to, Scorecard};
use crate::stage::{Extraction, LlmStage, Prompt, StageSettings};
use crate::state::{PipelineState, StateUpdate};

/// Trigger scores expected for full coverage.
const EXPECTED_TRIGGERS: usize = 6;

pub struct PsychologyDetector {
    llm: Arc<dyn LlmProvider>,
    settings: StageSettings,
}

impl std::fmt::Debug for PsychologyDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PsychologyDetector")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl PsychologyDetector {
    pub const NAME: &'static str = "psychology";

    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self {
            llm,
            settings: StageSettings::new(5000, 0.6),
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

/// Scores from `Effectiveness: X/10` lines.
pub fn trigger_scores(analysis: &str) -> Vec<f64> {
    analysis
        .lines()
        .filter(|line| line.contains("/10"))
        .filter_map(|line| try_extract_labeled_number(line, TRIGGER_EFFECTIVENESS.label))
        .collect()
}

impl LlmStage for PsychologyDetector {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn required_keys(&self) -> &[&'static str] {
        &["psychology_assignment"]
    }

    fn settings(&self) -> &StageSettings {
        &self.settings
    }

    fn provider(&self) -> &dyn LlmProvider {
        self.llm.as_ref()
    }

    fn build_prompt(&self, state: &PipelineState) -> Prompt {
        let assignment = Assignment::of(state, Self::NAME);
        build_psychology_prompt(
            &assignment.text("topic", ""),
            &assignment.text("target_audience", DEFAULT_AUDIENCE),
            assignment.number("duration_minutes", DEFAULT_DURATION_MINUTES),
            &assignment.text("research_context", ""),
            &assignment.text("hooks", ""),
            &assignment.text("engagement", ""),
        )
    }

    fn extract(&self, _state: &PipelineState, response: &str) -> Extraction {
        let viral_score = VIRAL_PSYCHOLOGY.extract(response);
        let scores = trigger_scores(response);
        let average = mean(&scores).unwrap_or(TRIGGER_EFFECTIVENESS.default);
        let impact = (viral_score + average) / 2.0;

        let scorecard = Scorecard::new()
            .factor("trigger_coverage", 0.5, coverage(scores.len(), EXPECTED_TRIGGERS))
            .factor("trigger_quality", 0.3, quality(&scores, 10.0))
            .factor("overall_label", 0.2, marker(VIRAL_PSYCHOLOGY.is_present(response)));

        let outputs = StateUpdate::new()
            .set("psychology_triggers", response)
            .set("psychology_viral_score", viral_score)
            .set("psychology_trigger_count", scores.len())
            .set("psychology_avg_effectiveness", round_to(average, 2))
            .set("psychology_impact_score", round_to(impact, 2))
            .set("psychology_trigger_scores", scores);
        Extraction::new(outputs, scorecard)
    }
}

//! Shot-by-shot visual plan for the script.

use std::sync::Arc;

use crate::agents::{Assignment, DEFAULT_DURATION_MINUTES};
use crate::extraction::count_exact;
use crate::llm::LlmProvider;
use crate::prompts::synthesis::build_visual_prompt;
use crate::scoring::{quality, round_to, Scorecard};
use crate::stage::{Extraction, LlmStage, Prompt, StageSettings};
use crate::state::{PipelineState, StateUpdate};

pub struct VisualArchitect {
    llm: Arc<dyn LlmProvider>,
    settings: StageSettings,
}

impl std::fmt::Debug for VisualArchitect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisualArchitect")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl VisualArchitect {
    pub const NAME: &'static str = "visual";

    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self {
            llm,
            settings: StageSettings::new(7000, 0.75),
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

/// 0-10 score for a visual plan with `scenes` and `shots` markers.
pub fn visual_quality(plan: &str, scenes: usize, shots: usize, duration_minutes: f64) -> f64 {
    let mut score = 0.0;
    if scenes as f64 >= duration_minutes * 0.5 {
        score += 3.0;
    } else if scenes > 0 {
        score += 1.5;
    }
    if shots >= scenes * 2 {
        score += 2.5;
    } else if shots > 0 {
        score += 1.0;
    }
    if plan.contains("B-ROLL") {
        score += 1.5;
    }
    if plan.contains("GRAPHICS") || plan.contains("ANIMATION") {
        score += 1.0;
    }
    if plan.contains("LIGHTING") {
        score += 1.0;
    }
    if plan.contains("COLOR") {
        score += 1.0;
    }
    f64::min(score, 10.0)
}

impl LlmStage for VisualArchitect {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn required_keys(&self) -> &[&'static str] {
        &["visual_assignment"]
    }

    fn settings(&self) -> &StageSettings {
        &self.settings
    }

    fn provider(&self) -> &dyn LlmProvider {
        self.llm.as_ref()
    }

    fn build_prompt(&self, state: &PipelineState) -> Prompt {
        let assignment = Assignment::of(state, Self::NAME);
        build_visual_prompt(
            &assignment.text("topic", ""),
            assignment.number("duration_minutes", DEFAULT_DURATION_MINUTES),
            &assignment.text("script", ""),
            &assignment.text("engagement", ""),
        )
    }

    fn extract(&self, state: &PipelineState, response: &str) -> Extraction {
        let duration =
            Assignment::of(state, Self::NAME).number("duration_minutes", DEFAULT_DURATION_MINUTES);
        let scenes = count_exact(response, "SCENE");
        let shots = count_exact(response, "SHOT");
        let score = visual_quality(response, scenes, shots, duration);

        let scorecard = Scorecard::new().factor("quality", 1.0, quality(&[score], 10.0));
        let outputs = StateUpdate::new()
            .set("visual_architecture", response)
            .set("visual_scene_count", scenes)
            .set("visual_shot_count", shots)
            .set("visual_quality_score", round_to(score, 2));
        Extraction::new(outputs, scorecard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::Stage;
    use crate::testing::ScriptedProvider;
    use serde_json::json;

    const PLAN: &str = "SCENE 1: Cold open\nSHOT 1: wide\nSHOT 2: close-up\nB-ROLL NEEDED: telescopes\nLIGHTING MOOD: low key\n\nSCENE 2: The problem\nSHOT 1: drone\nGRAPHICS/ANIMATIONS: rotation curve\nCOLOR PALETTE: deep blue";

    #[test]
    fn test_quality_caps_and_partial_credit() {
        // 2 scenes for 4 minutes meets the half-per-minute bar; 3 shots < 4
        assert_eq!(visual_quality(PLAN, 2, 3, 4.0), 3.0 + 1.0 + 1.5 + 1.0 + 1.0 + 1.0);
        assert_eq!(visual_quality("", 0, 0, 10.0), 2.5);
        assert_eq!(visual_quality("B-ROLL GRAPHICS LIGHTING COLOR", 20, 60, 10.0), 10.0);
    }

    #[tokio::test]
    async fn test_counts_scenes_and_shots() {
        let agent = VisualArchitect::new(Arc::new(ScriptedProvider::new([PLAN])));
        let state = PipelineState::create(json!({"visual_assignment": {"topic": "Dark Matter", "duration_minutes": 4}}))
            .expect("seed");
        let out = agent.run(state).await;

        assert_eq!(out.get_u64("visual_scene_count"), Some(2));
        assert_eq!(out.get_u64("visual_shot_count"), Some(3));
        assert_eq!(out.get_f64("visual_quality_score"), Some(8.5));
        assert_eq!(out.confidence("visual"), 0.85);
    }
}

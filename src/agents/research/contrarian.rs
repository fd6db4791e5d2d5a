//! Legitimate minority viewpoints that add nuance without denying facts.

use std::sync::Arc;

use serde_json::{json, Value};

use crate::agents::{loose_f64, Assignment};
use crate::extraction::parse_json_response;
use crate::llm::LlmProvider;
use crate::prompts::research::build_contrarian_prompt;
use crate::scoring::{coverage, quality, Scorecard};
use crate::stage::{Extraction, LlmStage, Prompt, StageSettings};
use crate::state::{PipelineState, StateUpdate};

const EXPECTED_VIEWPOINTS: usize = 3;

pub struct ContrarianHunter {
    llm: Arc<dyn LlmProvider>,
    settings: StageSettings,
}

impl std::fmt::Debug for ContrarianHunter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContrarianHunter")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl ContrarianHunter {
    pub const NAME: &'static str = "contrarian";

    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self {
            llm,
            settings: StageSettings::new(2000, 0.5),
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

impl LlmStage for ContrarianHunter {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn required_keys(&self) -> &[&'static str] {
        &["contrarian_assignment"]
    }

    fn settings(&self) -> &StageSettings {
        &self.settings
    }

    fn provider(&self) -> &dyn LlmProvider {
        self.llm.as_ref()
    }

    fn build_prompt(&self, state: &PipelineState) -> Prompt {
        let assignment = Assignment::of(state, Self::NAME);
        build_contrarian_prompt(
            &assignment.text("topic", ""),
            &assignment.list("mainstream_findings"),
        )
    }

    fn extract(&self, _state: &PipelineState, response: &str) -> Extraction {
        let parsed = parse_json_response(response).unwrap_or(Value::Null);
        let viewpoints: Vec<Value> = parsed
            .get("contrarian_viewpoints")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let debates: Vec<Value> = parsed
            .get("ongoing_debates")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let credibility: Vec<f64> = viewpoints
            .iter()
            .filter_map(|v| loose_f64(v.get("credibility_score")))
            .collect();

        let scorecard = Scorecard::new()
            .factor("viewpoints", 0.5, coverage(viewpoints.len(), EXPECTED_VIEWPOINTS))
            .factor("credibility", 0.5, quality(&credibility, 10.0));

        let outputs = StateUpdate::new()
            .set("contrarian_count", viewpoints.len())
            .set(
                "contrarian_findings",
                json!({"contrarian_viewpoints": viewpoints, "ongoing_debates": debates}),
            );
        Extraction::new(outputs, scorecard)
    }
}

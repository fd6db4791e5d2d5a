//! The story behind the facts: a dated timeline and an evolution narrative.

use std::sync::Arc;

use serde_json::{json, Value};

use crate::agents::Assignment;
use crate::extraction::parse_json_response;
use crate::llm::LlmProvider;
use crate::prompts::research::build_historical_prompt;
use crate::scoring::{coverage, coverage_f64, Scorecard};
use crate::stage::{Extraction, LlmStage, Prompt, StageSettings};
use crate::state::{PipelineState, StateUpdate};

const EXPECTED_EVENTS: usize = 8;
const EXPECTED_NARRATIVE_CHARS: f64 = 500.0;

pub struct HistoricalMiner {
    llm: Arc<dyn LlmProvider>,
    settings: StageSettings,
}

impl std::fmt::Debug for HistoricalMiner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoricalMiner")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl HistoricalMiner {
    pub const NAME: &'static str = "historical";

    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self {
            llm,
            settings: StageSettings::new(2000, 0.6),
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

impl LlmStage for HistoricalMiner {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn required_keys(&self) -> &[&'static str] {
        &["historical_assignment"]
    }

    fn settings(&self) -> &StageSettings {
        &self.settings
    }

    fn provider(&self) -> &dyn LlmProvider {
        self.llm.as_ref()
    }

    fn build_prompt(&self, state: &PipelineState) -> Prompt {
        build_historical_prompt(&Assignment::of(state, Self::NAME).text("topic", ""))
    }

    fn extract(&self, _state: &PipelineState, response: &str) -> Extraction {
        let parsed = parse_json_response(response).unwrap_or(Value::Null);
        let timeline: Vec<Value> = parsed
            .get("historical_timeline")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let narrative = parsed
            .get("evolution_narrative")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let surprising: Vec<Value> = parsed
            .get("surprising_facts")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let scorecard = Scorecard::new()
            .factor("timeline", 0.6, coverage(timeline.len(), EXPECTED_EVENTS))
            .factor(
                "narrative",
                0.4,
                coverage_f64(narrative.chars().count() as f64, EXPECTED_NARRATIVE_CHARS),
            );

        let outputs = StateUpdate::new()
            .set("historical_event_count", timeline.len())
            .set(
                "historical_findings",
                json!({
                    "historical_timeline": timeline,
                    "evolution_narrative": narrative,
                    "surprising_facts": surprising,
                }),
            );
        Extraction::new(outputs, scorecard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::Stage;
    use crate::testing::ScriptedProvider;

    #[tokio::test]
    async fn test_timeline_and_narrative() {
        let events: Vec<Value> = (0..4)
            .map(|i| json!({"year": 1900 + i, "event": "e", "drama_factor": 7}))
            .collect();
        let response = json!({
            "historical_timeline": events,
            "evolution_narrative": "x".repeat(250),
            "surprising_facts": ["one"]
        })
        .to_string();
        let agent = HistoricalMiner::new(Arc::new(ScriptedProvider::new([response])));
        let state = PipelineState::create(json!({"historical_assignment": {"topic": "Vaccines"}}))
            .expect("seed");

        let out = agent.run(state).await;
        assert_eq!(out.get_u64("historical_event_count"), Some(4));
        // 4/8 * 0.6 + 250/500 * 0.4
        assert!((out.confidence("historical") - 0.5).abs() < 1e-9);
        assert_eq!(
            out.get("historical_findings").map(|f| &f["surprising_facts"]),
            Some(&json!(["one"]))
        );
    }

    #[tokio::test]
    async fn test_narrative_saturates() {
        let response = json!({"evolution_narrative": "y".repeat(2000)}).to_string();
        let agent = HistoricalMiner::new(Arc::new(ScriptedProvider::new([response])));
        let state = PipelineState::create(json!({"historical_assignment": {}})).expect("seed");
        let out = agent.run(state).await;
        assert!((out.confidence("historical") - 0.4).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_prose_reply_extracts_nothing() {
        let agent = HistoricalMiner::new(Arc::new(ScriptedProvider::new([
            "In 1933 Zwicky noticed the Coma cluster moving too fast. Historical event: missing mass.",
        ])));
        let state = PipelineState::create(json!({"historical_assignment": {"topic": "Dark Matter"}}))
            .expect("seed");
        let out = agent.run(state).await;

        assert!(out.errors().is_empty());
        assert_eq!(out.get_u64("historical_event_count"), Some(0));
        assert_eq!(out.confidence("historical"), 0.0);
        assert_eq!(
            out.get("historical_findings").map(|f| &f["historical_timeline"]),
            Some(&json!([]))
        );
    }
}

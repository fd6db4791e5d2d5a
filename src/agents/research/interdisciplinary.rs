//! Cross-field connections that make the topic relatable.

use std::sync::Arc;

use serde_json::{json, Value};

use crate::agents::{loose_f64, Assignment};
use crate::extraction::parse_json_response;
use crate::llm::LlmProvider;
use crate::prompts::research::build_interdisciplinary_prompt;
use crate::scoring::{coverage, quality, Scorecard};
use crate::stage::{Extraction, LlmStage, Prompt, StageSettings};
use crate::state::{PipelineState, StateUpdate};

/// Connections expected for full coverage.
const EXPECTED_CONNECTIONS: usize = 5;

pub struct InterdisciplinaryConnector {
    llm: Arc<dyn LlmProvider>,
    settings: StageSettings,
}

impl std::fmt::Debug for InterdisciplinaryConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterdisciplinaryConnector")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl InterdisciplinaryConnector {
    pub const NAME: &'static str = "interdisciplinary";

    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self {
            llm,
            settings: StageSettings::new(2000, 0.8),
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

/// `storytelling_value` of every key insight across all connections.
fn storytelling_values(connections: &[Value]) -> Vec<f64> {
    connections
        .iter()
        .filter_map(|c| c.get("key_insights").and_then(Value::as_array))
        .flatten()
        .filter_map(|insight| loose_f64(insight.get("storytelling_value")))
        .collect()
}

impl LlmStage for InterdisciplinaryConnector {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn required_keys(&self) -> &[&'static str] {
        &["interdisciplinary_assignment"]
    }

    fn settings(&self) -> &StageSettings {
        &self.settings
    }

    fn provider(&self) -> &dyn LlmProvider {
        self.llm.as_ref()
    }

    fn build_prompt(&self, state: &PipelineState) -> Prompt {
        let assignment = Assignment::of(state, Self::NAME);
        build_interdisciplinary_prompt(&assignment.text("topic", ""), &assignment.list("fields"))
    }

    fn extract(&self, _state: &PipelineState, response: &str) -> Extraction {
        let connections: Vec<Value> = parse_json_response(response)
            .and_then(|v| v.get("connections").and_then(Value::as_array).cloned())
            .unwrap_or_default();
        let values = storytelling_values(&connections);

        let scorecard = Scorecard::new()
            .factor("connections", 0.5, coverage(connections.len(), EXPECTED_CONNECTIONS))
            .factor("storytelling", 0.5, quality(&values, 10.0));

        let fields: Vec<Value> = connections
            .iter()
            .filter_map(|c| c.get("field").cloned())
            .collect();
        let outputs = StateUpdate::new()
            .set("interdisciplinary_count", connections.len())
            .set("interdisciplinary_fields", Value::Array(fields))
            .set("interdisciplinary_findings", json!(connections));
        Extraction::new(outputs, scorecard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::Stage;
    use crate::testing::ScriptedProvider;

    #[tokio::test]
    async fn test_scores_connections_and_storytelling() {
        let response = json!({"connections": [
            {"field": "Music", "key_insights": [{"insight": "a", "storytelling_value": 9}, {"insight": "b", "storytelling_value": 7}]},
            {"field": "Economics", "key_insights": [{"insight": "c", "storytelling_value": "8"}]},
        ]})
        .to_string();
        let provider = Arc::new(ScriptedProvider::new([response]));
        let agent = InterdisciplinaryConnector::new(provider.clone());
        let state = PipelineState::create(json!({
            "interdisciplinary_assignment": {"topic": "Entropy", "fields": ["Music", "Economics"]}
        }))
        .expect("seed");

        let out = agent.run(state).await;
        assert_eq!(out.get_u64("interdisciplinary_count"), Some(2));
        assert_eq!(out.get("interdisciplinary_fields"), Some(&json!(["Music", "Economics"])));
        // 2/5 * 0.5 + 0.8 * 0.5
        assert!((out.confidence("interdisciplinary") - 0.6).abs() < 1e-9);
        assert!(provider.requests()[0].messages[1].content.contains("- Economics"));
    }

    #[tokio::test]
    async fn test_missing_assignment() {
        let agent = InterdisciplinaryConnector::new(Arc::new(ScriptedProvider::new(["{}"])));
        let out = agent.run(PipelineState::new()).await;
        assert_eq!(out.confidence("interdisciplinary"), 0.0);
        assert_eq!(out.errors(), ["interdisciplinary: missing required inputs".to_string()]);
    }
}

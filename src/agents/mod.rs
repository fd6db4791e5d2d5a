//! Gatekeepers and their subagents.
//!
//! Three gatekeepers run in order, each owning a fixed list of subagents:
//!
//! - [`research::ResearchGatekeeper`]: academic, interdisciplinary,
//!   historical, contrarian and accessibility
//! - [`viral::ViralGatekeeper`]: pattern, hook, engagement and psychology
//! - [`synthesis::SynthesisGatekeeper`]: retrieval, script, visual and
//!   production notes
//!
//! A gatekeeper hands each subagent a `<subagent>_assignment` object built
//! from its own inputs, runs it, and folds the subagent's namespaced outputs
//! back into its own state with [`PipelineState::changes_since`].

pub mod research;
pub mod synthesis;
pub mod viral;

pub use research::{
    AcademicSpecialist, AccessibilityTranslator, ContrarianHunter, HistoricalMiner,
    InterdisciplinaryConnector, ResearchGatekeeper,
};
pub use synthesis::{
    ProductionNotesGenerator, RetrievalAgent, ScriptWriter, SynthesisGatekeeper,
    VisualArchitect,
};
pub use viral::{
    EngagementOptimizer, HookGenerator, PatternAnalyzer, PsychologyDetector, ViralGatekeeper,
};

use serde_json::{Map, Value};

use crate::stage::Stage;
use crate::state::PipelineState;

/// Audience used when the seed does not name one.
pub const DEFAULT_AUDIENCE: &str = "general audience";

/// Video style used when the seed does not name one.
pub const DEFAULT_STYLE: &str = "documentary";

/// Video length used when the seed does not give `duration_minutes`.
pub const DEFAULT_DURATION_MINUTES: f64 = 30.0;

/// Read access to a `<subagent>_assignment` object.
///
/// Text lookups fall back to the top-level state, so a subagent run on its
/// own with just `topic` set still sees the topic.
#[derive(Debug, Clone, Copy)]
pub struct Assignment<'a> {
    fields: Option<&'a Map<String, Value>>,
    state: &'a PipelineState,
}

impl<'a> Assignment<'a> {
    pub fn of(state: &'a PipelineState, subagent: &str) -> Self {
        Self {
            fields: state.get_object(&format!("{}_assignment", subagent)),
            state,
        }
    }

    pub fn value(&self, key: &str) -> Option<&'a Value> {
        self.fields.and_then(|fields| fields.get(key))
    }

    /// Assignment text, then state text, then `default`.
    pub fn text(&self, key: &str, default: &str) -> String {
        match self.value(key) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => self.state.text_or(key, default),
            Some(other) => other.to_string(),
        }
    }

    pub fn number(&self, key: &str, default: f64) -> f64 {
        self.value(key)
            .and_then(Value::as_f64)
            .or_else(|| self.state.get_f64(key))
            .unwrap_or(default)
    }

    /// Elements of an array field rendered as text.
    pub fn list(&self, key: &str) -> Vec<String> {
        self.array(key).iter().map(value_text).collect()
    }

    pub fn array(&self, key: &str) -> Vec<Value> {
        self.value(key)
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default()
    }
}

/// Strings verbatim, everything else as compact JSON.
pub fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Numbers, or numeric strings such as `"2021"` or `"8.5"`.
pub fn loose_f64(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// `duration_minutes` from the seed, or the default.
pub fn duration_minutes(state: &PipelineState) -> f64 {
    state
        .get_f64("duration_minutes")
        .filter(|d| d.is_finite() && *d > 0.0)
        .unwrap_or(DEFAULT_DURATION_MINUTES)
}

/// Runs `subagent` on `base` plus its assignment and folds what it wrote
/// into `folded`.
pub(crate) async fn run_subagent(
    subagent: &dyn Stage,
    base: &PipelineState,
    folded: PipelineState,
    assignment: Value,
) -> PipelineState {
    let name = subagent.name().to_string();
    let input = crate::stage::with_assignment(base, &name, assignment);
    tracing::debug!(subagent = %name, "Dispatching subagent");
    let output = subagent.run(input.clone()).await;
    tracing::debug!(
        subagent = %name,
        confidence = output.confidence(&name),
        "Subagent returned"
    );
    folded.merge(output.changes_since(&input))
}

/// Mean confidence over the named stages; stages that never ran count as 0.
pub fn mean_confidence(state: &PipelineState, names: &[&str]) -> f64 {
    if names.is_empty() {
        return 0.0;
    }
    names.iter().map(|name| state.confidence(name)).sum::<f64>() / names.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_assignment_falls_back_to_state() {
        let state = PipelineState::create(json!({
            "topic": "Dark Matter",
            "hook_assignment": {"hook_count": 5, "patterns": ["a", {"b": 1}]}
        }))
        .expect("seed");
        let assignment = Assignment::of(&state, "hook");
        assert_eq!(assignment.text("topic", ""), "Dark Matter");
        assert_eq!(assignment.number("hook_count", 7.0), 5.0);
        assert_eq!(assignment.list("patterns"), vec!["a".to_string(), "{\"b\":1}".to_string()]);

        let missing = Assignment::of(&state, "pattern");
        assert_eq!(missing.number("hook_count", 7.0), 7.0);
        assert!(missing.list("patterns").is_empty());
    }

    #[test]
    fn test_loose_f64() {
        assert_eq!(loose_f64(Some(&json!("2021"))), Some(2021.0));
        assert_eq!(loose_f64(Some(&json!(8.5))), Some(8.5));
        assert_eq!(loose_f64(Some(&json!("n.d."))), None);
        assert_eq!(loose_f64(None), None);
    }

    #[test]
    fn test_mean_confidence() {
        let state = PipelineState::create(json!({"a_confidence": 1.0, "b_confidence": 0.5}))
            .expect("seed");
        assert_eq!(mean_confidence(&state, &["a", "b"]), 0.75);
        assert_eq!(mean_confidence(&state, &["a", "c"]), 0.5);
        assert_eq!(mean_confidence(&state, &[]), 0.0);
    }

    #[test]
    fn test_duration_default() {
        let state = PipelineState::create(json!({"duration_minutes": 0})).expect("seed");
        assert_eq!(duration_minutes(&state), DEFAULT_DURATION_MINUTES);
    }
}

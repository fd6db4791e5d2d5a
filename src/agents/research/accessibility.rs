//! Turns academic findings into hooks, analogies and plain language.
//!
//! All findings go out in one batched call. Translations that reach the
//! engagement threshold are kept; the rest are reported in the stats only.
//! With nothing to translate the stage fails before calling the model.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::agents::{loose_f64, value_text, Assignment, DEFAULT_AUDIENCE};
use crate::extraction::parse_json_response;
use crate::llm::LlmProvider;
use crate::prompts::research::build_accessibility_prompt;
use crate::scoring::{coverage, mean, quality, round_to, Scorecard};
use crate::stage::{call_llm, complete, fail, validate, Stage, StageSettings, StageStatus, StageTracker};
use crate::state::{PipelineState, StateUpdate};

/// Default minimum `engagement_score` for a kept translation.
pub const DEFAULT_ENGAGEMENT_THRESHOLD: f64 = 7.0;

/// Distinct hook types expected across kept translations.
const EXPECTED_HOOK_TYPES: usize = 4;

pub struct AccessibilityTranslator {
    llm: Arc<dyn LlmProvider>,
    settings: StageSettings,
}

impl std::fmt::Debug for AccessibilityTranslator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessibilityTranslator")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl AccessibilityTranslator {
    pub const NAME: &'static str = "accessibility";

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

/// Prompt text for one academic finding.
fn finding_text(finding: &Value) -> String {
    let Some(paper) = finding.as_object() else {
        return value_text(finding);
    };
    let mut parts = Vec::new();
    if let Some(title) = paper.get("title") {
        parts.push(value_text(title));
    }
    if let Some(summary) = paper.get("abstract") {
        parts.push(value_text(summary));
    }
    if let Some(key_findings) = paper.get("key_findings").and_then(Value::as_array) {
        parts.extend(key_findings.iter().map(|k| format!("Key finding: {}", value_text(k))));
    }
    if parts.is_empty() {
        value_text(finding)
    } else {
        parts.join("\n")
    }
}

fn translations_from(response: &str) -> Vec<Value> {
    match parse_json_response(response) {
        Some(Value::Object(mut obj)) => match obj.remove("translations") {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        Some(Value::Array(items)) => items,
        _ => Vec::new(),
    }
}

fn score_of(translation: &Value, key: &str) -> f64 {
    loose_f64(translation.get(key)).unwrap_or(0.0)
}

/// Outputs and confidence for a batch of translations of `total` findings.
pub(crate) fn assess_translations(
    translations: Vec<Value>,
    total: usize,
    threshold: f64,
) -> (StateUpdate, Scorecard) {
    let (kept, dropped): (Vec<Value>, Vec<Value>) = translations
        .into_iter()
        .partition(|t| score_of(t, "engagement_score") >= threshold);

    let engagement: Vec<f64> = kept.iter().map(|t| score_of(t, "engagement_score")).collect();
    let viral: Vec<f64> = kept.iter().map(|t| score_of(t, "viral_potential")).collect();
    let hook_types: BTreeSet<String> = kept
        .iter()
        .filter_map(|t| t.pointer("/hook/type").map(value_text))
        .collect();

    let scorecard = Scorecard::new()
        .factor("kept_share", 0.3, coverage(kept.len(), total))
        .factor("engagement", 0.4, quality(&engagement, 10.0))
        .factor("viral_potential", 0.2, quality(&viral, 10.0))
        .factor("hook_variety", 0.1, coverage(hook_types.len(), EXPECTED_HOOK_TYPES));

    let outputs = StateUpdate::new()
        .set(
            "accessibility_stats",
            json!({
                "total_translated": kept.len() + dropped.len(),
                "high_engagement": kept.len(),
                "avg_engagement": mean(&engagement).map_or(0.0, |m| round_to(m, 2)),
                "avg_viral_potential": mean(&viral).map_or(0.0, |m| round_to(m, 2)),
            }),
        )
        .set("accessibility_hook_types", json!(hook_types))
        .set("accessibility_translations", Value::Array(kept));
    (outputs, scorecard)
}

#[async_trait]
impl Stage for AccessibilityTranslator {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn required_keys(&self) -> &[&'static str] {
        &["accessibility_assignment"]
    }

    async fn run(&self, state: PipelineState) -> PipelineState {
        let mut tracker = StageTracker::new(Self::NAME);
        tracker.advance(StageStatus::Validating);
        if let Err(invalid) = validate(Self::NAME, self.required_keys(), &state) {
            tracker.advance(StageStatus::Invalid);
            return invalid;
        }

        let assignment = Assignment::of(&state, Self::NAME);
        let findings: Vec<String> = assignment
            .array("academic_findings")
            .iter()
            .map(finding_text)
            .collect();
        if findings.is_empty() {
            tracker.advance(StageStatus::Invalid);
            return fail(&state, Self::NAME, "no academic findings to translate");
        }
        let audience = assignment.text("target_audience", DEFAULT_AUDIENCE);
        let threshold =
            assignment.number("engagement_threshold", DEFAULT_ENGAGEMENT_THRESHOLD);

        tracker.advance(StageStatus::CallingLlm);
        let prompt = build_accessibility_prompt(&findings, &audience);
        let response = match call_llm(self.llm.as_ref(), &self.settings, &prompt).await {
            Ok(text) => text,
            Err(e) => {
                tracker.advance(StageStatus::LlmFailed);
                return fail(&state, Self::NAME, &e.to_string());
            }
        };

        tracker.advance(StageStatus::Extracting);
        let (outputs, scorecard) =
            assess_translations(translations_from(&response), findings.len(), threshold);

        tracker.advance(StageStatus::Scoring);
        let confidence = if response.trim().is_empty() {
            0.0
        } else {
            scorecard.rounded()
        };
        tracker.advance(StageStatus::Done);
        complete(&state, Self::NAME, outputs, confidence)
    }
}

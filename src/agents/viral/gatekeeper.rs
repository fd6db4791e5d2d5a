//! Viral analysis gatekeeper.
//!
//! Makes its own analysis call, then runs pattern, hook, engagement and
//! psychology in that order, each seeing what the previous ones produced.
//! Confidence blends structural markers in the analysis with the mean
//! subagent confidence.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{EngagementOptimizer, HookGenerator, PatternAnalyzer, PsychologyDetector};
use super::hooks::DEFAULT_HOOK_COUNT;
use crate::agents::{duration_minutes, mean_confidence, run_subagent, DEFAULT_AUDIENCE};
use crate::extraction::contains_any;
use crate::llm::LlmProvider;
use crate::prompts::viral::build_viral_analysis_prompt;
use crate::scoring::{marker, Scorecard};
use crate::stage::{
    call_llm, complete, fail, validate, Stage, StageSettings, StageStatus, StageTracker,
};
use crate::state::{PipelineState, StateUpdate};

/// Confidence at which the viral plan is ready for synthesis.
pub const READY_THRESHOLD: f64 = 0.75;

/// Analyses longer than this earn the length marker.
const MIN_ANALYSIS_CHARS: usize = 500;

const SUBAGENTS: [&str; 4] = [
    PatternAnalyzer::NAME,
    HookGenerator::NAME,
    EngagementOptimizer::NAME,
    PsychologyDetector::NAME,
];

/// Research text handed to the viral prompts: the report when there is one,
/// otherwise the raw findings.
pub fn research_context(state: &PipelineState) -> String {
    match state.get_str("research_report") {
        Some(report) if !report.trim().is_empty() => report.to_string(),
        _ => state.text_or("research_findings", ""),
    }
}

/// Share of the five structural markers present in the analysis.
pub fn marker_factor(analysis: &str) -> f64 {
    let markers = [
        contains_any(analysis, &["hook"]),
        contains_any(analysis, &["viral"]),
        contains_any(analysis, &["trigger", "psychological"]),
        contains_any(analysis, &["engagement"]),
        analysis.chars().count() > MIN_ANALYSIS_CHARS,
    ];
    markers.iter().map(|present| marker(*present) * 0.2).sum()
}

pub struct ViralGatekeeper {
    llm: Arc<dyn LlmProvider>,
    settings: StageSettings,
    pattern: PatternAnalyzer,
    hook: HookGenerator,
    engagement: EngagementOptimizer,
    psychology: PsychologyDetector,
}

impl std::fmt::Debug for ViralGatekeeper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViralGatekeeper")
            .field("settings", &self.settings)
            .field("subagents", &SUBAGENTS)
            .finish_non_exhaustive()
    }
}

impl ViralGatekeeper {
    pub const NAME: &'static str = "viral";

    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self {
            settings: StageSettings::new(4000, 0.5),
            pattern: PatternAnalyzer::new(Arc::clone(&llm)),
            hook: HookGenerator::new(Arc::clone(&llm)),
            engagement: EngagementOptimizer::new(Arc::clone(&llm)),
            psychology: PsychologyDetector::new(Arc::clone(&llm)),
            llm,
        }
    }

    pub fn with_settings(mut self, settings: StageSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Uses `model` for the gatekeeper and every subagent.
    pub fn with_model(self, model: &str) -> Self {
        Self {
            settings: self.settings.with_model(model),
            pattern: self.pattern.with_model(model),
            hook: self.hook.with_model(model),
            engagement: self.engagement.with_model(model),
            psychology: self.psychology.with_model(model),
            llm: self.llm,
        }
    }

    pub fn subagents(&self) -> &'static [&'static str] {
        &SUBAGENTS
    }

    async fn dispatch(&self, base: &PipelineState, research: &str) -> PipelineState {
        let topic = base.text_or("topic", "");
        let audience = base.text_or("target_audience", DEFAULT_AUDIENCE);
        let duration = duration_minutes(base);

        let folded = run_subagent(
            &self.pattern,
            base,
            base.clone(),
            json!({
                "topic": topic,
                "target_audience": audience,
                "research_context": research,
            }),
        )
        .await;

        let patterns = folded.text_or("pattern_analysis", "");
        let folded = run_subagent(
            &self.hook,
            base,
            folded,
            json!({
                "topic": topic,
                "target_audience": audience,
                "research_context": research,
                "patterns": patterns,
                "hook_count": DEFAULT_HOOK_COUNT,
            }),
        )
        .await;

        let hooks = folded.text_or("hook_text", "");
        let folded = run_subagent(
            &self.engagement,
            base,
            folded,
            json!({
                "topic": topic,
                "target_audience": audience,
                "duration_minutes": duration,
                "research_context": research,
                "patterns": patterns,
                "hooks": hooks,
            }),
        )
        .await;

        let engagement = folded.text_or("engagement_strategy", "");
        run_subagent(
            &self.psychology,
            base,
            folded,
            json!({
                "topic": topic,
                "target_audience": audience,
                "duration_minutes": duration,
                "research_context": research,
                "hooks": hooks,
                "engagement": engagement,
            }),
        )
        .await
    }
}

/// Summary numbers from the four subagents.
fn components(state: &PipelineState) -> Value {
    let value = |key: &str| state.get(key).cloned().unwrap_or(Value::Null);
    let confidences: serde_json::Map<String, Value> = SUBAGENTS
        .iter()
        .map(|name| (name.to_string(), json!(state.confidence(name))))
        .collect();
    json!({
        "pattern_count": value("pattern_count"),
        "hook_count": value("hook_count"),
        "hook_effectiveness_avg": value("hook_effectiveness_avg"),
        "hook_best": value("hook_best"),
        "predicted_retention_pct": value("engagement_predicted_retention_pct"),
        "engagement_score": value("engagement_score"),
        "checkpoint_count": value("engagement_checkpoint_count"),
        "viral_psychology_score": value("psychology_viral_score"),
        "psychological_impact_score": value("psychology_impact_score"),
        "subagent_confidence": confidences,
    })
}

#[async_trait]
impl Stage for ViralGatekeeper {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn required_keys(&self) -> &[&'static str] {
        &["topic"]
    }

    async fn run(&self, state: PipelineState) -> PipelineState {
        let mut tracker = StageTracker::new(Self::NAME);
        tracker.advance(StageStatus::Validating);
        if let Err(invalid) = validate(Self::NAME, self.required_keys(), &state) {
            tracker.advance(StageStatus::Invalid);
            return invalid;
        }

        let topic = state.text_or("topic", "");
        let research = research_context(&state);

        tracker.advance(StageStatus::CallingLlm);
        let prompt = build_viral_analysis_prompt(
            &topic,
            &state.text_or("target_audience", DEFAULT_AUDIENCE),
            &research,
        );
        let analysis = match call_llm(self.llm.as_ref(), &self.settings, &prompt).await {
            Ok(text) => text,
            Err(e) => {
                tracker.advance(StageStatus::LlmFailed);
                return fail(&state, Self::NAME, &e.to_string());
            }
        };

        tracker.advance(StageStatus::Extracting);
        let folded = self.dispatch(&state, &research).await;

        tracker.advance(StageStatus::Scoring);
        let subagent_mean = mean_confidence(&folded, &SUBAGENTS);
        let scorecard = Scorecard::new()
            .factor("analysis_markers", 0.5, marker_factor(&analysis))
            .factor("subagents", 0.5, subagent_mean);
        let confidence = if analysis.trim().is_empty() {
            0.0
        } else {
            scorecard.rounded()
        };
        tracing::debug!(stage = Self::NAME, factors = ?scorecard.factors(), "Confidence factors");

        tracker.advance(StageStatus::Done);
        let outputs = StateUpdate::new()
            .set("viral_components", components(&folded))
            .set("viral_analysis", analysis)
            .set("viral_optimization_ready", confidence >= READY_THRESHOLD);
        complete(&folded, Self::NAME, outputs, confidence)
    }
}

//! Content synthesis gatekeeper.
//!
//! Makes no LLM call of its own. Runs retrieval, script, visual and
//! production notes in order; the script is the only hard dependency, so a
//! failed script skips the two stages built on it.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use super::retrieval::DEFAULT_TOP_K;
use super::{ProductionNotesGenerator, RetrievalAgent, ScriptWriter, VisualArchitect};
use crate::agents::viral::gatekeeper::research_context;
use crate::agents::{duration_minutes, mean_confidence, run_subagent, DEFAULT_AUDIENCE};
use crate::extraction::{contains_any, word_count};
use crate::llm::LlmProvider;
use crate::scoring::{ratio_fit, Scorecard};
use crate::stage::{complete, validate, Stage, StageStatus, StageTracker};
use crate::state::{PipelineState, StateUpdate};
use crate::vector::VectorStore;

/// Confidence at which the package is production ready.
pub const READY_THRESHOLD: f64 = 0.85;

/// Speaking rate the package length is judged against.
pub const PACKAGE_WORDS_PER_MINUTE: f64 = 150.0;

/// Relative word-count deviation that still earns full length credit.
const LENGTH_TOLERANCE: f64 = 0.2;

const SUBAGENTS: [&str; 4] = [
    RetrievalAgent::NAME,
    ScriptWriter::NAME,
    VisualArchitect::NAME,
    ProductionNotesGenerator::NAME,
];

/// Weighted content markers over the assembled package.
const PACKAGE_MARKERS: [(&[&str], f64); 4] = [
    (&["scene", "timecode"], 0.1),
    (&["b-roll", "visual"], 0.1),
    (&["citation", "source"], 0.1),
    (&["music", "production"], 0.05),
];

/// Weighted share of [`PACKAGE_MARKERS`] present in `text`, in `[0, 1]`.
pub fn package_marker_factor(text: &str) -> f64 {
    let total: f64 = PACKAGE_MARKERS.iter().map(|(_, weight)| weight).sum();
    let found: f64 = PACKAGE_MARKERS
        .iter()
        .filter(|(needles, _)| contains_any(text, needles))
        .map(|(_, weight)| weight)
        .sum();
    found / total
}

pub struct SynthesisGatekeeper {
    retrieval: RetrievalAgent,
    script: ScriptWriter,
    visual: VisualArchitect,
    production_notes: ProductionNotesGenerator,
    top_k: usize,
}

impl std::fmt::Debug for SynthesisGatekeeper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SynthesisGatekeeper")
            .field("subagents", &SUBAGENTS)
            .field("top_k", &self.top_k)
            .finish_non_exhaustive()
    }
}

impl SynthesisGatekeeper {
    pub const NAME: &'static str = "synthesis";

    pub fn new(llm: Arc<dyn LlmProvider>, store: Arc<dyn VectorStore>) -> Self {
        Self {
            retrieval: RetrievalAgent::new(store),
            script: ScriptWriter::new(Arc::clone(&llm)),
            visual: VisualArchitect::new(Arc::clone(&llm)),
            production_notes: ProductionNotesGenerator::new(llm),
            top_k: DEFAULT_TOP_K,
        }
    }

    /// Uses `model` for every LLM subagent.
    pub fn with_model(self, model: &str) -> Self {
        Self {
            script: self.script.with_model(model),
            visual: self.visual.with_model(model),
            production_notes: self.production_notes.with_model(model),
            ..self
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn subagents(&self) -> &'static [&'static str] {
        &SUBAGENTS
    }

    async fn dispatch(&self, base: &PipelineState) -> PipelineState {
        let topic = base.text_or("topic", "");
        let audience = base.text_or("target_audience", DEFAULT_AUDIENCE);
        let duration = duration_minutes(base);
        let research = research_context(base);

        let folded = run_subagent(
            &self.retrieval,
            base,
            base.clone(),
            json!({
                "topic": topic,
                "research_excerpt": research,
                "target_audience": audience,
                "top_k": self.top_k,
            }),
        )
        .await;

        let engagement = base.text_or("engagement_strategy", "");
        let folded = run_subagent(
            &self.script,
            base,
            folded.clone(),
            json!({
                "topic": topic,
                "target_audience": audience,
                "duration_minutes": duration,
                "research": research,
                "hooks": base.text_or("hook_text", ""),
                "engagement": engagement,
                "psychology": base.text_or("psychology_triggers", ""),
                "patterns": base.text_or("pattern_analysis", ""),
                "retrieved_context": folded.text_or("retrieved_context", ""),
            }),
        )
        .await;

        let script = match folded.get_str("script_text") {
            Some(script) => script.to_string(),
            None => {
                tracing::warn!(stage = Self::NAME, "No script, skipping visual and production notes");
                return folded;
            }
        };

        let folded = run_subagent(
            &self.visual,
            base,
            folded,
            json!({
                "topic": topic,
                "duration_minutes": duration,
                "script": script,
                "engagement": engagement,
            }),
        )
        .await;

        let visual = folded.text_or("visual_architecture", "");
        run_subagent(
            &self.production_notes,
            base,
            folded,
            json!({
                "topic": topic,
                "duration_minutes": duration,
                "script": script,
                "visual": visual,
            }),
        )
        .await
    }
}

/// The assembled package: texts plus the headline numbers of each part.
fn package(state: &PipelineState, duration: f64) -> Value {
    let value = |key: &str| state.get(key).cloned().unwrap_or(Value::Null);
    let confidences: Map<String, Value> = SUBAGENTS
        .iter()
        .map(|name| (name.to_string(), json!(state.confidence(name))))
        .collect();
    json!({
        "topic": value("topic"),
        "duration_minutes": duration,
        "script": value("script_text"),
        "visual_architecture": value("visual_architecture"),
        "production_notes": value("production_notes_text"),
        "retrieved_context": value("retrieved_context"),
        "script_word_count": value("script_word_count"),
        "script_quality_score": value("script_quality_score"),
        "visual_quality_score": value("visual_quality_score"),
        "production_completeness_score": value("production_notes_completeness_score"),
        "technique_count": value("retrieved_technique_count"),
        "subagent_confidence": confidences,
    })
}

#[async_trait]
impl Stage for SynthesisGatekeeper {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn required_keys(&self) -> &[&'static str] {
        &["topic", "research_findings", "viral_analysis"]
    }

    async fn run(&self, state: PipelineState) -> PipelineState {
        let mut tracker = StageTracker::new(Self::NAME);
        tracker.advance(StageStatus::Validating);
        if let Err(invalid) = validate(Self::NAME, self.required_keys(), &state) {
            tracker.advance(StageStatus::Invalid);
            return invalid;
        }

        tracker.advance(StageStatus::CallingLlm);
        let folded = self.dispatch(&state).await;

        tracker.advance(StageStatus::Extracting);
        let duration = duration_minutes(&state);
        let script = folded.text_or("script_text", "");
        let assembled = [
            script.as_str(),
            folded.get_str("visual_architecture").unwrap_or_default(),
            folded.get_str("production_notes_text").unwrap_or_default(),
        ]
        .join("\n\n");

        tracker.advance(StageStatus::Scoring);
        let confidence = if script.trim().is_empty() {
            0.0
        } else {
            let scorecard = Scorecard::new()
                .factor(
                    "length",
                    0.15,
                    ratio_fit(
                        word_count(&script) as f64,
                        duration * PACKAGE_WORDS_PER_MINUTE,
                        LENGTH_TOLERANCE,
                    ),
                )
                .factor("content_markers", 0.35, package_marker_factor(&assembled))
                .factor("subagents", 0.5, mean_confidence(&folded, &SUBAGENTS));
            tracing::debug!(stage = Self::NAME, factors = ?scorecard.factors(), "Confidence factors");
            scorecard.rounded()
        };

        tracker.advance(StageStatus::Done);
        let outputs = StateUpdate::new()
            .set("synthesis_package", package(&folded, duration))
            .set("production_ready", confidence >= READY_THRESHOLD);
        complete(&folded, Self::NAME, outputs, confidence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FailingProvider, ScriptedProvider};
    use crate::vector::{seed_techniques, InMemoryVectorStore};

    fn seed() -> PipelineState {
        PipelineState::create(json!({
            "topic": "Dark Matter",
            "target_audience": "curious adults",
            "duration_minutes": 2,
            "research_findings": {"academic_sources": []},
            "research_report": "RESEARCH REPORT: Dark Matter\nSource: Rubin 1970",
            "viral_analysis": "Open with the missing mass.",
            "hook_text": "HOOK #1: Where is the rest of the universe?",
            "engagement_strategy": "CHECKPOINT 1: 0:30 open loop"
        }))
        .expect("seed")
    }

    fn script() -> String {
        format!(
            "[00:00-00:30] ACT 1 COLD OPEN\n*Most* of the universe is missing. [PAUSE]\n[00:30-02:00] SECTION 2\nCitation: Rubin 1970. {}",
            "word ".repeat(280)
        )
    }

    const VISUAL: &str = "SCENE 1: Cold open\nTIMECODE: 00:00-00:30\nSHOT 1: wide\nSHOT 2: slow push\nB-ROLL NEEDED: observatory\nGRAPHICS/ANIMATIONS: rotation curve\nLIGHTING MOOD: low key\nCOLOR PALETTE: deep blue";

    const NOTES: &str = "MUSIC CUE 1: [00:00] dark ambient\nGRAPHICS: rotation curve animation\nEQUIPMENT: Sony FX6\nBUDGET: $8,000\nTIMELINE: 10 days\nTECHNICAL: 4K 24fps";

    #[test]
    fn test_package_marker_factor() {
        assert!((package_marker_factor("scene b-roll source music") - 1.0).abs() < 1e-9);
        assert!((package_marker_factor("just music") - 0.05 / 0.35).abs() < 1e-9);
        assert_eq!(package_marker_factor(""), 0.0);
    }

    #[tokio::test]
    async fn test_runs_subagents_and_assembles_package() {
        let store = Arc::new(InMemoryVectorStore::new());
        seed_techniques(store.as_ref()).await.expect("seed library");
        let provider = Arc::new(ScriptedProvider::new([script(), VISUAL.to_string(), NOTES.to_string()]));
        let gatekeeper = SynthesisGatekeeper::new(provider.clone(), store).with_model("claude-test");
        let out = gatekeeper.run(seed()).await;

        assert_eq!(provider.call_count(), 3);
        assert!(out.errors().is_empty(), "errors: {:?}", out.errors());
        assert!(out.get("script_assignment").is_none());
        let requests = provider.requests();
        assert!(requests.iter().all(|r| r.model == "claude-test"));
        assert!(requests[0].messages[1].content.contains("RELEVANT VIRAL TECHNIQUES FROM DATABASE"));
        assert!(requests[1].messages[1].content.contains("*Most* of the universe"));
        assert!(requests[2].messages[1].content.contains("B-ROLL NEEDED: observatory"));

        let package = out.get("synthesis_package").expect("package");
        assert_eq!(package["visual_architecture"], json!(VISUAL));
        assert_eq!(package["production_notes"], json!(NOTES));
        assert!(out.get_u64("retrieved_technique_count").unwrap_or(0) > 0);
        assert!(out.confidence("synthesis") > 0.5);
        assert_eq!(
            out.get_bool("production_ready"),
            Some(out.confidence("synthesis") >= READY_THRESHOLD)
        );
    }

    #[tokio::test]
    async fn test_script_failure_skips_dependent_stages() {
        let gatekeeper = SynthesisGatekeeper::new(
            Arc::new(FailingProvider::transport("connection reset")),
            Arc::new(InMemoryVectorStore::new()),
        );
        let input = seed();
        let out = gatekeeper.run(input.clone()).await;

        assert_eq!(out.confidence("synthesis"), 0.0);
        assert_eq!(out.confidence("script"), 0.0);
        assert_eq!(out.errors().len(), 1);
        assert!(out.errors()[0].starts_with("script: "));
        assert!(out.get("visual_confidence").is_none());
        assert_eq!(out.get_bool("production_ready"), Some(false));
        assert_eq!(out.get("viral_analysis"), input.get("viral_analysis"));
    }

    #[tokio::test]
    async fn test_missing_inputs() {
        let gatekeeper = SynthesisGatekeeper::new(
            Arc::new(ScriptedProvider::new(["unused"])),
            Arc::new(InMemoryVectorStore::new()),
        );
        let input = PipelineState::create(json!({"topic": "Dark Matter"})).expect("seed");
        let out = gatekeeper.run(input).await;

        assert_eq!(out.confidence("synthesis"), 0.0);
        assert_eq!(out.errors(), ["synthesis: missing required inputs".to_string()]);
    }
}

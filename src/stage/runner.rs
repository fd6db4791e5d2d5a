//! The shared validate → call → extract → score algorithm.

use serde_json::Value;

use super::status::{StageStatus, StageTracker};
use super::{confidence_key, StageSettings};
use crate::error::LlmError;
use crate::llm::{LlmProvider, LlmProviderExt};
use crate::scoring::Scorecard;
use crate::state::{PipelineState, StateUpdate};

/// System instruction plus user message for one LLM call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

impl Prompt {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
        }
    }
}

/// What a stage made of a response: outputs to merge and the factors behind
/// its confidence.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub outputs: StateUpdate,
    pub scorecard: Scorecard,
}

impl Extraction {
    pub fn new(outputs: StateUpdate, scorecard: Scorecard) -> Self {
        Self { outputs, scorecard }
    }
}

/// A stage that makes exactly one LLM call.
///
/// Prompt building and extraction must be pure: the same state and the same
/// response always give the same result.
pub trait LlmStage: Send + Sync {
    fn name(&self) -> &str;
    fn required_keys(&self) -> &[&'static str];
    fn settings(&self) -> &StageSettings;
    fn provider(&self) -> &dyn LlmProvider;
    fn build_prompt(&self, state: &PipelineState) -> Prompt;
    fn extract(&self, state: &PipelineState, response: &str) -> Extraction;
}

/// Checks required keys; on failure returns the state to hand back.
pub fn validate(name: &str, required: &[&str], state: &PipelineState) -> Result<(), PipelineState> {
    let missing = state.missing_keys(required);
    if missing.is_empty() {
        return Ok(());
    }
    tracing::warn!(stage = %name, missing = ?missing, "Missing required inputs");
    Err(state.merge(
        StateUpdate::new()
            .set(confidence_key(name), 0.0)
            .error(format!("{}: missing required inputs", name)),
    ))
}

/// Zero confidence plus one `"<name>: <reason>"` error.
pub fn fail(state: &PipelineState, name: &str, reason: &str) -> PipelineState {
    tracing::error!(stage = %name, error = %reason, "Stage failed");
    state.merge(
        StateUpdate::new()
            .set(confidence_key(name), 0.0)
            .error(format!("{}: {}", name, reason)),
    )
}

/// Merges outputs, `<name>_confidence` and one audit message.
pub fn complete(
    state: &PipelineState,
    name: &str,
    outputs: StateUpdate,
    confidence: f64,
) -> PipelineState {
    tracing::info!(stage = %name, confidence, "Stage completed");
    state.merge(
        outputs
            .set(confidence_key(name), confidence)
            .message(format!("{}: completed with confidence {:.2}", name, confidence)),
    )
}

/// One single-turn call with the stage's generation parameters.
pub async fn call_llm(
    provider: &dyn LlmProvider,
    settings: &StageSettings,
    prompt: &Prompt,
) -> Result<String, LlmError> {
    provider
        .complete(
            &prompt.system,
            &prompt.user,
            &settings.model,
            settings.max_tokens,
            settings.temperature,
        )
        .await
}

/// `state` plus a `<subagent>_assignment` object built by a gatekeeper.
pub fn with_assignment(state: &PipelineState, subagent: &str, assignment: Value) -> PipelineState {
    state.merge(StateUpdate::new().set(format!("{}_assignment", subagent), assignment))
}

/// Runs a single-call stage through the full state machine.
pub async fn run_llm_stage<S: LlmStage + ?Sized>(stage: &S, state: PipelineState) -> PipelineState {
    let name = stage.name();
    let mut tracker = StageTracker::new(name);

    tracker.advance(StageStatus::Validating);
    if let Err(invalid) = validate(name, stage.required_keys(), &state) {
        tracker.advance(StageStatus::Invalid);
        return invalid;
    }

    let prompt = stage.build_prompt(&state);

    tracker.advance(StageStatus::CallingLlm);
    let response = match call_llm(stage.provider(), stage.settings(), &prompt).await {
        Ok(text) => text,
        Err(e) => {
            tracker.advance(StageStatus::LlmFailed);
            return fail(&state, name, &e.to_string());
        }
    };

    tracker.advance(StageStatus::Extracting);
    let extraction = stage.extract(&state, &response);

    tracker.advance(StageStatus::Scoring);
    let confidence = if response.trim().is_empty() {
        0.0
    } else {
        extraction.scorecard.rounded()
    };
    tracing::debug!(stage = %name, factors = ?extraction.scorecard.factors(), "Confidence factors");

    tracker.advance(StageStatus::Done);
    complete(&state, name, extraction.outputs, confidence)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::markers::count_occurrences;
    use crate::scoring::coverage;
    use crate::testing::{FailingProvider, ScriptedProvider};
    use serde_json::json;

    struct EchoStage {
        provider: ScriptedProvider,
        settings: StageSettings,
    }

    impl LlmStage for EchoStage {
        fn name(&self) -> &str {
            "echo"
        }
        fn required_keys(&self) -> &[&'static str] {
            &["topic"]
        }
        fn settings(&self) -> &StageSettings {
            &self.settings
        }
        fn provider(&self) -> &dyn LlmProvider {
            &self.provider
        }
        fn build_prompt(&self, state: &PipelineState) -> Prompt {
            Prompt::new("system", format!("Topic: {}", state.text_or("topic", "")))
        }
        fn extract(&self, _state: &PipelineState, response: &str) -> Extraction {
            let hits = count_occurrences(response, "echo");
            Extraction::new(
                StateUpdate::new().set("echo_hits", hits),
                Scorecard::new().factor("hits", 1.0, coverage(hits, 2)),
            )
        }
    }

    fn seed() -> PipelineState {
        PipelineState::create(json!({"topic": "Dark Matter", "keep": [1, 2]})).expect("seed")
    }

    #[tokio::test]
    async fn test_success_merges_outputs() {
        let stage = EchoStage {
            provider: ScriptedProvider::new(["echo echo echo"]),
            settings: StageSettings::new(100, 0.5),
        };
        let out = run_llm_stage(&stage, seed()).await;
        assert_eq!(out.get_u64("echo_hits"), Some(3));
        assert_eq!(out.confidence("echo"), 1.0);
        assert_eq!(out.messages(), ["echo: completed with confidence 1.00".to_string()]);
        assert!(stage.provider.requests()[0].messages[1].content.contains("Dark Matter"));
    }

    #[tokio::test]
    async fn test_missing_keys_short_circuits() {
        let stage = EchoStage {
            provider: ScriptedProvider::new(["echo"]),
            settings: StageSettings::new(100, 0.5),
        };
        let input = PipelineState::create(json!({"other": 1})).expect("seed");
        let out = run_llm_stage(&stage, input).await;
        assert_eq!(out.confidence("echo"), 0.0);
        assert_eq!(out.errors(), ["echo: missing required inputs".to_string()]);
        assert_eq!(stage.provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_blank_response_scores_zero() {
        let stage = EchoStage {
            provider: ScriptedProvider::new(["   "]),
            settings: StageSettings::new(100, 0.5),
        };
        let out = run_llm_stage(&stage, seed()).await;
        assert_eq!(out.confidence("echo"), 0.0);
        assert!(out.errors().is_empty());
    }

    #[tokio::test]
    async fn test_transport_failure_recorded() {
        struct FailStage(FailingProvider, StageSettings);
        impl LlmStage for FailStage {
            fn name(&self) -> &str {
                "echo"
            }
            fn required_keys(&self) -> &[&'static str] {
                &["topic"]
            }
            fn settings(&self) -> &StageSettings {
                &self.1
            }
            fn provider(&self) -> &dyn LlmProvider {
                &self.0
            }
            fn build_prompt(&self, _state: &PipelineState) -> Prompt {
                Prompt::new("s", "u")
            }
            fn extract(&self, _state: &PipelineState, _response: &str) -> Extraction {
                Extraction::default()
            }
        }

        let stage = FailStage(FailingProvider::transport("connection reset"), StageSettings::new(10, 0.1));
        let input = seed();
        let out = run_llm_stage(&stage, input.clone()).await;
        assert_eq!(out.confidence("echo"), 0.0);
        assert_eq!(out.errors().len(), input.errors().len() + 1);
        assert_eq!(out.errors()[0], "echo: HTTP request failed: connection reset");
        assert_eq!(out.get("keep"), input.get("keep"));
    }

    #[test]
    fn test_with_assignment() {
        let out = with_assignment(&seed(), "hook", json!({"count": 7}));
        assert_eq!(out.get("hook_assignment"), Some(&json!({"count": 7})));
    }
}

//! Opening hooks, each scored by the model on a 1-10 scale.
//!
//! The response is split on `HOOK #`. Every section counts as a hook; only
//! sections carrying an `EFFECTIVENESS SCORE:` line contribute a score, and an
//! unreadable score falls back to the label's default.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::agents::{Assignment, DEFAULT_AUDIENCE};
use crate::extraction::labels::{leading_number, HOOK_EFFECTIVENESS};
use crate::extraction::split_sections;
use crate::llm::LlmProvider;
use crate::prompts::viral::build_hook_prompt;
use crate::scoring::{coverage, mean, quality, Scorecard};
use crate::stage::{Extraction, LlmStage, Prompt, StageSettings};
use crate::state::{PipelineState, StateUpdate};

/// Marker that starts each hook section.
pub const HOOK_MARKER: &str = "HOOK #";

/// Hooks requested when the assignment does not say.
pub const DEFAULT_HOOK_COUNT: u64 = 7;

pub struct HookGenerator {
    llm: Arc<dyn LlmProvider>,
    settings: StageSettings,
}

impl std::fmt::Debug for HookGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookGenerator")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl HookGenerator {
    pub const NAME: &'static str = "hook";

    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self {
            llm,
            settings: StageSettings::new(4000, 0.9),
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

/// One scored hook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredHook {
    /// Number the model gave the hook, or its 1-based position.
    pub number: u64,
    pub title: String,
    pub score: f64,
}

/// Every hook section that carries a score, in response order.
pub fn scored_hooks(text: &str) -> Vec<ScoredHook> {
    split_sections(text, HOOK_MARKER)
        .into_iter()
        .enumerate()
        .filter(|(_, section)| HOOK_EFFECTIVENESS.is_present(section))
        .map(|(i, section)| {
            let heading = section.lines().next().unwrap_or_default();
            let number = leading_number(heading)
                .filter(|n| *n >= 1.0)
                .map_or(i as u64 + 1, |n| n as u64);
            let title = heading
                .split_once(':')
                .map_or(heading, |(_, rest)| rest)
                .trim()
                .to_string();
            ScoredHook {
                number,
                title,
                score: HOOK_EFFECTIVENESS.extract(section),
            }
        })
        .collect()
}

/// Highest-scoring hook; the earliest wins ties.
pub fn best_hook(hooks: &[ScoredHook]) -> Option<&ScoredHook> {
    hooks.iter().fold(None, |best: Option<&ScoredHook>, hook| match best {
        Some(b) if b.score >= hook.score => Some(b),
        _ => Some(hook),
    })
}

impl LlmStage for HookGenerator {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn required_keys(&self) -> &[&'static str] {
        &["hook_assignment"]
    }

    fn settings(&self) -> &StageSettings {
        &self.settings
    }

    fn provider(&self) -> &dyn LlmProvider {
        self.llm.as_ref()
    }

    fn build_prompt(&self, state: &PipelineState) -> Prompt {
        let assignment = Assignment::of(state, Self::NAME);
        let hook_count = assignment.number("hook_count", DEFAULT_HOOK_COUNT as f64);
        build_hook_prompt(
            &assignment.text("topic", ""),
            &assignment.text("target_audience", DEFAULT_AUDIENCE),
            &assignment.text("research_context", ""),
            &assignment.text("patterns", ""),
            if hook_count >= 1.0 { hook_count as u64 } else { DEFAULT_HOOK_COUNT },
        )
    }

    fn extract(&self, _state: &PipelineState, response: &str) -> Extraction {
        let hook_count = split_sections(response, HOOK_MARKER).len();
        let hooks = scored_hooks(response);
        let scores: Vec<f64> = hooks.iter().map(|h| h.score).collect();
        let average = mean(&scores).unwrap_or(0.0);

        let scorecard = Scorecard::new()
            .factor("hook_count", 0.5, coverage(hook_count, DEFAULT_HOOK_COUNT as usize))
            .factor("effectiveness", 0.5, quality(&scores, 10.0));

        let mut rankings = hooks.clone();
        rankings.sort_by(|a, b| b.score.total_cmp(&a.score));

        let outputs = StateUpdate::new()
            .set("hook_text", response)
            .set("hook_count", hook_count)
            .set("hook_effectiveness_scores", scores)
            .set("hook_effectiveness_avg", average)
            .set_serialized("hook_best", &best_hook(&hooks))
            .set_serialized("hook_rankings", &rankings);
        Extraction::new(outputs, scorecard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::Stage;
    use crate::testing::ScriptedProvider;
    use serde_json::json;

    const TWO_HOOKS: &str =
        "HOOK #1: Title\nEFFECTIVENESS SCORE: 8/10\nHOOK #2: Title2\nEFFECTIVENESS SCORE: 6/10";

    fn seeded() -> PipelineState {
        PipelineState::create(json!({"hook_assignment": {"topic": "Dark Matter", "hook_count": 7}}))
            .expect("seed")
    }

    #[tokio::test]
    async fn test_two_scored_hooks() {
        let agent = HookGenerator::new(Arc::new(ScriptedProvider::new([TWO_HOOKS])));
        let out = agent.run(seeded()).await;

        assert_eq!(out.get("hook_effectiveness_scores"), Some(&json!([8.0, 6.0])));
        assert_eq!(out.get_f64("hook_effectiveness_avg"), Some(7.0));
        assert_eq!(out.get_u64("hook_count"), Some(2));
        assert_eq!(
            out.get("hook_best"),
            Some(&json!({"number": 1, "title": "Title", "score": 8.0}))
        );
        // 2/7 * 0.5 + 0.7 * 0.5
        assert!((out.confidence("hook") - 0.49).abs() < 1e-9);
    }

    #[test]
    fn test_sections_without_label_are_not_scored() {
        let text = "HOOK #1: A\nno score here\nHOOK #2: B\nEFFECTIVENESS SCORE: strong";
        let hooks = scored_hooks(text);
        assert_eq!(hooks.len(), 1);
        assert_eq!(hooks[0].number, 2);
        assert_eq!(hooks[0].score, HOOK_EFFECTIVENESS.default);
    }

    #[test]
    fn test_best_hook_prefers_first_on_ties() {
        let hooks = scored_hooks(
            "HOOK #1: A\nEFFECTIVENESS SCORE: 9\nHOOK #2: B\nEFFECTIVENESS SCORE: 9",
        );
        assert_eq!(best_hook(&hooks).map(|h| h.title.as_str()), Some("A"));
        assert!(best_hook(&[]).is_none());
    }

    #[tokio::test]
    async fn test_no_hooks_average_zero() {
        let agent = HookGenerator::new(Arc::new(ScriptedProvider::new(["I cannot help with that."])));
        let out = agent.run(seeded()).await;
        assert_eq!(out.get_f64("hook_effectiveness_avg"), Some(0.0));
        assert_eq!(out.get("hook_best"), Some(&serde_json::Value::Null));
        assert_eq!(out.confidence("hook"), 0.0);
    }
}

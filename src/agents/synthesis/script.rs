//! Full narration script sized to the target duration.

use std::sync::Arc;

use crate::agents::{Assignment, DEFAULT_AUDIENCE, DEFAULT_DURATION_MINUTES};
use crate::extraction::{contains_any, count_exact, word_count};
use crate::llm::LlmProvider;
use crate::prompts::synthesis::{build_script_prompt, target_words, ScriptInputs, WORDS_PER_MINUTE};
use crate::scoring::{quality, round_to, Scorecard};
use crate::stage::{Extraction, LlmStage, Prompt, StageSettings};
use crate::state::{PipelineState, StateUpdate};

pub struct ScriptWriter {
    llm: Arc<dyn LlmProvider>,
    settings: StageSettings,
}

impl std::fmt::Debug for ScriptWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptWriter")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl ScriptWriter {
    pub const NAME: &'static str = "script";

    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self {
            llm,
            settings: StageSettings::new(8000, 0.8),
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

/// Structural checks on a script.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScriptMetrics {
    pub word_count: usize,
    pub timecode_count: usize,
    pub has_pauses: bool,
    pub has_emphasis: bool,
    pub has_structure: bool,
}

impl ScriptMetrics {
    pub fn measure(script: &str) -> Self {
        Self {
            word_count: word_count(script),
            // `[[` never opens a timecode
            timecode_count: count_exact(script, "[").saturating_sub(count_exact(script, "[[")),
            has_pauses: script.contains("[PAUSE]"),
            has_emphasis: script.contains('*'),
            has_structure: contains_any(script, &["ACT", "SECTION"]),
        }
    }

    /// `1 - min(1, |words - target| / target)`; a zero target gives 0.
    pub fn word_accuracy(&self, target: usize) -> f64 {
        if target == 0 {
            return 0.0;
        }
        let deviation = (self.word_count as f64 - target as f64).abs() / target as f64;
        1.0 - deviation.min(1.0)
    }

    /// Quality on a 0-10 scale.
    pub fn quality_score(&self, duration_minutes: f64) -> f64 {
        let mut score = self.word_accuracy(target_words(duration_minutes)) * 3.0;
        if self.timecode_count as f64 >= duration_minutes {
            score += 2.0;
        } else if self.timecode_count > 0 {
            score += 1.0;
        }
        if self.has_pauses {
            score += 1.5;
        }
        if self.has_emphasis {
            score += 1.5;
        }
        if self.has_structure {
            score += 2.0;
        }
        score.min(10.0)
    }
}

impl LlmStage for ScriptWriter {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn required_keys(&self) -> &[&'static str] {
        &["script_assignment"]
    }

    fn settings(&self) -> &StageSettings {
        &self.settings
    }

    fn provider(&self) -> &dyn LlmProvider {
        self.llm.as_ref()
    }

    fn build_prompt(&self, state: &PipelineState) -> Prompt {
        let assignment = Assignment::of(state, Self::NAME);
        let topic = assignment.text("topic", "");
        let audience = assignment.text("target_audience", DEFAULT_AUDIENCE);
        let research = assignment.text("research", "");
        let hooks = assignment.text("hooks", "");
        let engagement = assignment.text("engagement", "");
        let psychology = assignment.text("psychology", "");
        let patterns = assignment.text("patterns", "");
        let techniques = assignment.text("retrieved_context", "");
        build_script_prompt(&ScriptInputs {
            topic: &topic,
            audience: &audience,
            duration_minutes: assignment.number("duration_minutes", DEFAULT_DURATION_MINUTES),
            research: &research,
            hooks: &hooks,
            engagement: &engagement,
            psychology: &psychology,
            patterns: &patterns,
            techniques: &techniques,
        })
    }

    fn extract(&self, state: &PipelineState, response: &str) -> Extraction {
        let duration =
            Assignment::of(state, Self::NAME).number("duration_minutes", DEFAULT_DURATION_MINUTES);
        let metrics = ScriptMetrics::measure(response);
        let score = metrics.quality_score(duration);

        let scorecard = Scorecard::new().factor("quality", 1.0, quality(&[score], 10.0));
        let outputs = StateUpdate::new()
            .set("script_text", response)
            .set("script_word_count", metrics.word_count)
            .set(
                "script_duration_minutes",
                round_to(metrics.word_count as f64 / WORDS_PER_MINUTE, 2),
            )
            .set("script_timecode_count", metrics.timecode_count)
            .set("script_has_pauses", metrics.has_pauses)
            .set("script_has_emphasis", metrics.has_emphasis)
            .set("script_quality_score", round_to(score, 2));
        Extraction::new(outputs, scorecard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::Stage;
    use crate::testing::ScriptedProvider;
    use serde_json::json;

    fn script(words: usize) -> String {
        format!(
            "[00:00-00:10] COLD OPEN\n*What if* everything you see is 15% of reality? [PAUSE]\n[00:10-02:00] ACT 1\n{}",
            "word ".repeat(words)
        )
    }

    #[test]
    fn test_timecodes_exclude_double_brackets() {
        let metrics = ScriptMetrics::measure("[00:00] a [[note]] [PAUSE]");
        assert_eq!(metrics.timecode_count, 2);
    }

    #[test]
    fn test_quality_components() {
        let metrics = ScriptMetrics {
            word_count: 130,
            timecode_count: 1,
            has_pauses: true,
            has_emphasis: false,
            has_structure: true,
        };
        // accuracy 1.0 * 3 + 2 + 1.5 + 2
        assert_eq!(metrics.quality_score(1.0), 8.5);
        // 1 timecode for 2 minutes only earns 1; accuracy 0.5
        assert_eq!(metrics.quality_score(2.0), 6.0);
    }

    #[test]
    fn test_zero_duration_is_guarded() {
        let metrics = ScriptMetrics::measure("");
        assert_eq!(metrics.word_accuracy(0), 0.0);
        assert_eq!(metrics.quality_score(0.0), 2.0);
    }

    #[tokio::test]
    async fn test_script_outputs() {
        let text = script(1270);
        let agent = ScriptWriter::new(Arc::new(ScriptedProvider::new([text.clone()])));
        let state = PipelineState::create(json!({"script_assignment": {"topic": "Dark Matter", "duration_minutes": 10}}))
            .expect("seed");
        let out = agent.run(state).await;

        let words = out.get_u64("script_word_count").expect("words");
        assert_eq!(words as usize, word_count(&text));
        assert_eq!(out.get_u64("script_timecode_count"), Some(3));
        assert_eq!(out.get_bool("script_has_pauses"), Some(true));
        // accuracy ~0.99 * 3 + 1 + 1.5 + 1.5 + 2
        let q = out.get_f64("script_quality_score").expect("quality");
        assert!(q > 8.9 && q <= 9.0, "quality {}", q);
        assert!((out.confidence("script") - (q / 10.0)).abs() < 0.01);
    }
}

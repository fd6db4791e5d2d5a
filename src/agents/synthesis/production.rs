//! Crew-facing production notes: music, graphics, sound, budget and schedule.

use std::sync::Arc;

use crate::agents::{Assignment, DEFAULT_DURATION_MINUTES};
use crate::extraction::{contains_any, count_exact, count_occurrences};
use crate::llm::LlmProvider;
use crate::prompts::synthesis::build_production_notes_prompt;
use crate::scoring::{quality, round_to, Scorecard};
use crate::stage::{Extraction, LlmStage, Prompt, StageSettings};
use crate::state::{PipelineState, StateUpdate};

pub struct ProductionNotesGenerator {
    llm: Arc<dyn LlmProvider>,
    settings: StageSettings,
}

impl std::fmt::Debug for ProductionNotesGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProductionNotesGenerator")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl ProductionNotesGenerator {
    pub const NAME: &'static str = "production_notes";

    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self {
            llm,
            settings: StageSettings::new(6000, 0.6),
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

/// Element counts and section flags found in a set of notes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NotesInventory {
    pub music_cues: usize,
    pub graphics: usize,
    pub sound_effects: usize,
    pub has_budget: bool,
    pub has_timeline: bool,
    pub has_equipment: bool,
    pub has_technical: bool,
}

impl NotesInventory {
    pub fn take(notes: &str) -> Self {
        let music_cues = match count_occurrences(notes, "MUSIC CUE") {
            0 => count_exact(notes, "CUE:"),
            n => n,
        };
        let sound_effects = match count_occurrences(notes, "SFX") {
            0 => count_occurrences(notes, "SOUND EFFECT"),
            n => n,
        };
        Self {
            music_cues,
            graphics: count_occurrences(notes, "GRAPHIC") + count_occurrences(notes, "ANIMATION"),
            sound_effects,
            has_budget: notes.contains('$') || contains_any(notes, &["BUDGET"]),
            has_timeline: contains_any(notes, &["TIMELINE", "DAYS"]),
            has_equipment: contains_any(notes, &["EQUIPMENT", "GEAR"]),
            has_technical: contains_any(notes, &["RESOLUTION", "TECHNICAL"]),
        }
    }

    /// Completeness on a 0-10 scale.
    pub fn completeness(&self) -> f64 {
        let mut score = 0.0;
        if self.music_cues >= 5 {
            score += 2.5;
        } else if self.music_cues > 0 {
            score += 1.0;
        }
        if self.graphics >= 5 {
            score += 2.0;
        } else if self.graphics > 0 {
            score += 1.0;
        }
        for (present, points) in [
            (self.has_budget, 1.5),
            (self.has_timeline, 1.5),
            (self.has_equipment, 1.5),
            (self.has_technical, 1.0),
        ] {
            if present {
                score += points;
            }
        }
        f64::min(score, 10.0)
    }
}

impl LlmStage for ProductionNotesGenerator {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn required_keys(&self) -> &[&'static str] {
        &["production_notes_assignment"]
    }

    fn settings(&self) -> &StageSettings {
        &self.settings
    }

    fn provider(&self) -> &dyn LlmProvider {
        self.llm.as_ref()
    }

    fn build_prompt(&self, state: &PipelineState) -> Prompt {
        let assignment = Assignment::of(state, Self::NAME);
        build_production_notes_prompt(
            &assignment.text("topic", ""),
            assignment.number("duration_minutes", DEFAULT_DURATION_MINUTES),
            &assignment.text("script", ""),
            &assignment.text("visual", ""),
        )
    }

    fn extract(&self, _state: &PipelineState, response: &str) -> Extraction {
        let inventory = NotesInventory::take(response);
        let score = inventory.completeness();

        let scorecard = Scorecard::new().factor("completeness", 1.0, quality(&[score], 10.0));
        let outputs = StateUpdate::new()
            .set("production_notes_text", response)
            .set("production_notes_music_cue_count", inventory.music_cues)
            .set("production_notes_graphics_count", inventory.graphics)
            .set("production_notes_sfx_count", inventory.sound_effects)
            .set("production_notes_has_budget", inventory.has_budget)
            .set("production_notes_has_timeline", inventory.has_timeline)
            .set("production_notes_completeness_score", round_to(score, 2));
        Extraction::new(outputs, scorecard)
    }
}

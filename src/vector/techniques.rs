//! The viral technique library: curated entries the retrieval subagent
//! searches before scripting.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::VectorStore;
use crate::error::VectorStoreError;

/// One documented technique from a successful video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViralTechnique {
    pub id: String,
    pub name: String,
    /// `hook`, `retention`, `psychology`, `story_structure`, `visual` or `engagement`.
    pub category: String,
    /// Observed effectiveness, 0-10.
    pub effectiveness: f64,
    pub pattern_type: String,
    /// Full description; this is what gets embedded.
    pub text: String,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub source: String,
}

impl ViralTechnique {
    /// Metadata stored next to the embedded text.
    pub fn to_metadata(&self) -> Map<String, Value> {
        let mut metadata = Map::new();
        metadata.insert("name".into(), json!(self.name));
        metadata.insert("category".into(), json!(self.category));
        metadata.insert("effectiveness".into(), json!(self.effectiveness));
        metadata.insert("type".into(), json!(self.pattern_type));
        metadata.insert("topics".into(), json!(self.topics.join(", ")));
        metadata.insert("source".into(), json!(self.source));
        metadata
    }
}

fn technique(
    id: &str,
    name: &str,
    category: &str,
    effectiveness: f64,
    pattern_type: &str,
    topics: &[&str],
    text: &str,
) -> ViralTechnique {
    ViralTechnique {
        id: id.to_string(),
        name: name.to_string(),
        category: category.to_string(),
        effectiveness,
        pattern_type: pattern_type.to_string(),
        text: text.to_string(),
        topics: topics.iter().map(|t| t.to_string()).collect(),
        source: "curated".to_string(),
    }
}

/// Techniques every fresh library starts with.
pub fn starter_library() -> Vec<ViralTechnique> {
    vec![
        technique(
            "hook_contrarian_misconception",
            "Contrarian misconception opener",
            "hook",
            8.5,
            "contrarian",
            &["science", "psychology", "history"],
            "Open by naming a belief the audience holds and flatly contradicting it in the \
             first five seconds: \"Everything you were taught about X is wrong.\" Follow \
             immediately with one concrete, verifiable fact that proves the claim is not \
             clickbait. Works best when the misconception is common and the correction is \
             backed by a named study.",
        ),
        technique(
            "retention_open_loop_promise",
            "Open loop promise",
            "retention",
            9.2,
            "curiosity_loop",
            &["documentary", "explainer"],
            "Promise a specific payoff that will arrive later (\"by the end of this video you \
             will know why...\") and keep the loop open across act breaks. Close small loops \
             every two to three minutes while a larger loop stays open until the final act. \
             Strong mid-video retention when each closed loop opens the next one.",
        ),
        technique(
            "psychology_identity_framing",
            "Identity framing",
            "psychology",
            8.8,
            "identity",
            &["self improvement", "psychology", "productivity"],
            "Frame the topic as something that says who the viewer is: \"If you are the kind \
             of person who...\". Identity triggers raise sharing because viewers forward \
             content that represents them. Pair with second-person narration and a \
             relatable example in the first minute.",
        ),
        technique(
            "story_hero_journey_adaptation",
            "Hero's journey for discoveries",
            "story_structure",
            8.3,
            "hero_journey",
            &["history of science", "biography", "discovery"],
            "Tell a discovery as a journey: an ordinary researcher, a call to a strange \
             anomaly, rejection by the establishment, a turning-point experiment and a \
             changed world. Gives academic findings a human protagonist and natural act \
             breaks for timecodes.",
        ),
        technique(
            "visual_pattern_interrupt_cuts",
            "Pattern interrupt cuts",
            "visual",
            7.8,
            "pattern_interrupt",
            &["editing", "b-roll", "animation"],
            "Change the visual register every 30 to 60 seconds: cut from talking head to \
             animation, from wide to extreme close-up, or drop to black with a single line \
             of text. Schedule interrupts at predicted drop-off points, and support each one \
             with a sound cue.",
        ),
        technique(
            "engagement_curiosity_stacking",
            "Curiosity stacking",
            "engagement",
            9.0,
            "curiosity_loops",
            &["explainer", "mystery", "science"],
            "Stack two or three unanswered questions before answering the first one, so \
             every answer leaves at least one question open. Keeps average view duration \
             high in long-form content and pairs well with chapter markers that tease the \
             next question.",
        ),
    ]
}

/// Upserts the starter library; returns the number of techniques written.
///
/// Existing entries with the same id are replaced, so seeding twice leaves
/// the library unchanged.
pub async fn seed_techniques(store: &dyn VectorStore) -> Result<usize, VectorStoreError> {
    let techniques = starter_library();
    for technique in &techniques {
        store
            .upsert(&technique.text, &technique.id, technique.to_metadata())
            .await?;
    }
    tracing::info!(count = techniques.len(), "Seeded technique library");
    Ok(techniques.len())
}

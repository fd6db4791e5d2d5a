//! Academic depth specialist: peer-reviewed sources scored for credibility.
//!
//! Each paper the model returns is scored from its venue, citation count and
//! age using the tier tables in [`crate::scoring::tiers`]:
//!
//! ```text
//! credibility = journal * 0.4 + citations * 0.4 + recency * 10 * 0.2
//! ```
//!
//! Papers at or above the quality threshold become `academic_findings`.

use std::sync::Arc;

use serde_json::{json, Map, Value};

use crate::agents::{loose_f64, value_text, Assignment};
use crate::extraction::parse_json_response;
use crate::llm::LlmProvider;
use crate::prompts::research::build_academic_prompt;
use crate::scoring::{
    citation_score, coverage, is_top_tier_journal, journal_score, mean, quality, recency_weight,
    round_to, Scorecard,
};
use crate::stage::{Extraction, LlmStage, Prompt, StageSettings};
use crate::state::{PipelineState, StateUpdate};

/// Year ages are measured from.
pub const REFERENCE_YEAR: i64 = 2025;

/// Papers from this year on count as recent.
pub const RECENT_SINCE: i64 = 2023;

/// Default minimum credibility for a kept paper.
pub const DEFAULT_QUALITY_THRESHOLD: f64 = 7.0;

/// Year assumed for papers that do not state one.
const UNKNOWN_YEAR: i64 = 2020;

pub struct AcademicSpecialist {
    llm: Arc<dyn LlmProvider>,
    settings: StageSettings,
}

impl std::fmt::Debug for AcademicSpecialist {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AcademicSpecialist")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl AcademicSpecialist {
    pub const NAME: &'static str = "academic";

    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self {
            llm,
            settings: StageSettings::new(4000, 0.2),
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

/// Credibility of one paper, rounded to one decimal.
pub fn credibility(journal: &str, citations: u64, year: i64) -> f64 {
    let score = journal_score(journal) * 0.4
        + citation_score(citations) * 0.4
        + recency_weight(year, REFERENCE_YEAR) * 10.0 * 0.2;
    round_to(score, 1)
}

/// APA-style reference: `Author, & Author (year). Title. Journal, vol(issue), pages. https://doi.org/...`
pub fn format_apa(paper: &Map<String, Value>) -> String {
    let authors: Vec<String> = paper
        .get("authors")
        .and_then(Value::as_array)
        .map(|a| a.iter().map(value_text).collect())
        .unwrap_or_default();
    let author = match authors.as_slice() {
        [] => "Unknown Author".to_string(),
        [one] => one.clone(),
        [first, second] => format!("{}, & {}", first, second),
        [first, ..] => format!("{}, et al.", first),
    };
    let field = |key: &str| {
        paper
            .get(key)
            .map(value_text)
            .filter(|s| !s.trim().is_empty())
    };

    let year = field("year").unwrap_or_else(|| "n.d.".to_string());
    let title = field("title").unwrap_or_else(|| "Untitled".to_string());
    let mut citation = format!("{} ({}). {}. ", author, year, title);

    if let Some(journal) = field("journal") {
        citation.push_str(&journal);
        if let Some(volume) = field("volume") {
            citation.push_str(&format!(", {}", volume));
            if let Some(issue) = field("issue") {
                citation.push_str(&format!("({})", issue));
            }
        }
        if let Some(pages) = field("pages") {
            citation.push_str(&format!(", {}", pages));
        }
        citation.push_str(". ");
    }
    if let Some(doi) = field("doi") {
        citation.push_str(&format!("https://doi.org/{}", doi));
    }
    citation.trim_end().to_string()
}

/// Papers from a response: `{"findings": [...]}` or a bare array.
fn papers_from(response: &str) -> Vec<Map<String, Value>> {
    let items = match parse_json_response(response) {
        Some(Value::Object(mut obj)) => match obj.remove("findings") {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        Some(Value::Array(items)) => items,
        _ => Vec::new(),
    };
    items
        .into_iter()
        .filter_map(|item| match item {
            Value::Object(paper) => Some(paper),
            _ => None,
        })
        .collect()
}

fn paper_year(paper: &Map<String, Value>) -> i64 {
    loose_f64(paper.get("year"))
        .filter(|y| y.is_finite())
        .map(|y| y.clamp(0.0, 9999.0) as i64)
        .unwrap_or(UNKNOWN_YEAR)
}

/// Adds credibility fields and the APA reference to one paper.
fn assess(mut paper: Map<String, Value>) -> Map<String, Value> {
    let journal = paper
        .get("journal")
        .map(value_text)
        .unwrap_or_default();
    let citations = loose_f64(paper.get("citation_count"))
        .filter(|c| *c >= 0.0)
        .unwrap_or(0.0) as u64;
    let year = paper_year(&paper);

    paper.insert("journal_score".into(), json!(journal_score(&journal)));
    paper.insert("citation_score".into(), json!(citation_score(citations)));
    paper.insert(
        "recency_weight".into(),
        json!(recency_weight(year, REFERENCE_YEAR)),
    );
    paper.insert(
        "credibility_score".into(),
        json!(credibility(&journal, citations, year)),
    );
    let apa = format_apa(&paper);
    paper.insert("citation_apa".into(), json!(apa));
    paper
}

fn credibility_of(paper: &Map<String, Value>) -> f64 {
    paper
        .get("credibility_score")
        .and_then(Value::as_f64)
        .unwrap_or(0.0)
}

fn is_top_tier(paper: &Map<String, Value>) -> bool {
    paper
        .get("journal")
        .map(|j| is_top_tier_journal(&value_text(j)))
        .unwrap_or(false)
}

impl LlmStage for AcademicSpecialist {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn required_keys(&self) -> &[&'static str] {
        &["academic_assignment"]
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
        let mut queries = assignment.list("search_queries");
        if queries.is_empty() {
            queries.push(topic.clone());
        }
        build_academic_prompt(&topic, &queries)
    }

    fn extract(&self, state: &PipelineState, response: &str) -> Extraction {
        let threshold = Assignment::of(state, Self::NAME)
            .number("quality_threshold", DEFAULT_QUALITY_THRESHOLD);

        let assessed: Vec<Map<String, Value>> = papers_from(response).into_iter().map(assess).collect();
        let kept: Vec<&Map<String, Value>> = assessed
            .iter()
            .filter(|p| credibility_of(p) >= threshold)
            .collect();

        let credibilities: Vec<f64> = kept.iter().map(|p| credibility_of(p)).collect();
        let top_tier = kept.iter().filter(|p| is_top_tier(p)).count();
        let recent = kept.iter().filter(|p| paper_year(p) >= RECENT_SINCE).count();
        let older = kept.len() - recent;
        let avg_credibility = mean(&credibilities).map_or(0.0, |m| round_to(m, 2));

        let temporal = 0.5 * coverage(recent, 3) + 0.5 * coverage(older, 3);
        let scorecard = Scorecard::new()
            .factor("paper_count", 0.3, coverage(kept.len(), 10))
            .factor("credibility", 0.4, quality(&credibilities, 10.0))
            .factor("top_tier", 0.2, coverage(top_tier, 3))
            .factor("temporal_mix", 0.1, temporal);

        tracing::info!(
            total = assessed.len(),
            kept = kept.len(),
            top_tier,
            "Academic papers assessed"
        );

        let outputs = StateUpdate::new()
            .set("academic_findings", Value::Array(kept.iter().map(|p| Value::Object((*p).clone())).collect()))
            .set(
                "academic_stats",
                json!({
                    "total_found": assessed.len(),
                    "high_quality": kept.len(),
                    "avg_credibility": avg_credibility,
                    "top_tier_count": top_tier,
                }),
            )
            .set(
                "academic_all_findings",
                Value::Array(assessed.into_iter().map(Value::Object).collect()),
            );
        Extraction::new(outputs, scorecard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::Stage;
    use crate::testing::ScriptedProvider;

    fn paper(journal: &str, year: i64, citations: u64) -> Value {
        json!({
            "title": format!("{} paper", journal),
            "authors": ["Rubin, V.", "Ford, W."],
            "year": year,
            "journal": journal,
            "volume": "238",
            "issue": "4",
            "pages": "471-487",
            "doi": "10.1086/158003",
            "citation_count": citations
        })
    }

    fn seeded() -> PipelineState {
        PipelineState::create(json!({
            "topic": "Dark Matter",
            "academic_assignment": {"topic": "Dark Matter", "search_queries": ["galaxy rotation curves"]}
        }))
        .expect("seed")
    }

    #[test]
    fn test_credibility_formula() {
        // 10 * 0.4 + 10 * 0.4 + 1.0 * 10 * 0.2
        assert_eq!(credibility("Nature", 5000, 2024), 10.0);
        // 6 * 0.4 + 4 * 0.4 + 0.5 * 10 * 0.2
        assert_eq!(credibility("Blog", 0, 1990), 5.0);
        // 7 * 0.4 + 8 * 0.4 + 0.9 * 10 * 0.2 = 7.8
        assert_eq!(credibility("Journal of Cosmology", 100, 2021), 7.8);
    }

    #[test]
    fn test_format_apa() {
        let one = json!({"authors": ["Zwicky, F."], "year": 1933, "title": "Redshift", "journal": "Helvetica Physica Acta", "volume": "6", "pages": "110-127"});
        assert_eq!(
            format_apa(one.as_object().expect("object")),
            "Zwicky, F. (1933). Redshift. Helvetica Physica Acta, 6, 110-127."
        );

        let two = paper("Astrophysical Journal", 1980, 3000);
        assert_eq!(
            format_apa(two.as_object().expect("object")),
            "Rubin, V., & Ford, W. (1980). Astrophysical Journal paper. Astrophysical Journal, 238(4), 471-487. https://doi.org/10.1086/158003"
        );

        let many = json!({"authors": ["A", "B", "C"], "title": "T"});
        assert_eq!(
            format_apa(many.as_object().expect("object")),
            "A, et al. (n.d.). T."
        );
    }

    #[tokio::test]
    async fn test_filters_by_threshold_and_scores() {
        let response = json!({"findings": [
            paper("Nature", 2024, 1500),
            paper("Science", 2015, 2000),
            paper("Cell", 2023, 400),
            paper("Blog", 1990, 0),
        ]})
        .to_string();
        let agent = AcademicSpecialist::new(Arc::new(ScriptedProvider::new([response])));
        let out = agent.run(seeded()).await;

        let stats = out.get("academic_stats").expect("stats");
        assert_eq!(stats["total_found"], json!(4));
        assert_eq!(stats["high_quality"], json!(3));
        assert_eq!(stats["top_tier_count"], json!(3));

        let findings = out.get("academic_findings").and_then(Value::as_array).expect("array");
        assert_eq!(findings.len(), 3);
        assert!(findings[0]["citation_apa"].as_str().expect("apa").starts_with("Rubin, V., & Ford, W."));

        let confidence = out.confidence("academic");
        assert!(confidence > 0.5 && confidence <= 1.0, "confidence {}", confidence);
    }

    #[tokio::test]
    async fn test_extreme_years_are_clamped() {
        let response = r#"{"findings":[
            {"title":"T","journal":"Nature","year":-1e19,"citation_count":5},
            {"title":"U","journal":"Nature","year":1e19,"citation_count":5000}
        ]}"#;
        let agent = AcademicSpecialist::new(Arc::new(ScriptedProvider::new([response])));
        let out = agent.run(seeded()).await;

        assert!(out.errors().is_empty());
        let all = out
            .get("academic_all_findings")
            .and_then(Value::as_array)
            .expect("array");
        assert_eq!(all.len(), 2);
        assert_eq!(all[0]["recency_weight"], json!(0.5));
        assert_eq!(all[1]["recency_weight"], json!(1.0));
        let confidence = out.confidence("academic");
        assert!((0.0..=1.0).contains(&confidence));
    }

    #[tokio::test]
    async fn test_prose_response_scores_zero() {
        let agent = AcademicSpecialist::new(Arc::new(ScriptedProvider::new([
            "I could not find any papers on that topic.",
        ])));
        let out = agent.run(seeded()).await;
        assert_eq!(out.confidence("academic"), 0.0);
        assert_eq!(out.get("academic_findings"), Some(&json!([])));
    }

    #[tokio::test]
    async fn test_queries_default_to_topic() {
        let provider = Arc::new(ScriptedProvider::new(["{}"]));
        let agent = AcademicSpecialist::new(provider.clone());
        let state = PipelineState::create(json!({"academic_assignment": {"topic": "Neutrinos"}}))
            .expect("seed");
        agent.run(state).await;
        let request = &provider.requests()[0];
        assert!(request.messages[1].content.contains("- Neutrinos"));
    }
}

//! Research gatekeeper.
//!
//! Plans the research with one strategy call, dispatches the five research
//! subagents in order, then scores every finding they produced with a single
//! assessment call. The result is a categorised `research_findings` object, a
//! plain-text `research_report` with APA citations, and `research_ready`.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::{
    AcademicSpecialist, AccessibilityTranslator, ContrarianHunter, HistoricalMiner,
    InterdisciplinaryConnector,
};
use super::academic::DEFAULT_QUALITY_THRESHOLD;
use super::accessibility::DEFAULT_ENGAGEMENT_THRESHOLD;
use crate::agents::{loose_f64, mean_confidence, run_subagent, value_text};
use crate::extraction::parse_json_response;
use crate::llm::LlmProvider;
use crate::prompts::research::{build_assessment_prompt, build_strategy_prompt, FindingSummary};
use crate::scoring::{coverage, mean, quality, round_to, Scorecard};
use crate::stage::{
    call_llm, complete, fail, validate, Stage, StageSettings, StageStatus, StageTracker,
};
use crate::state::{PipelineState, StateUpdate};

/// Confidence at which research is ready for the viral stage.
pub const READY_THRESHOLD: f64 = 0.7;

/// Overall assessment score that counts a finding as high quality.
pub const HIGH_QUALITY_SCORE: f64 = 8.0;

/// Score assumed when the assessment omits a dimension.
const DEFAULT_SCORE: f64 = 5.0;

/// High-quality findings expected for full coverage.
const EXPECTED_HIGH_QUALITY: usize = 15;

/// How many academic titles the contrarian hunter sees as "mainstream".
const MAINSTREAM_SAMPLE: usize = 5;

const SUBAGENTS: [&str; 5] = [
    AcademicSpecialist::NAME,
    InterdisciplinaryConnector::NAME,
    HistoricalMiner::NAME,
    ContrarianHunter::NAME,
    AccessibilityTranslator::NAME,
];

// =============================================================================
// Findings and their assessment
// =============================================================================

/// Finding categories in report order, with the count expected for full
/// coverage.
const CATEGORIES: [(FindingCategory, usize); 4] = [
    (FindingCategory::Academic, 15),
    (FindingCategory::Interdisciplinary, 3),
    (FindingCategory::Historical, 3),
    (FindingCategory::Contrarian, 3),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FindingCategory {
    Academic,
    Interdisciplinary,
    Historical,
    Contrarian,
}

impl FindingCategory {
    fn label(&self) -> &'static str {
        match self {
            FindingCategory::Academic => "academic",
            FindingCategory::Interdisciplinary => "interdisciplinary",
            FindingCategory::Historical => "historical",
            FindingCategory::Contrarian => "contrarian",
        }
    }

    /// Key of this category inside `research_findings`.
    fn findings_key(&self) -> &'static str {
        match self {
            FindingCategory::Academic => "academic_sources",
            FindingCategory::Interdisciplinary => "interdisciplinary_connections",
            FindingCategory::Historical => "historical_context",
            FindingCategory::Contrarian => "contrarian_perspectives",
        }
    }
}

#[derive(Debug, Clone)]
struct Finding {
    category: FindingCategory,
    data: Value,
}

impl Finding {
    /// One-line description used by the assessment call and the report.
    fn summary(&self) -> String {
        let field = |key: &str| self.data.get(key).map(value_text).unwrap_or_default();
        match self.category {
            FindingCategory::Academic => {
                let mut text = field("title");
                if let Some(first) = self
                    .data
                    .get("key_findings")
                    .and_then(Value::as_array)
                    .and_then(|k| k.first())
                {
                    text.push_str(&format!(": {}", value_text(first)));
                }
                text
            }
            FindingCategory::Interdisciplinary => {
                format!("{}: {}", field("field"), field("connection_type"))
            }
            FindingCategory::Historical => format!("{}: {}", field("year"), field("event")),
            FindingCategory::Contrarian => field("viewpoint"),
        }
    }
}

/// Per-finding scores from the assessment call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FindingScore {
    pub credibility: f64,
    pub uniqueness: f64,
    pub narrative_value: f64,
    pub overall: f64,
}

impl Default for FindingScore {
    fn default() -> Self {
        Self {
            credibility: DEFAULT_SCORE,
            uniqueness: DEFAULT_SCORE,
            narrative_value: DEFAULT_SCORE,
            overall: DEFAULT_SCORE,
        }
    }
}

impl FindingScore {
    fn from_value(value: &Value) -> Self {
        let score = |key: &str| loose_f64(value.get(key)).unwrap_or(DEFAULT_SCORE);
        Self {
            credibility: score("credibility"),
            uniqueness: score("uniqueness"),
            narrative_value: score("narrative_value"),
            overall: score("overall"),
        }
    }

    /// Mean of credibility, uniqueness and narrative value.
    pub fn composite(&self) -> f64 {
        (self.credibility + self.uniqueness + self.narrative_value) / 3.0
    }
}

/// Scores for `count` findings from an assessment response.
///
/// Accepts a bare array or an object wrapping one. Entries are matched by
/// `index` when present, otherwise by position; unmatched findings keep the
/// default scores.
pub fn parse_assessment(response: &str, count: usize) -> Vec<FindingScore> {
    let items = match parse_json_response(response) {
        Some(Value::Array(items)) => items,
        Some(Value::Object(obj)) => obj
            .values()
            .find_map(|v| v.as_array().cloned())
            .unwrap_or_default(),
        _ => Vec::new(),
    };

    let mut scores = vec![FindingScore::default(); count];
    for (position, item) in items.iter().enumerate() {
        let index = loose_f64(item.get("index"))
            .filter(|i| *i >= 0.0)
            .map(|i| i as usize)
            .unwrap_or(position);
        if let Some(slot) = scores.get_mut(index) {
            *slot = FindingScore::from_value(item);
        }
    }
    scores
}

/// Aggregate quality numbers for `research_quality_metrics`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    pub average_credibility: f64,
    pub average_uniqueness: f64,
    pub average_narrative_value: f64,
    pub total_findings: usize,
    pub high_quality_count: usize,
}

impl QualityMetrics {
    fn from_scores(scores: &[FindingScore]) -> Self {
        let avg = |f: fn(&FindingScore) -> f64| {
            let values: Vec<f64> = scores.iter().map(f).collect();
            mean(&values).map_or(0.0, |m| round_to(m, 2))
        };
        Self {
            average_credibility: avg(|s| s.credibility),
            average_uniqueness: avg(|s| s.uniqueness),
            average_narrative_value: avg(|s| s.narrative_value),
            total_findings: scores.len(),
            high_quality_count: scores
                .iter()
                .filter(|s| s.overall >= HIGH_QUALITY_SCORE)
                .count(),
        }
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| items.iter().map(value_text).collect())
        .unwrap_or_default()
}

fn array_at(state: &PipelineState, key: &str, pointer: &str) -> Vec<Value> {
    state
        .get(key)
        .and_then(|v| if pointer.is_empty() { Some(v) } else { v.pointer(pointer) })
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

/// Every finding the subagents wrote into `state`, in category order.
fn collect_findings(state: &PipelineState) -> Vec<Finding> {
    let sources = [
        (FindingCategory::Academic, array_at(state, "academic_findings", "")),
        (
            FindingCategory::Interdisciplinary,
            array_at(state, "interdisciplinary_findings", ""),
        ),
        (
            FindingCategory::Historical,
            array_at(state, "historical_findings", "/historical_timeline"),
        ),
        (
            FindingCategory::Contrarian,
            array_at(state, "contrarian_findings", "/contrarian_viewpoints"),
        ),
    ];
    sources
        .into_iter()
        .flat_map(|(category, items)| {
            items.into_iter().map(move |data| Finding { category, data })
        })
        .collect()
}

// =============================================================================
// Report
// =============================================================================

fn push_section(report: &mut String, title: &str, lines: &[String]) {
    if lines.is_empty() {
        return;
    }
    report.push_str(&format!("{}\n", title));
    for line in lines {
        report.push_str(line);
        report.push('\n');
    }
    report.push('\n');
}

/// Plain-text research report, the form downstream prompts and the
/// citations file use.
fn render_report(
    topic: &str,
    strategy: &Value,
    findings: &[Finding],
    translations: &[Value],
    metrics: &QualityMetrics,
) -> String {
    let mut report = format!("RESEARCH REPORT: {}\n\n", topic);

    let questions: Vec<String> = string_list(strategy.get("key_questions"))
        .into_iter()
        .map(|q| format!("- {}", q))
        .collect();
    push_section(&mut report, "KEY QUESTIONS", &questions);

    let of = |category: FindingCategory| findings.iter().filter(move |f| f.category == category);

    let academic: Vec<String> = of(FindingCategory::Academic)
        .enumerate()
        .map(|(i, f)| {
            let citation = f
                .data
                .get("citation_apa")
                .map(value_text)
                .unwrap_or_else(|| f.summary());
            let mut line = format!("{}. {}", i + 1, citation);
            for key_finding in string_list(f.data.get("key_findings")) {
                line.push_str(&format!("\n   Key finding: {}", key_finding));
            }
            line
        })
        .collect();
    push_section(&mut report, "ACADEMIC SOURCES", &academic);

    for (category, title) in [
        (FindingCategory::Interdisciplinary, "INTERDISCIPLINARY CONNECTIONS"),
        (FindingCategory::Historical, "HISTORICAL CONTEXT"),
        (FindingCategory::Contrarian, "CONTRARIAN PERSPECTIVES"),
    ] {
        let lines: Vec<String> = of(category).map(|f| format!("- {}", f.summary())).collect();
        push_section(&mut report, title, &lines);
    }

    let accessible: Vec<String> = translations
        .iter()
        .filter_map(|t| t.get("accessible_version").map(value_text))
        .map(|t| format!("- {}", t))
        .collect();
    push_section(&mut report, "ACCESSIBLE TRANSLATIONS", &accessible);

    report.push_str(&format!(
        "QUALITY: {} findings, {} high quality, average credibility {:.1}, uniqueness {:.1}, narrative value {:.1}\n",
        metrics.total_findings,
        metrics.high_quality_count,
        metrics.average_credibility,
        metrics.average_uniqueness,
        metrics.average_narrative_value,
    ));
    report
}

// =============================================================================
// Gatekeeper
// =============================================================================

pub struct ResearchGatekeeper {
    llm: Arc<dyn LlmProvider>,
    settings: StageSettings,
    academic: AcademicSpecialist,
    interdisciplinary: InterdisciplinaryConnector,
    historical: HistoricalMiner,
    contrarian: ContrarianHunter,
    accessibility: AccessibilityTranslator,
}

impl std::fmt::Debug for ResearchGatekeeper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResearchGatekeeper")
            .field("settings", &self.settings)
            .field("subagents", &SUBAGENTS)
            .finish_non_exhaustive()
    }
}

impl ResearchGatekeeper {
    pub const NAME: &'static str = "research";

    /// Gatekeeper and all five subagents sharing one provider.
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self {
            settings: StageSettings::new(4000, 0.3),
            academic: AcademicSpecialist::new(Arc::clone(&llm)),
            interdisciplinary: InterdisciplinaryConnector::new(Arc::clone(&llm)),
            historical: HistoricalMiner::new(Arc::clone(&llm)),
            contrarian: ContrarianHunter::new(Arc::clone(&llm)),
            accessibility: AccessibilityTranslator::new(Arc::clone(&llm)),
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
            academic: self.academic.with_model(model),
            interdisciplinary: self.interdisciplinary.with_model(model),
            historical: self.historical.with_model(model),
            contrarian: self.contrarian.with_model(model),
            accessibility: self.accessibility.with_model(model),
            llm: self.llm,
        }
    }

    /// Subagent names in dispatch order.
    pub fn subagents(&self) -> &'static [&'static str] {
        &SUBAGENTS
    }

    async fn dispatch(&self, base: &PipelineState, strategy: &Value) -> PipelineState {
        let topic = base.text_or("topic", "");
        let mut queries = string_list(strategy.get("search_queries"));
        if queries.is_empty() {
            queries.push(topic.clone());
        }
        let fields = string_list(strategy.get("interdisciplinary_fields"));

        let folded = base.clone();
        let folded = run_subagent(
            &self.academic,
            base,
            folded,
            json!({
                "topic": topic,
                "search_queries": queries,
                "quality_threshold": DEFAULT_QUALITY_THRESHOLD,
            }),
        )
        .await;
        let folded = run_subagent(
            &self.interdisciplinary,
            base,
            folded,
            json!({"topic": topic, "fields": fields}),
        )
        .await;
        let folded =
            run_subagent(&self.historical, base, folded, json!({"topic": topic})).await;

        let academic_findings = array_at(&folded, "academic_findings", "");
        let mainstream: Vec<String> = academic_findings
            .iter()
            .take(MAINSTREAM_SAMPLE)
            .filter_map(|f| f.get("title").map(value_text))
            .collect();
        let folded = run_subagent(
            &self.contrarian,
            base,
            folded,
            json!({"topic": topic, "mainstream_findings": mainstream}),
        )
        .await;

        run_subagent(
            &self.accessibility,
            base,
            folded,
            json!({
                "academic_findings": academic_findings,
                "target_audience": base.text_or("target_audience", ""),
                "engagement_threshold": DEFAULT_ENGAGEMENT_THRESHOLD,
            }),
        )
        .await
    }
}

#[async_trait]
impl Stage for ResearchGatekeeper {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn required_keys(&self) -> &[&'static str] {
        &["topic", "target_audience", "video_style"]
    }

    async fn run(&self, state: PipelineState) -> PipelineState {
        let mut tracker = StageTracker::new(Self::NAME);
        tracker.advance(StageStatus::Validating);
        if let Err(invalid) = validate(Self::NAME, self.required_keys(), &state) {
            tracker.advance(StageStatus::Invalid);
            return invalid;
        }

        let topic = state.text_or("topic", "");
        tracing::info!(stage = Self::NAME, topic = %topic, "Planning research");

        tracker.advance(StageStatus::CallingLlm);
        let prompt = build_strategy_prompt(
            &topic,
            &state.text_or("target_audience", ""),
            &state.text_or("video_style", ""),
        );
        let strategy = match call_llm(self.llm.as_ref(), &self.settings, &prompt).await {
            Ok(text) => match parse_json_response(&text) {
                Some(value @ Value::Object(_)) => value,
                _ => json!({ "raw": text }),
            },
            Err(e) => {
                tracker.advance(StageStatus::LlmFailed);
                return fail(&state, Self::NAME, &format!("strategy: {}", e));
            }
        };

        tracker.advance(StageStatus::Extracting);
        let folded = self.dispatch(&state, &strategy).await;
        let findings = collect_findings(&folded);
        tracing::info!(
            stage = Self::NAME,
            findings = findings.len(),
            subagent_confidence = mean_confidence(&folded, &SUBAGENTS),
            "Subagents finished"
        );

        let scores = if findings.is_empty() {
            Vec::new()
        } else {
            let summaries: Vec<FindingSummary> = findings
                .iter()
                .map(|f| FindingSummary {
                    category: f.category.label().to_string(),
                    summary: f.summary(),
                })
                .collect();
            let prompt = build_assessment_prompt(&topic, &summaries);
            tracker.advance(StageStatus::CallingLlm);
            match call_llm(self.llm.as_ref(), &self.settings, &prompt).await {
                Ok(text) => {
                    tracker.advance(StageStatus::Extracting);
                    parse_assessment(&text, findings.len())
                }
                Err(e) => {
                    tracker.advance(StageStatus::LlmFailed);
                    return fail(&folded, Self::NAME, &format!("assessment: {}", e));
                }
            }
        };

        tracker.advance(StageStatus::Scoring);
        let composites: Vec<f64> = scores.iter().map(FindingScore::composite).collect();
        let metrics = QualityMetrics::from_scores(&scores);
        let category_coverage: Vec<f64> = CATEGORIES
            .iter()
            .map(|(category, expected)| {
                coverage(
                    findings.iter().filter(|f| f.category == *category).count(),
                    *expected,
                )
            })
            .collect();
        let scorecard = Scorecard::new()
            .factor("finding_quality", 0.4, quality(&composites, 10.0))
            .factor(
                "high_quality",
                0.3,
                coverage(metrics.high_quality_count, EXPECTED_HIGH_QUALITY),
            )
            .factor(
                "category_coverage",
                0.3,
                mean(&category_coverage).unwrap_or(0.0),
            );
        let confidence = scorecard.rounded();
        tracing::debug!(stage = Self::NAME, factors = ?scorecard.factors(), "Confidence factors");

        let mut categorised = Map::new();
        for (category, _) in CATEGORIES {
            let items: Vec<Value> = findings
                .iter()
                .zip(&scores)
                .filter(|(f, _)| f.category == category)
                .map(|(f, score)| {
                    let mut data = f.data.clone();
                    if let Value::Object(map) = &mut data {
                        map.insert("quality_score".into(), json!(score));
                    }
                    data
                })
                .collect();
            categorised.insert(category.findings_key().to_string(), Value::Array(items));
        }
        let translations = array_at(&folded, "accessibility_translations", "");
        categorised.insert(
            "accessible_translations".to_string(),
            Value::Array(translations.clone()),
        );

        let report = render_report(&topic, &strategy, &findings, &translations, &metrics);
        let ready = confidence >= READY_THRESHOLD;

        tracker.advance(StageStatus::Done);
        let outputs = StateUpdate::new()
            .set("research_strategy", strategy)
            .set("research_findings", Value::Object(categorised))
            .set_serialized("research_quality_metrics", &metrics)
            .set("research_report", report)
            .set("research_ready", ready);
        complete(&folded, Self::NAME, outputs, confidence)
    }
}

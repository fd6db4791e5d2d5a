//! Prompts for the research gatekeeper and its five subagents.

use super::{bullet_list, excerpt, Prompt};

/// System prompt for the research gatekeeper's own calls.
pub const RESEARCH_SYSTEM: &str = r#"You are the lead researcher for a documentary channel known for insights nobody else found.

Your job is to plan research and judge its quality. You look for:
- peer-reviewed sources that establish authority
- surprising connections to other fields
- the human story behind each discovery
- legitimate minority viewpoints that add nuance

Generic searches return generic results. Plan searches that find the hidden gems, and score findings honestly.

Always answer with valid JSON and nothing else."#;

/// Builds the research strategy request.
pub fn build_strategy_prompt(topic: &str, audience: &str, style: &str) -> Prompt {
    let user = format!(
        r#"Develop a strategic research plan for this video.

TOPIC: {topic}
TARGET AUDIENCE: {audience}
VIDEO STYLE: {style}

Return JSON in exactly this shape:
{{
  "search_queries": ["10-15 academic search queries, broad first, then specific and interdisciplinary"],
  "interdisciplinary_fields": ["5-7 related fields to explore"],
  "key_questions": ["8-10 why/how/what-is-the-controversy questions"],
  "expected_insights": ["5-7 kinds of unique insight to look for"]
}}

We want insights that make viewers think "I never knew that". Avoid common knowledge."#
    );
    Prompt::new(RESEARCH_SYSTEM, user)
}

/// One finding as shown to the assessment call.
#[derive(Debug, Clone, PartialEq)]
pub struct FindingSummary {
    pub category: String,
    pub summary: String,
}

/// Builds the single call that scores every finding at once.
pub fn build_assessment_prompt(topic: &str, findings: &[FindingSummary]) -> Prompt {
    let listing = findings
        .iter()
        .enumerate()
        .map(|(i, f)| format!("{}. [{}] {}", i, f.category, excerpt(&f.summary, 400)))
        .collect::<Vec<_>>()
        .join("\n");
    let user = format!(
        r#"Score these research findings on: {topic}

FINDINGS:
{listing}

Score each finding from 0 to 10 on:
- credibility: how trustworthy is the source?
- uniqueness: how rare or unexpected is the insight?
- narrative_value: how useful is it for storytelling?
- overall: your overall quality judgement

Return a JSON array with one object per finding, in order:
[{{"index": 0, "credibility": 8, "uniqueness": 7, "narrative_value": 9, "overall": 8}}]"#
    );
    Prompt::new(RESEARCH_SYSTEM, user)
}

/// System prompt for the academic depth subagent.
pub const ACADEMIC_SYSTEM: &str = r#"You are an academic research specialist with twenty years of scholarly experience.

Find the most credible, peer-reviewed sources that establish authority:
1. Peer-reviewed journals and credentialed authors
2. High-impact research: well cited, top-tier venues, replicated findings
3. Methodologically sound studies with clear findings
4. Complete citation data: authors, year, journal, volume, issue, pages, DOI

Ignore entertainment value, accessibility and virality; other specialists handle those.
Only cite papers that exist. Answer with valid JSON."#;

/// Builds the academic synthesis request.
pub fn build_academic_prompt(topic: &str, queries: &[String]) -> Prompt {
    let user = format!(
        r#"Find peer-reviewed papers for this topic.

TOPIC: {topic}

SEARCH QUERIES:
{queries}

Prefer top-tier journals (Nature, Science, Cell), papers with more than 100 citations, and a mix of the last five years with seminal older work.

Return JSON:
{{
  "findings": [
    {{
      "title": "Exact paper title",
      "authors": ["Author names"],
      "year": 2021,
      "journal": "Journal name",
      "volume": "12",
      "issue": "3",
      "pages": "100-110",
      "doi": "10.0000/example",
      "abstract": "Brief abstract",
      "key_findings": ["Specific findings with data"],
      "citation_count": 250,
      "methodology": "Research method"
    }}
  ]
}}

Provide 15-20 sources."#,
        queries = bullet_list(queries)
    );
    Prompt::new(ACADEMIC_SYSTEM, user)
}

/// System prompt for the interdisciplinary connector.
pub const INTERDISCIPLINARY_SYSTEM: &str = r#"You are a creative researcher who finds unexpected connections between fields.

Bridge the topic to surprising domains: physics to music, biology to economics, history to pop culture. Look for analogies, metaphors and cross-field research that make complex ideas relatable.

Answer with JSON:
{"connections": [{"field": "...", "connection_type": "...", "key_insights": [{"insight": "...", "explanation": "...", "storytelling_value": 9}]}]}"#;

pub fn build_interdisciplinary_prompt(topic: &str, fields: &[String]) -> Prompt {
    let user = format!(
        r#"Find 5-7 UNEXPECTED interdisciplinary connections for: {topic}

Fields worth considering:
{fields}

For each connection: which field connects, how they relate in a surprising way, what insights emerge, and how valuable it is for storytelling (0-10).

Return JSON with a "connections" array."#,
        fields = bullet_list(fields)
    );
    Prompt::new(INTERDISCIPLINARY_SYSTEM, user)
}

/// System prompt for the historical context miner.
pub const HISTORICAL_SYSTEM: &str = r#"You are a historian of science and a storyteller.

Find the story behind the facts: key milestones with dates, the researchers and their personal stories, controversies, wrong ideas that once seemed right, and the turning points that changed everything.

Answer with JSON:
{"historical_timeline": [{"year": "1915", "event": "...", "significance": "...", "key_figures": ["..."], "drama_factor": 9}], "evolution_narrative": "...", "surprising_facts": ["..."]}"#;

pub fn build_historical_prompt(topic: &str) -> Prompt {
    let user = format!(
        r#"Research the historical evolution of: {topic}

Find:
1. Timeline of key discoveries with specific dates
2. Key researchers and their personal stories
3. Controversies and debates
4. Wrong theories and their corrections
5. Turning points that changed understanding

Return JSON with historical_timeline, evolution_narrative and surprising_facts."#
    );
    Prompt::new(HISTORICAL_SYSTEM, user)
}

/// System prompt for the contrarian viewpoint hunter.
pub const CONTRARIAN_SYSTEM: &str = r#"You find LEGITIMATE alternative viewpoints.

Good: scientific debate backed by evidence, minority opinions from credible researchers, open controversies inside the field.
Bad: conspiracy theories, pseudoscience, fringe claims without evidence.

Answer with JSON:
{"contrarian_viewpoints": [{"viewpoint": "...", "evidence": "...", "proponents": ["..."], "credibility_score": 7, "why_minority": "...", "value_for_narrative": "..."}], "ongoing_debates": ["..."]}"#;

pub fn build_contrarian_prompt(topic: &str, mainstream: &[String]) -> Prompt {
    let mainstream: Vec<&str> = mainstream
        .iter()
        .take(5)
        .map(|m| excerpt(m, 200))
        .collect();
    let user = format!(
        r#"Find LEGITIMATE contrarian viewpoints about: {topic}

MAINSTREAM PERSPECTIVE:
{mainstream}

Find 3-5 alternative perspectives that have credible research support, come from qualified experts, represent ongoing debates, and add nuance without denying facts.

Return JSON with contrarian_viewpoints and ongoing_debates."#,
        mainstream = bullet_list(&mainstream)
    );
    Prompt::new(CONTRARIAN_SYSTEM, user)
}

/// System prompt for the accessibility translator.
pub const ACCESSIBILITY_SYSTEM: &str = r#"You are a science communicator in the tradition of the best explainer channels.

Translate academic findings into content that makes people say "wow, I never knew that" while staying completely accurate:
1. Understand the core finding and why it matters to ordinary people
2. Find the hook: counterintuitive, surprising scale, personal relevance, mystery, controversy, extreme example or future impact
3. Create analogies to everyday experience
4. Lead with the surprising part and use "you" language

Simplify, never oversimplify. Answer with valid JSON."#;

/// Builds one batched translation request for every finding.
pub fn build_accessibility_prompt(findings: &[String], audience: &str) -> Prompt {
    let listing = findings
        .iter()
        .enumerate()
        .map(|(i, f)| format!("FINDING {}:\n{}", i + 1, excerpt(f, 600)))
        .collect::<Vec<_>>()
        .join("\n\n");
    let user = format!(
        r#"Translate each academic finding into accessible, engaging content.

TARGET AUDIENCE: {audience}

{listing}

Return a JSON object:
{{
  "translations": [
    {{
      "original_finding": "Brief summary",
      "accessible_version": "2-3 conversational sentences",
      "hook": {{"type": "counterintuitive_finding", "hook_text": "...", "why_engaging": "..."}},
      "analogies": [{{"concept": "...", "analogy": "...", "effectiveness": 8.5}}],
      "key_quotes": ["..."],
      "complexity_score": 3,
      "engagement_score": 9,
      "viral_potential": 8,
      "narrative_value": 9,
      "personal_relevance": 7
    }}
  ]
}}

One translation per finding, in the same order."#
    );
    Prompt::new(ACCESSIBILITY_SYSTEM, user)
}

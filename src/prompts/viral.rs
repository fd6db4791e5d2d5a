//! Prompts for the viral analysis gatekeeper and its four subagents.

use super::{excerpt, format_minutes, Prompt};

pub const VIRAL_SYSTEM: &str = r#"You are the viral analyst for a documentary channel. You engineer virality by systematically applying proven patterns and psychological principles.

Cover:
- viral patterns from successful videos on similar topics
- hooks scored 1-10 on attention capture
- engagement and retention strategy
- psychological triggers and where to place them
- viral scores: hook strength, engagement potential, shareability, emotional impact, practical value

Be specific and actionable, with timestamps wherever possible."#;

pub fn build_viral_analysis_prompt(topic: &str, audience: &str, research: &str) -> Prompt {
    let user = format!(
        r#"Analyze viral potential for: {topic}

TARGET AUDIENCE: {audience}

RESEARCH FINDINGS AVAILABLE:
{research}

TASK:
1. Analyze viral patterns from successful videos on this topic
2. Generate 5 powerful hooks (score each 1-10)
3. Design an engagement optimization strategy
4. Identify psychological triggers to apply
5. Calculate a viral score across all dimensions

Provide actionable viral optimization recommendations."#,
        research = excerpt(research, 3000)
    );
    Prompt::new(VIRAL_SYSTEM, user)
}

pub const PATTERN_SYSTEM: &str = r#"You are the PATTERN ANALYZER, an expert at analyzing viral videos.

Analyze successful videos in similar niches and identify narrative structures, hook and opening techniques, pacing, visual styles, retention strategies, psychological triggers and call-to-action patterns. Your insights are data-driven and based on real viral video patterns."#;

pub fn build_pattern_prompt(topic: &str, audience: &str, research: &str) -> Prompt {
    let user = format!(
        r#"ANALYZE VIRAL VIDEO PATTERNS

TOPIC: {topic}
TARGET AUDIENCE: {audience}

RESEARCH CONTEXT:
{research}

Identify patterns across: narrative structures, pacing, visual presentation, engagement mechanics, psychological triggers and retention strategies.

For each pattern provide:
PATTERN NAME: [name]
FREQUENCY: [how common, as a percentage]
EFFECTIVENESS: [1-10]
EXAMPLE: [how it is used]
APPLICATION: [how we use it for this topic]

Separate patterns with a blank line. Provide 8-12 key patterns."#,
        research = excerpt(research, 3000)
    );
    Prompt::new(PATTERN_SYSTEM, user)
}

pub const HOOK_SYSTEM: &str = r#"You are the HOOK GENERATOR, a master of viral video openings.

Every hook you write stops the scroll (pattern interrupt), opens an information gap, makes a bold promise, uses specific psychological triggers and sets up the narrative arc.

Structures you know: "What if I told you...", "Most people don't know...", "The truth about...", "You've been lied to about...", "In the next X minutes..."."#;

pub fn build_hook_prompt(
    topic: &str,
    audience: &str,
    research: &str,
    patterns: &str,
    hook_count: u64,
) -> Prompt {
    let user = format!(
        r#"GENERATE VIRAL VIDEO HOOKS

TOPIC: {topic}
TARGET AUDIENCE: {audience}

RESEARCH INSIGHTS:
{research}

VIRAL PATTERNS IDENTIFIED:
{patterns}

Generate {hook_count} different opening hooks. For EACH hook use exactly this layout:

HOOK #[number]: [Catchy name for this hook type]
OPENING (0-3 seconds): [exact words]
AMPLIFICATION (4-7 seconds): [how to amplify the tension]
PROMISE (8-10 seconds): [the payoff you set up]
PSYCHOLOGICAL TRIGGERS USED: [2-3 triggers]
EFFECTIVENESS SCORE: [1-10]
TARGET EMOTION: [emotion]

Vary the psychological approach. Include at least one pattern-interrupt hook and one insider-knowledge hook. Score honestly."#,
        research = excerpt(research, 2000),
        patterns = excerpt(patterns, 2000),
    );
    Prompt::new(HOOK_SYSTEM, user)
}

pub const ENGAGEMENT_SYSTEM: &str = r#"You are the ENGAGEMENT OPTIMIZER, a specialist in viewer retention.

You know retention curves, drop-off points, open and closed loops, pattern interrupts and payoff timing. You design minute-by-minute strategies that keep viewers watching to the end."#;

pub fn build_engagement_prompt(
    topic: &str,
    audience: &str,
    duration_minutes: f64,
    research: &str,
    patterns: &str,
    hooks: &str,
) -> Prompt {
    let duration = format_minutes(duration_minutes);
    let user = format!(
        r#"CREATE ENGAGEMENT OPTIMIZATION STRATEGY

VIDEO SPECS:
- Topic: {topic}
- Duration: {duration} minutes
- Target Audience: {audience}

RESEARCH CONTENT:
{research}

VIRAL PATTERNS:
{patterns}

HOOK OPTIONS:
{hooks}

Provide:
1. OVERALL RETENTION STRATEGY
2. MINUTE-BY-MINUTE BREAKDOWN with RETENTION TARGET and ENGAGEMENT TECHNIQUES for each segment
3. RETENTION CHECKPOINTS, 5-7 of them:
   CHECKPOINT [n]: [timestamp]
   DROP-OFF RISK: [why viewers might leave]
   RETENTION TECHNIQUE: [specific strategy]
4. LOOP STRUCTURE MAP
5. PATTERN INTERRUPT SCHEDULE
6. ENGAGEMENT METRICS PREDICTION, including expected average retention as a percentage"#,
        research = excerpt(research, 2000),
        patterns = excerpt(patterns, 1500),
        hooks = excerpt(hooks, 1500),
    );
    Prompt::new(ENGAGEMENT_SYSTEM, user)
}

pub const PSYCHOLOGY_SYSTEM: &str = r#"You are the PSYCHOLOGY TRIGGER DETECTOR. You know which psychological triggers (curiosity, fear, identity, social proof, emotion, authority, scarcity) drive watching and sharing, and exactly where in a video to deploy each one."#;

pub fn build_psychology_prompt(
    topic: &str,
    audience: &str,
    duration_minutes: f64,
    research: &str,
    hooks: &str,
    engagement: &str,
) -> Prompt {
    let duration = format_minutes(duration_minutes);
    let user = format!(
        r#"ANALYZE PSYCHOLOGICAL TRIGGERS

Topic: {topic}
Target Audience: {audience}
Duration: {duration} minutes

RESEARCH CONTENT:
{research}

HOOK STRATEGIES:
{hooks}

ENGAGEMENT PLAN:
{engagement}

Provide:
1. TRIGGER EFFECTIVENESS ANALYSIS. For each trigger category (CURIOSITY, FEAR/ANXIETY, IDENTITY, SOCIAL PROOF, EMOTION, ...):
   Effectiveness: X/10
   Why: [reasons]
   Key Opportunities: [where it applies]
2. TOP 3 TRIGGER STRATEGY
3. TRIGGER PLACEMENT MAP
4. VIRAL PSYCHOLOGY SCORE, ending with the line
   OVERALL VIRAL PSYCHOLOGY: X/10
5. SHARING PSYCHOLOGY"#,
        research = excerpt(research, 2000),
        hooks = excerpt(hooks, 1500),
        engagement = excerpt(engagement, 1500),
    );
    Prompt::new(PSYCHOLOGY_SYSTEM, user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompts::NOT_AVAILABLE;

    #[test]
    fn test_hook_prompt_asks_for_scored_layout() {
        let prompt = build_hook_prompt("Procrastination", "students", "", "", 7);
        assert!(prompt.user.contains("Generate 7 different opening hooks"));
        assert!(prompt.user.contains("EFFECTIVENESS SCORE:"));
        assert!(prompt.user.contains(NOT_AVAILABLE));
    }

    #[test]
    fn test_engagement_prompt_formats_duration() {
        let prompt = build_engagement_prompt("X", "Y", 12.0, "r", "p", "h");
        assert!(prompt.user.contains("Duration: 12 minutes"));
    }

    #[test]
    fn test_research_is_truncated() {
        let long = "a".repeat(5000);
        let prompt = build_viral_analysis_prompt("X", "Y", &long);
        assert!(!prompt.user.contains(&"a".repeat(3001)));
        assert!(prompt.user.contains(&"a".repeat(3000)));
    }
}

//! Prompts for the content synthesis subagents.

use super::{excerpt, format_minutes, Prompt};

/// Narration pace used to size scripts.
pub const WORDS_PER_MINUTE: f64 = 130.0;

pub const SCRIPT_SYSTEM: &str = r#"You are a documentary script writer.

Your voice is clear and conversational, sophisticated but accessible, with rhythmic variation between short and long sentences. You know three-act documentary structure, the hero's journey adapted for science, tension and release, callbacks and setup/payoff.

You write complete, production-ready scripts that open with a powerful hook, keep engagement throughout, deliver research compellingly, include precise timecodes, and mark pauses and emphasis."#;

/// Upstream material the script writer draws on.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScriptInputs<'a> {
    pub topic: &'a str,
    pub audience: &'a str,
    pub duration_minutes: f64,
    pub research: &'a str,
    pub hooks: &'a str,
    pub engagement: &'a str,
    pub psychology: &'a str,
    pub patterns: &'a str,
    pub techniques: &'a str,
}

/// Target word count for a duration at [`WORDS_PER_MINUTE`].
pub fn target_words(duration_minutes: f64) -> usize {
    (duration_minutes.max(0.0) * WORDS_PER_MINUTE) as usize
}

pub fn build_script_prompt(inputs: &ScriptInputs<'_>) -> Prompt {
    let duration = format_minutes(inputs.duration_minutes);
    let closing_start = format_minutes((inputs.duration_minutes - 2.0).max(0.0));
    let words = target_words(inputs.duration_minutes);
    let user = format!(
        r#"WRITE COMPLETE DOCUMENTARY SCRIPT

Topic: {topic}
Duration: {duration} minutes
Target Word Count: {words} words (~130 words/minute)
Target Audience: {audience}

RESEARCH FOUNDATION:
{research}

VIRAL HOOK OPTIONS:
{hooks}

ENGAGEMENT STRATEGY:
{engagement}

PSYCHOLOGICAL TRIGGERS:
{psychology}

VIRAL PATTERNS TO IMPLEMENT:
{patterns}

PROVEN TECHNIQUES FROM OUR LIBRARY:
{techniques}

STRUCTURE:
[00:00-00:10] COLD OPEN / HOOK
[00:10-00:30] OPENING SEQUENCE
[00:30-02:00] ACT 1: SETUP
[02:00-05:00] ACT 1: COMPLICATION
[05:00-08:00] ACT 2: INVESTIGATION
[08:00-12:00] ACT 2: REVELATION
[12:00-{closing_start}:00] ACT 3: SYNTHESIS
[{closing_start}:00-{duration}:00] CLOSING

For each section give the timecode range, then NARRATION, PACING NOTES, EMOTIONAL TONE and KEY TRIGGER.

Requirements:
1. Total word count about {words} words (within 10%)
2. Every section starts with a [MM:SS] timecode
3. Mark strategic pauses with [PAUSE]
4. Mark emphasis with *asterisks*
5. Cite research naturally, no footnotes

Write the complete script now."#,
        topic = inputs.topic,
        audience = inputs.audience,
        research = excerpt(inputs.research, 3000),
        hooks = excerpt(inputs.hooks, 1500),
        engagement = excerpt(inputs.engagement, 1500),
        psychology = excerpt(inputs.psychology, 1500),
        patterns = excerpt(inputs.patterns, 1000),
        techniques = excerpt(inputs.techniques, 2000),
    );
    Prompt::new(SCRIPT_SYSTEM, user)
}

pub const VISUAL_SYSTEM: &str = r#"You are a documentary director of photography and visual architect. You turn scripts into shot-by-shot visual plans: shot types, angles, movement, B-roll, graphics and animation, lighting mood and color palette."#;

pub fn build_visual_prompt(
    topic: &str,
    duration_minutes: f64,
    script: &str,
    engagement: &str,
) -> Prompt {
    let duration = format_minutes(duration_minutes);
    let scenes = ((duration_minutes.max(0.0) * 1.5) as u64).clamp(1, 20);
    let user = format!(
        r#"CREATE VISUAL ARCHITECTURE

Topic: {topic}
Duration: {duration} minutes

SCRIPT:
{script}

ENGAGEMENT STRATEGY:
{engagement}

For EACH MAJOR SCENE (every 30-60 seconds) provide:

SCENE [NUMBER]: [name]
TIMECODE: [MM:SS-MM:SS]
SHOT 1: type, angle, movement, subject, duration, purpose
SHOT 2: ...
(3-5 shots per scene)
B-ROLL NEEDED: [specific footage]
GRAPHICS/ANIMATIONS: [needs]
LIGHTING MOOD: [mood]
COLOR PALETTE: [palette]

Then an OVERALL VISUAL STRATEGY covering themes, pacing, shot variety and an editor's guide.

Create detailed direction for {scenes} distinct scenes."#,
        script = excerpt(script, 6000),
        engagement = excerpt(engagement, 1500),
    );
    Prompt::new(VISUAL_SYSTEM, user)
}

pub const PRODUCTION_NOTES_SYSTEM: &str = r#"You are a documentary line producer and post-production supervisor. You write the practical notes a crew needs: music cues, graphics list, sound design, equipment, budget, schedule and technical delivery specs."#;

pub fn build_production_notes_prompt(
    topic: &str,
    duration_minutes: f64,
    script: &str,
    visual: &str,
) -> Prompt {
    let duration = format_minutes(duration_minutes);
    let user = format!(
        r#"CREATE PRODUCTION NOTES

Topic: {topic}
Duration: {duration} minutes

SCRIPT:
{script}

VISUAL ARCHITECTURE:
{visual}

Provide:
1. MUSIC CUES: 8-12 distinct cues across the {duration} minutes, each as
   MUSIC CUE [n]: [timecode] [mood] [instrumentation]
2. GRAPHICS AND ANIMATION LIST
3. SOUND DESIGN (SFX)
4. EQUIPMENT LIST
5. BUDGET ESTIMATE in dollars
6. PRODUCTION TIMELINE in days
7. TECHNICAL SPECIFICATIONS: resolution, frame rate, audio levels"#,
        script = excerpt(script, 4000),
        visual = excerpt(visual, 3000),
    );
    Prompt::new(PRODUCTION_NOTES_SYSTEM, user)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_words() {
        assert_eq!(target_words(10.0), 1300);
        assert_eq!(target_words(-1.0), 0);
    }

    #[test]
    fn test_script_prompt_sizes_to_duration() {
        let inputs = ScriptInputs {
            topic: "Dark Matter",
            audience: "students",
            duration_minutes: 10.0,
            ..ScriptInputs::default()
        };
        let prompt = build_script_prompt(&inputs);
        assert!(prompt.user.contains("Target Word Count: 1300 words"));
        assert!(prompt.user.contains("[8:00-10:00] CLOSING"));
    }

    #[test]
    fn test_visual_prompt_scene_count_is_capped() {
        let prompt = build_visual_prompt("X", 60.0, "script", "");
        assert!(prompt.user.contains("direction for 20 distinct scenes"));
    }
}

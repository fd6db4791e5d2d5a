//! Numeric values embedded in labeled prose.
//!
//! Stages ask the model for lines such as `EFFECTIVENESS SCORE: 8/10` and read
//! the leading numeral back. Every such read goes through this module so a
//! given (label, default) pair always produces the same fallback.

use std::sync::OnceLock;

use regex::Regex;

/// A label paired with the neutral value used when it cannot be read.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabeledScore {
    pub label: &'static str,
    pub default: f64,
}

impl LabeledScore {
    pub const fn new(label: &'static str, default: f64) -> Self {
        Self { label, default }
    }

    /// Reads the value after the first occurrence of the label.
    pub fn extract(&self, text: &str) -> f64 {
        extract_labeled_number(text, self.label, self.default)
    }

    /// Whether the label occurs at all, parseable or not.
    pub fn is_present(&self, text: &str) -> bool {
        find_label(text, self.label).is_some()
    }
}

/// Per-hook effectiveness emitted by the hook generator.
pub const HOOK_EFFECTIVENESS: LabeledScore = LabeledScore::new("EFFECTIVENESS SCORE:", 7.0);

/// Overall score line emitted by the psychology trigger detector.
pub const VIRAL_PSYCHOLOGY: LabeledScore = LabeledScore::new("OVERALL VIRAL PSYCHOLOGY:", 7.0);

/// Per-trigger effectiveness line emitted by the psychology trigger detector.
pub const TRIGGER_EFFECTIVENESS: LabeledScore = LabeledScore::new("Effectiveness:", 7.5);

fn leading_number_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[\s*:=\-]*(\d+(?:\.\d+)?)").ok())
        .as_ref()
}

fn percentage_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+(?:\.\d+)?)\s*%").ok())
        .as_ref()
}

/// Byte offset just past the first ASCII-case-insensitive match of `label`.
fn label_end(text: &str, label: &str) -> Option<usize> {
    if label.is_empty() {
        return None;
    }
    let haystack = text.as_bytes();
    let needle = label.as_bytes();
    haystack
        .windows(needle.len())
        .position(|w| w.eq_ignore_ascii_case(needle))
        .map(|start| start + needle.len())
}

/// Returns the rest of the line following the first occurrence of `label`.
pub fn find_label<'a>(text: &'a str, label: &str) -> Option<&'a str> {
    let end = label_end(text, label)?;
    let rest = text.get(end..)?;
    Some(rest.split('\n').next().unwrap_or(rest))
}

/// Parses the numeral at the start of `s`, skipping decoration like `:` or `*`.
///
/// `"8/10"` reads as 8 and `"8.5 out of 10"` as 8.5.
pub fn leading_number(s: &str) -> Option<f64> {
    let caps = leading_number_re()?.captures(s)?;
    caps.get(1)?.as_str().parse().ok()
}

/// The numeral after the first `label`, or `None` if absent or unparseable.
pub fn try_extract_labeled_number(text: &str, label: &str) -> Option<f64> {
    find_label(text, label).and_then(leading_number)
}

/// The numeral after the first `label`, or `default`.
pub fn extract_labeled_number(text: &str, label: &str, default: f64) -> f64 {
    try_extract_labeled_number(text, label).unwrap_or(default)
}

/// Every parseable numeral following an occurrence of `label`, in order.
pub fn extract_all_labeled_numbers(text: &str, label: &str) -> Vec<f64> {
    text.lines()
        .filter_map(|line| try_extract_labeled_number(line, label))
        .collect()
}

/// Highest percentage on any line mentioning `context_word`, capped at 100.
pub fn extract_percentage(text: &str, context_word: &str) -> Option<f64> {
    let re = percentage_re()?;
    let word = context_word.to_lowercase();
    text.lines()
        .filter(|line| line.to_lowercase().contains(&word))
        .flat_map(|line| re.captures_iter(line))
        .filter_map(|caps| caps.get(1)?.as_str().parse::<f64>().ok())
        .filter(|pct| *pct <= 100.0)
        .fold(None, |best: Option<f64>, pct| {
            Some(best.map_or(pct, |b| b.max(pct)))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_ten_reads_numerator() {
        assert_eq!(leading_number(" 8/10"), Some(8.0));
        assert_eq!(leading_number(": 8.5 out of 10"), Some(8.5));
        assert_eq!(leading_number(" **9**"), Some(9.0));
        assert_eq!(leading_number(" high"), None);
    }

    #[test]
    fn test_unfilled_placeholder_uses_default() {
        assert_eq!(leading_number(" [1-10]"), None);
        assert_eq!(HOOK_EFFECTIVENESS.extract("EFFECTIVENESS SCORE: [1-10]"), 7.0);
        assert_eq!(TRIGGER_EFFECTIVENESS.extract("Effectiveness: [X/10]"), 7.5);
    }

    #[test]
    fn test_labeled_number_uses_first_occurrence() {
        let text = "EFFECTIVENESS SCORE: 8/10\nEFFECTIVENESS SCORE: 3/10";
        assert_eq!(extract_labeled_number(text, "EFFECTIVENESS SCORE:", 7.0), 8.0);
    }

    #[test]
    fn test_labeled_number_is_case_insensitive() {
        let text = "Overall Viral Psychology: 9/10";
        assert_eq!(VIRAL_PSYCHOLOGY.extract(text), 9.0);
        assert!(VIRAL_PSYCHOLOGY.is_present(text));
    }

    #[test]
    fn test_same_label_same_default() {
        let text = "EFFECTIVENESS SCORE: unclear";
        assert_eq!(HOOK_EFFECTIVENESS.extract(text), 7.0);
        assert_eq!(HOOK_EFFECTIVENESS.extract(""), 7.0);
        assert!(HOOK_EFFECTIVENESS.is_present(text));
        assert!(!HOOK_EFFECTIVENESS.is_present(""));
    }

    #[test]
    fn test_label_does_not_cross_lines() {
        let text = "EFFECTIVENESS SCORE:\n8";
        assert_eq!(try_extract_labeled_number(text, "EFFECTIVENESS SCORE:"), None);
    }

    #[test]
    fn test_all_labeled_numbers() {
        let text = "Scarcity\nEffectiveness: 8/10\nSocial proof\nEffectiveness: 6.5/10\nEffectiveness: n/a";
        assert_eq!(extract_all_labeled_numbers(text, "Effectiveness:"), vec![8.0, 6.5]);
    }

    #[test]
    fn test_percentage_on_context_lines() {
        let text = "Expected retention at 3:00: 72%\nRetention at end: 48%\nCTR: 95%";
        assert_eq!(extract_percentage(text, "retention"), Some(72.0));
        assert_eq!(extract_percentage("no numbers here", "retention"), None);
    }

    #[test]
    fn test_non_ascii_text_is_safe() {
        let text = "Übersicht — EFFECTIVENESS SCORE: 6/10 ✅";
        assert_eq!(HOOK_EFFECTIVENESS.extract(text), 6.0);
    }
}

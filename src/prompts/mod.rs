//! Prompt templates for every LLM-backed stage.
//!
//! Each stage has a system prompt constant and a `build_*` function that
//! fills the user message from plain arguments. Builders are pure: the same
//! arguments always give the same [`Prompt`], with no clocks, randomness or
//! IO, so a stubbed provider sees byte-identical requests run to run.
//!
//! - [`research`] - research strategy, academic search, the three creative
//!   research subagents, accessibility translation and finding assessment
//! - [`viral`] - viral analysis, patterns, hooks, engagement and psychology
//! - [`synthesis`] - script, visual architecture and production notes

pub mod research;
pub mod synthesis;
pub mod viral;

pub use crate::stage::Prompt;

use crate::extraction::markers::truncate_chars;

/// Fallback text when an upstream section is absent.
pub const NOT_AVAILABLE: &str = "Not available yet";

/// Trims `text` to `max_chars` for embedding in a prompt, substituting
/// [`NOT_AVAILABLE`] for blank input.
pub fn excerpt(text: &str, max_chars: usize) -> &str {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        NOT_AVAILABLE
    } else {
        truncate_chars(trimmed, max_chars)
    }
}

/// Renders items as a `- item` list, or `- none` when empty.
pub fn bullet_list<S: AsRef<str>>(items: &[S]) -> String {
    if items.is_empty() {
        return "- none".to_string();
    }
    items
        .iter()
        .map(|item| format!("- {}", item.as_ref()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Formats minutes without a trailing `.0` for whole numbers.
pub fn format_minutes(minutes: f64) -> String {
    if minutes.fract() == 0.0 {
        format!("{}", minutes as i64)
    } else {
        format!("{:.1}", minutes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_excerpt() {
        assert_eq!(excerpt("   ", 10), NOT_AVAILABLE);
        assert_eq!(excerpt("  abcdef  ", 3), "abc");
    }

    #[test]
    fn test_bullet_list() {
        assert_eq!(bullet_list::<&str>(&[]), "- none");
        assert_eq!(bullet_list(&["a", "b"]), "- a\n- b");
    }

    #[test]
    fn test_format_minutes() {
        assert_eq!(format_minutes(10.0), "10");
        assert_eq!(format_minutes(7.5), "7.5");
    }
}

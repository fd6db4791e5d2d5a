//! Keyword heuristics over free text.
//!
//! The fallback when a response carries no JSON: count structural markers
//! like `SCENE`, `[PAUSE]` or `citation` and let the scoring tables turn the
//! counts into factors.

/// Case-insensitive, non-overlapping occurrences of `needle`.
pub fn count_occurrences(text: &str, needle: &str) -> usize {
    if needle.is_empty() {
        return 0;
    }
    text.to_lowercase().matches(&needle.to_lowercase()).count()
}

/// Case-sensitive, non-overlapping occurrences of `needle`.
///
/// Used where the prompt asks for an upper-case marker and prose mentions of
/// the same word should not count.
pub fn count_exact(text: &str, needle: &str) -> usize {
    if needle.is_empty() {
        return 0;
    }
    text.matches(needle).count()
}

/// Whether any of `needles` occurs, ignoring case.
pub fn contains_any(text: &str, needles: &[&str]) -> bool {
    let lower = text.to_lowercase();
    needles
        .iter()
        .filter(|n| !n.is_empty())
        .any(|n| lower.contains(&n.to_lowercase()))
}

/// Sum of case-insensitive occurrences of each of `needles`.
pub fn count_any(text: &str, needles: &[&str]) -> usize {
    needles.iter().map(|n| count_occurrences(text, n)).sum()
}

/// Splits on a case-sensitive `marker` and drops the preamble before the first one.
///
/// `"intro HOOK #1 a HOOK #2 b"` split on `"HOOK #"` gives `["1 a ", "2 b"]`.
pub fn split_sections<'a>(text: &'a str, marker: &str) -> Vec<&'a str> {
    if marker.is_empty() {
        return Vec::new();
    }
    text.split(marker).skip(1).collect()
}

/// Whitespace-separated word count.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// First `max_chars` characters of `text`, on a char boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_occurrences_ignores_case() {
        assert_eq!(count_occurrences("Hook, HOOK and hook", "hook"), 3);
        assert_eq!(count_occurrences("anything", ""), 0);
    }

    #[test]
    fn test_count_exact() {
        let text = "TECHNIQUE 1 and another technique";
        assert_eq!(count_exact(text, "TECHNIQUE"), 1);
        assert_eq!(count_exact(text, "technique"), 1);
    }

    #[test]
    fn test_contains_and_count_any() {
        let text = "Scene 1 with B-ROLL and a timecode";
        assert!(contains_any(text, &["b-roll", "visual"]));
        assert!(!contains_any(text, &["citation", ""]));
        assert_eq!(count_any(text, &["scene", "timecode"]), 2);
    }

    #[test]
    fn test_split_sections_drops_preamble() {
        let text = "Intro\nHOOK #1: A\nHOOK #2: B";
        let sections = split_sections(text, "HOOK #");
        assert_eq!(sections, vec!["1: A\n", "2: B"]);
        assert!(split_sections("no hooks", "HOOK #").is_empty());
    }

    #[test]
    fn test_word_count_and_truncate() {
        assert_eq!(word_count("  one two\nthree "), 3);
        assert_eq!(word_count(""), 0);
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("hi", 10), "hi");
    }
}

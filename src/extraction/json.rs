//! JSON extraction from LLM responses.
//!
//! Models asked for JSON frequently wrap it in markdown fences, prefix it with
//! commentary, or run out of tokens half way through. Extraction tries, in
//! order:
//! 1. A ```json fenced block
//! 2. Any other fenced block
//! 3. The whole response, when it starts with `{` or `[`
//! 4. The largest balanced object or array found anywhere in the text
//!
//! A structure that opens but never closes is reported as
//! [`JsonExtractionResult::Truncated`] so callers can fall back to keyword
//! heuristics instead of parsing garbage.

use std::sync::OnceLock;

use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Result of a JSON extraction attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum JsonExtractionResult {
    /// Valid JSON text.
    Success(String),
    /// JSON started but did not complete.
    Truncated {
        partial_json: String,
        unclosed_braces: usize,
        unclosed_brackets: usize,
    },
    /// Nothing JSON-like in the response.
    NotFound,
}

impl JsonExtractionResult {
    pub fn is_success(&self) -> bool {
        matches!(self, JsonExtractionResult::Success(_))
    }

    pub fn is_truncated(&self) -> bool {
        matches!(self, JsonExtractionResult::Truncated { .. })
    }

    /// The extracted JSON text for the `Success` case.
    pub fn json(&self) -> Option<&str> {
        match self {
            JsonExtractionResult::Success(json) => Some(json),
            _ => None,
        }
    }
}

/// Depth bookkeeping for a scan over possibly-incomplete JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JsonStructureAnalysis {
    pub unclosed_braces: usize,
    pub unclosed_brackets: usize,
    pub in_string: bool,
    /// Byte offset of the first `{` or `[`.
    pub json_start: Option<usize>,
}

impl JsonStructureAnalysis {
    fn is_incomplete(&self) -> bool {
        self.json_start.is_some()
            && (self.unclosed_braces > 0 || self.unclosed_brackets > 0 || self.in_string)
    }
}

/// Scans `s` tracking brace and bracket depth outside string literals.
pub fn analyze_json_structure(s: &str) -> JsonStructureAnalysis {
    let mut braces: isize = 0;
    let mut brackets: isize = 0;
    let mut in_string = false;
    let mut escaped = false;
    let mut json_start = None;

    for (i, c) in s.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' | '[' if !in_string => {
                json_start.get_or_insert(i);
                if c == '{' {
                    braces += 1;
                } else {
                    brackets += 1;
                }
            }
            '}' if !in_string => braces -= 1,
            ']' if !in_string => brackets -= 1,
            _ => {}
        }
    }

    JsonStructureAnalysis {
        unclosed_braces: braces.max(0) as usize,
        unclosed_brackets: brackets.max(0) as usize,
        in_string,
        json_start,
    }
}

/// Finds the index of the delimiter closing the one `s` starts with.
///
/// `s` must start with `open`. String literals and escapes are skipped.
pub fn find_matching_delimiter(s: &str, open: char, close: char) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in s.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            c if c == open && !in_string => depth += 1,
            c if c == close && !in_string => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

fn json_fence() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"```json\s*\n?([\s\S]*?)\n?```").ok())
        .as_ref()
}

fn any_fence() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"```(?:\w+)?\s*\n?([\s\S]*?)\n?```").ok())
        .as_ref()
}

fn is_valid_json(candidate: &str) -> bool {
    serde_json::from_str::<Value>(candidate).is_ok()
}

/// Returns the balanced object or array at the start of `s`, if it parses.
fn balanced_prefix(s: &str) -> Option<&str> {
    let (open, close) = match s.chars().next()? {
        '{' => ('{', '}'),
        '[' => ('[', ']'),
        _ => return None,
    };
    let end = find_matching_delimiter(s, open, close)?;
    let candidate = &s[..=end];
    is_valid_json(candidate).then_some(candidate)
}

fn from_fence(re: Option<&Regex>, content: &str) -> Option<String> {
    re?.captures_iter(content).find_map(|caps| {
        let body = caps.get(1)?.as_str().trim();
        let start = body.find(['{', '['])?;
        balanced_prefix(&body[start..]).map(str::to_string)
    })
}

/// Largest valid object or array anywhere in `content`; later wins on ties.
fn largest_embedded(content: &str) -> Option<String> {
    content
        .char_indices()
        .filter(|(_, c)| *c == '{' || *c == '[')
        .filter_map(|(i, _)| balanced_prefix(&content[i..]).map(|json| (i, json)))
        .max_by(|(pos_a, a), (pos_b, b)| a.len().cmp(&b.len()).then(pos_a.cmp(pos_b)))
        .map(|(_, json)| json.to_string())
}

/// Attempts to extract JSON from an LLM response.
pub fn try_extract_json_from_response(content: &str) -> JsonExtractionResult {
    let trimmed = content.trim();

    if let Some(json) = from_fence(json_fence(), trimmed) {
        return JsonExtractionResult::Success(json);
    }
    if let Some(json) = from_fence(any_fence(), trimmed) {
        return JsonExtractionResult::Success(json);
    }
    if let Some(json) = balanced_prefix(trimmed) {
        return JsonExtractionResult::Success(json.to_string());
    }
    if let Some(json) = largest_embedded(trimmed) {
        return JsonExtractionResult::Success(json);
    }

    let analysis = analyze_json_structure(trimmed);
    match analysis.json_start {
        Some(start) if analysis.is_incomplete() => JsonExtractionResult::Truncated {
            partial_json: trimmed[start..].to_string(),
            unclosed_braces: analysis.unclosed_braces,
            unclosed_brackets: analysis.unclosed_brackets,
        },
        _ => JsonExtractionResult::NotFound,
    }
}

/// Parses the JSON embedded in a response, or `None` when there is none.
pub fn parse_json_response(content: &str) -> Option<Value> {
    match try_extract_json_from_response(content) {
        JsonExtractionResult::Success(json) => serde_json::from_str(&json).ok(),
        JsonExtractionResult::Truncated {
            unclosed_braces,
            unclosed_brackets,
            ..
        } => {
            tracing::debug!(
                unclosed_braces,
                unclosed_brackets,
                "LLM response contains truncated JSON"
            );
            None
        }
        JsonExtractionResult::NotFound => None,
    }
}

/// Parses the embedded JSON straight into `T`; shape mismatches give `None`.
pub fn parse_json_as<T: DeserializeOwned>(content: &str) -> Option<T> {
    parse_json_response(content).and_then(|value| serde_json::from_value(value).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[test]
    fn test_direct_json() {
        let input = r#"{"key": "value"}"#;
        assert_eq!(
            try_extract_json_from_response(input).json(),
            Some(input)
        );
    }

    #[test]
    fn test_json_code_block_with_commentary() {
        let input = "Here you go:\n```json\n[{\"title\": \"a\"}]\n```\nEnjoy!";
        assert_eq!(
            try_extract_json_from_response(input).json(),
            Some(r#"[{"title": "a"}]"#)
        );
    }

    #[test]
    fn test_generic_code_block() {
        let input = "Result:\n```\n{\"score\": 8}\n```";
        let value = parse_json_response(input).expect("json");
        assert_eq!(value["score"], 8);
    }

    #[test]
    fn test_prefers_largest_embedded_object() {
        let input = r#"For example {"a": 1}. Final answer: {"findings": [{"x": 1}, {"x": 2}]}"#;
        let value = parse_json_response(input).expect("json");
        assert!(value.get("findings").is_some());
    }

    #[test]
    fn test_escaped_quotes_inside_strings() {
        let input = r#"{"quote": "He said \"}\" loudly"}"#;
        assert!(try_extract_json_from_response(input).is_success());
    }

    #[test]
    fn test_truncated_json_detected() {
        let input = r#"{"findings": [{"title": "Dark matter halos", "year": 20"#;
        let result = try_extract_json_from_response(input);
        assert!(result.is_truncated());
        assert!(parse_json_response(input).is_none());
    }

    #[test]
    fn test_prose_is_not_found() {
        let result = try_extract_json_from_response("Just prose with no structure at all.");
        assert_eq!(result, JsonExtractionResult::NotFound);
    }

    #[test]
    fn test_parse_json_as_shape_mismatch() {
        #[derive(Debug, Deserialize)]
        struct Finding {
            #[allow(dead_code)]
            title: String,
        }
        assert!(parse_json_as::<Vec<Finding>>(r#"[{"title": "x"}]"#).is_some());
        assert!(parse_json_as::<Vec<Finding>>(r#"{"title": "x"}"#).is_none());
    }

    #[test]
    fn test_find_matching_delimiter() {
        assert_eq!(find_matching_delimiter("{\"a\":{}}", '{', '}'), Some(7));
        assert_eq!(find_matching_delimiter("[1,[2]]", '[', ']'), Some(6));
        assert_eq!(find_matching_delimiter("{\"a\":", '{', '}'), None);
    }
}

//! Turning LLM prose into structure.
//!
//! Stages try JSON first ([`json`]), then fall back to labeled numbers
//! ([`labels`]) and keyword counts ([`markers`]). None of these fail: missing
//! structure only lowers the scores derived from it.

pub mod json;
pub mod labels;
pub mod markers;

pub use json::{parse_json_as, parse_json_response, try_extract_json_from_response, JsonExtractionResult};
pub use labels::{
    extract_all_labeled_numbers, extract_labeled_number, extract_percentage, LabeledScore,
};
pub use markers::{contains_any, count_any, count_exact, count_occurrences, split_sections, word_count};

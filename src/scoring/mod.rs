//! Confidence scoring.
//!
//! Every stage declares its confidence as a weighted sum of named factors
//! ([`Scorecard`]). The factor families are shared:
//!
//! - coverage: `min(found / expected, 1)`
//! - quality: mean sub-score over the maximum
//! - structural markers: binary or graded presence
//! - tier tables: venue, citation and age buckets for academic sources
//!
//! All of them are pure and total. Empty input scores `0.0`.

pub mod factors;
pub mod scorecard;
pub mod tiers;

pub use factors::{
    clamp_unit, coverage, coverage_f64, graded_marker, marker, mean, quality, ratio_fit, round_to,
};
pub use scorecard::{Factor, Scorecard};
pub use tiers::{citation_score, is_top_tier_journal, journal_score, recency_weight};

//! Weighted-sum confidence.

use serde::Serialize;

use super::factors::{clamp_unit, round_to};

/// One named, weighted factor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Factor {
    pub name: &'static str,
    pub weight: f64,
    /// Value after clamping to `[0, 1]`.
    pub value: f64,
}

/// A declared set of factors whose weighted sum is a stage's confidence.
///
/// Factor values are clamped to `[0, 1]` and NaN counts as 0, so the score is
/// in `[0, 1]` for any input and monotone in every factor.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Scorecard {
    factors: Vec<Factor>,
}

impl Scorecard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a factor. Negative weights are treated as zero.
    pub fn factor(mut self, name: &'static str, weight: f64, value: f64) -> Self {
        self.factors.push(Factor {
            name,
            weight: if weight.is_nan() { 0.0 } else { weight.max(0.0) },
            value: clamp_unit(value),
        });
        self
    }

    pub fn factors(&self) -> &[Factor] {
        &self.factors
    }

    /// Sum of declared weights.
    pub fn total_weight(&self) -> f64 {
        self.factors.iter().map(|f| f.weight).sum()
    }

    /// Weighted sum clamped to `[0, 1]`.
    pub fn score(&self) -> f64 {
        clamp_unit(self.factors.iter().map(|f| f.weight * f.value).sum())
    }

    /// [`score`](Self::score) rounded to two decimals, the form stages report.
    pub fn rounded(&self) -> f64 {
        round_to(self.score(), 2)
    }
}

//! Ordered lookup tables for categorical weights.
//!
//! The academic stage grades every paper on venue tier, citation bucket and
//! age bucket. All three are small static tables evaluated top to bottom;
//! the first matching row wins.

/// One row of a [`TierTable`].
pub struct Tier<K: ?Sized + 'static> {
    pub label: &'static str,
    pub matches: fn(&K) -> bool,
    pub weight: f64,
}

/// First-match table from a key to a fixed weight.
pub struct TierTable<K: ?Sized + 'static> {
    tiers: &'static [Tier<K>],
    default_label: &'static str,
    default: f64,
}

impl<K: ?Sized + 'static> TierTable<K> {
    pub const fn new(tiers: &'static [Tier<K>], default_label: &'static str, default: f64) -> Self {
        Self {
            tiers,
            default_label,
            default,
        }
    }

    fn find(&self, key: &K) -> Option<&Tier<K>> {
        self.tiers.iter().find(|tier| (tier.matches)(key))
    }

    /// Weight of the first matching row, or the default.
    pub fn lookup(&self, key: &K) -> f64 {
        self.find(key).map_or(self.default, |tier| tier.weight)
    }

    /// Label of the first matching row, or the default label.
    pub fn classify(&self, key: &K) -> &'static str {
        self.find(key).map_or(self.default_label, |tier| tier.label)
    }
}

/// `(upper bound inclusive, weight)` rows; values above every bound get the default.
#[derive(Debug, Clone, Copy)]
pub struct ThresholdTable {
    rows: &'static [(i64, f64)],
    default: f64,
}

impl ThresholdTable {
    pub const fn new(rows: &'static [(i64, f64)], default: f64) -> Self {
        Self { rows, default }
    }

    pub fn lookup(&self, value: i64) -> f64 {
        self.rows
            .iter()
            .find(|(bound, _)| value <= *bound)
            .map_or(self.default, |(_, weight)| *weight)
    }
}

/// A bucket whose score ramps from `base` to `base + span` across `width` units.
#[derive(Debug, Clone, Copy)]
pub struct Ramp {
    pub min: u64,
    pub width: u64,
    pub base: f64,
    pub span: f64,
}

impl Ramp {
    fn score(&self, value: u64) -> f64 {
        if self.width == 0 {
            return self.base;
        }
        let progress = (value - self.min).min(self.width) as f64 / self.width as f64;
        self.base + progress * self.span
    }
}

/// Buckets ordered from the highest `min` down; the first with `value >= min` applies.
#[derive(Debug, Clone, Copy)]
pub struct RampTable {
    buckets: &'static [Ramp],
}

impl RampTable {
    pub const fn new(buckets: &'static [Ramp]) -> Self {
        Self { buckets }
    }

    pub fn lookup(&self, value: u64) -> f64 {
        self.buckets
            .iter()
            .find(|bucket| value >= bucket.min)
            .map_or(0.0, |bucket| bucket.score(value))
    }
}

fn is_top_venue(journal: &str) -> bool {
    ["nature", "science", "cell"]
        .iter()
        .any(|name| journal.contains(name))
}

fn is_high_venue(journal: &str) -> bool {
    ["physical review", "jama", "lancet", "pnas"]
        .iter()
        .any(|name| journal.contains(name))
}

fn is_peer_reviewed_venue(journal: &str) -> bool {
    journal.contains("journal") || journal.contains("review")
}

const VENUE_ROWS: &[Tier<str>] = &[
    Tier {
        label: "top",
        matches: is_top_venue,
        weight: 10.0,
    },
    Tier {
        label: "high",
        matches: is_high_venue,
        weight: 9.0,
    },
    Tier {
        label: "peer_reviewed",
        matches: is_peer_reviewed_venue,
        weight: 7.0,
    },
];

/// Venue tiers; keys are lower-cased journal names.
pub const JOURNAL_TIERS: TierTable<str> = TierTable::new(VENUE_ROWS, "other", 6.0);

const CITATION_ROWS: &[Ramp] = &[
    Ramp {
        min: 1000,
        width: 0,
        base: 10.0,
        span: 0.0,
    },
    Ramp {
        min: 100,
        width: 900,
        base: 8.0,
        span: 2.0,
    },
    Ramp {
        min: 10,
        width: 90,
        base: 6.0,
        span: 2.0,
    },
    Ramp {
        min: 0,
        width: 10,
        base: 4.0,
        span: 2.0,
    },
];

/// Citation buckets: 1000+ is 10, then 8..10, 6..8 and 4..6.
pub const CITATION_BUCKETS: RampTable = RampTable::new(CITATION_ROWS);

const AGE_ROWS: &[(i64, f64)] = &[(2, 1.0), (5, 0.9), (10, 0.7)];

/// Recency weight by publication age in years.
pub const RECENCY_BY_AGE: ThresholdTable = ThresholdTable::new(AGE_ROWS, 0.5);

/// Venue score for a journal name, case-insensitive.
pub fn journal_score(journal: &str) -> f64 {
    JOURNAL_TIERS.lookup(journal.to_lowercase().as_str())
}

/// Whether the journal falls in the top venue tier.
pub fn is_top_tier_journal(journal: &str) -> bool {
    JOURNAL_TIERS.classify(journal.to_lowercase().as_str()) == "top"
}

/// Citation impact score in `[4, 10]`.
pub fn citation_score(citations: u64) -> f64 {
    CITATION_BUCKETS.lookup(citations)
}

/// Recency weight in `[0.5, 1]`; future years count as age 0.
pub fn recency_weight(year: i64, reference_year: i64) -> f64 {
    RECENCY_BY_AGE.lookup(reference_year.saturating_sub(year).max(0))
}

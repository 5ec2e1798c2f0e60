//! Learned pattern reliability: scales a candidate's confidence by how
//! often its backing patterns have actually paid out.

use crate::db::models::PatternStat;

/// Neutral win rate; a pattern performing at exactly this level leaves
/// confidence untouched.
const NEUTRAL_WIN_RATE: f64 = 0.5;

/// Occurrence count at which a pattern's sample is considered fully
/// trustworthy.
const FULL_SAMPLE: f64 = 20.0;

const MIN_CONFIDENCE: f64 = 0.1;
const MAX_CONFIDENCE: f64 = 1.0;

/// Empirical win rate of a pattern; the neutral prior seeds patterns
/// that have never been observed.
pub fn calculate_pattern_reliability(wins: i64, total: i64) -> f64 {
    if total == 0 {
        NEUTRAL_WIN_RATE
    } else {
        wins as f64 / total as f64
    }
}

/// Adjust a base confidence using the persisted stats of the patterns
/// backing the candidate.
///
/// Each stat is weighted by `min(occurrences / 20, 1)` so that a pattern
/// seen twice cannot drag confidence around the way one seen fifty times
/// can. The sample-weighted average win rate is measured against the 0.5
/// neutral prior and the result clamped to [0.1, 1.0]. No stats, or no
/// weight in the sample, returns the base unchanged.
pub fn adjust_confidence(base: f64, stats: &[PatternStat]) -> f64 {
    if stats.is_empty() {
        return base;
    }

    let mut weighted_sum = 0.0;
    let mut weight_total = 0.0;
    for stat in stats {
        let weight = (stat.occurrences as f64 / FULL_SAMPLE).min(1.0);
        let win_rate = calculate_pattern_reliability(stat.wins, stat.occurrences);
        weighted_sum += weight * win_rate;
        weight_total += weight;
    }
    if weight_total <= 0.0 {
        return base;
    }

    let multiplier = (weighted_sum / weight_total) / NEUTRAL_WIN_RATE;
    (base * multiplier).clamp(MIN_CONFIDENCE, MAX_CONFIDENCE)
}

//! Scores how strongly observed odds drift agrees with the model's pick.
//!
//! Shortening odds on our side mean the market is moving with us (smart
//! money pushing the price down); lengthening odds mean it disagrees.
//! Totals and other non-1X2 picks have no usable drift signal in the
//! 1X2-centric odds feed, so they earn only the stability bonus.

use crate::db::models::OddsSnapshot;

use super::markets::BetType;

const BASE_SCORE: f64 = 0.5;
const MAX_AGREEMENT_BONUS: f64 = 0.3;
const AGREEMENT_RATE: f64 = 0.1;
const MAX_DISAGREEMENT_PENALTY: f64 = 0.2;
const DISAGREEMENT_RATE: f64 = 0.08;
const MAX_STABILITY_BONUS: f64 = 0.1;
const STABILITY_PER_SNAPSHOT: f64 = 0.02;

/// Score market agreement for a pick from the chronological odds history
/// (oldest snapshot first). Fewer than two snapshots give the neutral
/// 0.5. Result is clamped to [0.1, 1.0] and rounded to 3 decimals.
pub fn get_score(bet_type: BetType, history: &[OddsSnapshot]) -> f64 {
    if history.len() < 2 {
        return BASE_SCORE;
    }
    let first = &history[0];
    let latest = &history[history.len() - 1];

    let mut score = BASE_SCORE;
    match bet_type {
        BetType::HomeWin => {
            if let (Some(open), Some(now)) = (first.home_odds, latest.home_odds) {
                score += drift_adjustment(now - open);
            }
        }
        BetType::AwayWin => {
            if let (Some(open), Some(now)) = (first.away_odds, latest.away_odds) {
                score += drift_adjustment(now - open);
            }
        }
        // Draw picks and non-1X2 markets: drift carries no signal.
        _ => {}
    }

    score += (history.len() as f64 * STABILITY_PER_SNAPSHOT).min(MAX_STABILITY_BONUS);

    round3(score.clamp(0.1, 1.0))
}

/// Positive drift = odds lengthened (market moved against the pick);
/// negative drift = odds shortened (market agrees).
fn drift_adjustment(drift: f64) -> f64 {
    if drift < 0.0 {
        (drift.abs() * AGREEMENT_RATE).min(MAX_AGREEMENT_BONUS)
    } else if drift > 0.0 {
        -(drift * DISAGREEMENT_RATE).min(MAX_DISAGREEMENT_PENALTY)
    } else {
        0.0
    }
}

fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

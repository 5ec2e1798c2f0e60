//! Finds value edges by comparing model probabilities with market prices.
//!
//! Quoted markets (1X2 and the totals lines) are priced straight off the
//! latest bookmaker snapshot. Markets with no live feed are compared
//! against a table of typical reference prices instead and flagged as not
//! bookmaker-backed; the "odds" reported for those are the fair-value
//! price implied by the model.

use crate::db::models::OddsSnapshot;

use super::features::FeatureVector;
use super::markets::{BetType, MarketCategory};
use super::probability::ProbabilityReport;

/// Model-only candidates below this probability are noise, not value.
const MIN_MODEL_PROB: f64 = 0.05;

/// Bet types with live prices in the odds feed.
const QUOTED_MARKETS: &[BetType] = &[
    BetType::HomeWin,
    BetType::Draw,
    BetType::AwayWin,
    BetType::Over15,
    BetType::Under15,
    BetType::Over25,
    BetType::Under25,
    BetType::Over35,
    BetType::Under35,
];

/// Bet types priced against the reference table.
const MODEL_ONLY_MARKETS: &[BetType] = &[
    BetType::BttsYes,
    BetType::BttsNo,
    BetType::CleanSheetHome,
    BetType::CleanSheetAway,
    BetType::OddGoals,
    BetType::EvenGoals,
    BetType::HtHome,
    BetType::HtDraw,
    BetType::HtAway,
    BetType::HtOver05,
    BetType::LateGoal,
];

/// One evaluated bet for one match. Produced sorted by descending edge
/// and consumed within the same analysis pass.
#[derive(Debug, Clone)]
pub struct MarketCandidate {
    pub bet_type: BetType,
    pub category: MarketCategory,
    pub predicted_prob: f64,
    pub implied_prob: f64,
    /// Quoted decimal odds, or the fair-value price for model-only markets
    pub odds: f64,
    pub edge: f64,
    /// Feature-space agreement proxy for the pick
    pub consistency: f64,
    pub has_bookmaker_odds: bool,
}

impl MarketCandidate {
    /// Odds used for Kelly sizing: the quoted price when bookmaker-backed,
    /// otherwise the reference price the edge was measured against. The
    /// reported fair-value `odds` would size to zero by construction.
    pub fn staking_odds(&self) -> f64 {
        if self.has_bookmaker_odds {
            self.odds
        } else {
            1.0 / self.implied_prob
        }
    }
}

pub struct ValueDetector {
    min_edge: f64,
}

impl ValueDetector {
    pub fn new(min_edge: f64) -> Self {
        ValueDetector { min_edge }
    }

    /// Edge = predicted probability minus market-implied probability.
    pub fn find_edge(predicted: f64, implied: f64) -> f64 {
        predicted - implied
    }

    /// Evaluate every market for one match, returning the candidates that
    /// clear the edge bar sorted by descending edge.
    pub fn evaluate_all_markets(
        &self,
        probs: &ProbabilityReport,
        odds: Option<&OddsSnapshot>,
        features: &FeatureVector,
    ) -> Vec<MarketCandidate> {
        let mut candidates = Vec::new();

        if let Some(snap) = odds {
            for &bet in QUOTED_MARKETS {
                let Some(decimal) = quoted_odds(snap, bet) else {
                    continue;
                };
                if decimal <= 1.0 {
                    continue;
                }
                let predicted = predicted_probability(probs, bet);
                let implied = 1.0 / decimal;
                let edge = Self::find_edge(predicted, implied);
                if edge < self.min_edge {
                    continue;
                }
                candidates.push(MarketCandidate {
                    bet_type: bet,
                    category: bet.category(),
                    predicted_prob: round4(predicted),
                    implied_prob: round4(implied),
                    odds: decimal,
                    edge: round4(edge),
                    consistency: round4(consistency(bet, features)),
                    has_bookmaker_odds: true,
                });
            }
        }

        for &bet in MODEL_ONLY_MARKETS {
            let predicted = predicted_probability(probs, bet);
            if predicted < MIN_MODEL_PROB {
                continue;
            }
            let reference = reference_odds(bet);
            let implied = 1.0 / reference;
            let edge = Self::find_edge(predicted, implied);
            if edge < self.min_edge {
                continue;
            }
            candidates.push(MarketCandidate {
                bet_type: bet,
                category: bet.category(),
                predicted_prob: round4(predicted),
                implied_prob: round4(implied),
                odds: round2(1.0 / predicted),
                edge: round4(edge),
                consistency: round4(consistency(bet, features)),
                has_bookmaker_odds: false,
            });
        }

        candidates.sort_by(|a, b| b.edge.total_cmp(&a.edge));
        candidates
    }
}

/// Model probability for a bet type. Under-lines are the complement of
/// the paired over-line; their quoted price still comes from the under
/// market's own field, which bookmakers do not price as an exact
/// complement. That asymmetry is deliberate: model complement versus
/// real market price.
fn predicted_probability(probs: &ProbabilityReport, bet: BetType) -> f64 {
    match bet {
        BetType::HomeWin => probs.home,
        BetType::Draw => probs.draw,
        BetType::AwayWin => probs.away,
        BetType::Over15 => probs.over_15,
        BetType::Under15 => 1.0 - probs.over_15,
        BetType::Over25 => probs.over_25,
        BetType::Under25 => 1.0 - probs.over_25,
        BetType::Over35 => probs.over_35,
        BetType::Under35 => 1.0 - probs.over_35,
        BetType::BttsYes => probs.btts_yes,
        BetType::BttsNo => probs.btts_no,
        BetType::CleanSheetHome => probs.clean_sheet_home,
        BetType::CleanSheetAway => probs.clean_sheet_away,
        BetType::OddGoals => probs.odd_goals,
        BetType::EvenGoals => probs.even_goals,
        BetType::HtHome => probs.ht_home,
        BetType::HtDraw => probs.ht_draw,
        BetType::HtAway => probs.ht_away,
        BetType::HtOver05 => probs.ht_over_05,
        BetType::LateGoal => probs.late_goal,
    }
}

fn quoted_odds(snap: &OddsSnapshot, bet: BetType) -> Option<f64> {
    match bet {
        BetType::HomeWin => snap.home_odds,
        BetType::Draw => snap.draw_odds,
        BetType::AwayWin => snap.away_odds,
        BetType::Over15 => snap.over_15_odds,
        BetType::Under15 => snap.under_15_odds,
        BetType::Over25 => snap.over_25_odds,
        BetType::Under25 => snap.under_25_odds,
        BetType::Over35 => snap.over_35_odds,
        BetType::Under35 => snap.under_35_odds,
        _ => None,
    }
}

/// Typical prices for markets the odds feed does not quote, used as the
/// implied-probability reference when hunting model-only value.
fn reference_odds(bet: BetType) -> f64 {
    match bet {
        BetType::BttsYes => 1.80,
        BetType::BttsNo => 1.95,
        BetType::CleanSheetHome => 2.50,
        BetType::CleanSheetAway => 3.00,
        BetType::OddGoals => 1.90,
        BetType::EvenGoals => 1.90,
        BetType::HtHome => 2.80,
        BetType::HtDraw => 2.00,
        BetType::HtAway => 4.50,
        BetType::HtOver05 => 1.40,
        BetType::LateGoal => 2.20,
        _ => 2.0,
    }
}

/// Feature-space proxy for how consistently the trailing data supports a
/// pick; 0.5 when no feature maps to the bet type.
fn consistency(bet: BetType, features: &FeatureVector) -> f64 {
    match bet {
        BetType::HomeWin => features.home_form_avg,
        BetType::AwayWin => features.away_form_avg,
        BetType::Over15 => features.over_15_home_rate,
        BetType::Over25 => features.over_25_home_rate,
        BetType::Over35 => features.over_35_home_rate,
        BetType::Under15 => 1.0 - features.over_15_home_rate,
        BetType::Under25 => 1.0 - features.over_25_home_rate,
        BetType::Under35 => 1.0 - features.over_35_home_rate,
        BetType::BttsYes => features.btts_home_rate,
        BetType::BttsNo => 1.0 - features.btts_home_rate,
        BetType::CleanSheetHome => features.clean_sheet_home_rate,
        BetType::CleanSheetAway => features.clean_sheet_away_rate,
        BetType::OddGoals => features.odd_goals_rate,
        BetType::EvenGoals => 1.0 - features.odd_goals_rate,
        BetType::LateGoal => features.late_goal_home_rate,
        BetType::Draw | BetType::HtHome | BetType::HtDraw | BetType::HtAway | BetType::HtOver05 => {
            0.5
        }
    }
}

fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{TimeZone, Utc};

    fn report() -> ProbabilityReport {
        ProbabilityReport {
            home: 0.50,
            draw: 0.27,
            away: 0.23,
            over_05: 0.93,
            over_15: 0.75,
            over_25: 0.52,
            over_35: 0.30,
            btts_yes: 0.58,
            btts_no: 0.42,
            clean_sheet_home: 0.30,
            clean_sheet_away: 0.20,
            odd_goals: 0.50,
            even_goals: 0.50,
            ht_home: 0.38,
            ht_draw: 0.42,
            ht_away: 0.20,
            ht_over_05: 0.70,
            ht_over_15: 0.35,
            late_goal: 0.45,
            home_xg: 1.6,
            away_xg: 1.1,
        }
    }

    fn features() -> FeatureVector {
        FeatureVector {
            home_form_avg: 0.6,
            away_form_avg: 0.2,
            position_gap: 4.0,
            home_scored_avg: 1.8,
            home_conceded_avg: 0.9,
            away_scored_avg: 0.9,
            away_conceded_avg: 1.5,
            ht_home_scored_avg: 0.7,
            ht_home_conceded_avg: 0.4,
            ht_away_scored_avg: 0.3,
            ht_away_conceded_avg: 0.7,
            over_15_home_rate: 0.8,
            over_25_home_rate: 0.6,
            over_35_home_rate: 0.2,
            btts_home_rate: 0.6,
            btts_away_rate: 0.4,
            clean_sheet_home_rate: 0.4,
            clean_sheet_away_rate: 0.2,
            odd_goals_rate: 0.6,
            late_goal_home_rate: 0.4,
        }
    }

    fn odds(home: Option<f64>, over_25: Option<f64>, under_25: Option<f64>) -> OddsSnapshot {
        OddsSnapshot {
            id: 1,
            match_id: 1,
            bookmaker: "average".into(),
            recorded_at: Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap(),
            home_odds: home,
            draw_odds: Some(3.4),
            away_odds: Some(4.2),
            over_15_odds: None,
            under_15_odds: None,
            over_25_odds: over_25,
            under_25_odds: under_25,
            over_35_odds: None,
            under_35_odds: None,
        }
    }

    #[test]
    fn find_edge_is_a_plain_difference() {
        assert_relative_eq!(ValueDetector::find_edge(0.55, 0.45), 0.10, epsilon = 1e-12);
        assert!(ValueDetector::find_edge(0.40, 0.45) < 0.0);
    }

    #[test]
    fn quoted_market_with_edge_is_detected() {
        // Model 50% vs 2.40 quote (41.7% implied) → 8.3% edge.
        let detector = ValueDetector::new(0.05);
        let snap = odds(Some(2.4), None, None);
        let candidates = detector.evaluate_all_markets(&report(), Some(&snap), &features());
        let home = candidates
            .iter()
            .find(|c| c.bet_type == BetType::HomeWin)
            .expect("home win candidate");
        assert!(home.has_bookmaker_odds);
        assert_relative_eq!(home.odds, 2.4);
        assert_relative_eq!(home.edge, 0.0833, epsilon = 1e-4);
        assert_relative_eq!(home.consistency, 0.6);
    }

    #[test]
    fn missing_or_degenerate_odds_are_skipped() {
        let detector = ValueDetector::new(0.05);
        let snap = odds(None, Some(1.0), None);
        let candidates = detector.evaluate_all_markets(&report(), Some(&snap), &features());
        assert!(!candidates.iter().any(|c| c.bet_type == BetType::HomeWin));
        assert!(!candidates.iter().any(|c| c.bet_type == BetType::Over25));
    }

    #[test]
    fn under_line_uses_complement_probability_but_its_own_price() {
        // over_25 = 0.52 → under predicted 0.48; quoted under price 2.30
        // implies 43.5%, edge ≈ 4.5% < 5% → excluded. At 2.50 implied 40%,
        // edge 8% → included.
        let detector = ValueDetector::new(0.05);
        let snap = odds(None, None, Some(2.3));
        let candidates = detector.evaluate_all_markets(&report(), Some(&snap), &features());
        assert!(!candidates.iter().any(|c| c.bet_type == BetType::Under25));

        let snap = odds(None, None, Some(2.5));
        let candidates = detector.evaluate_all_markets(&report(), Some(&snap), &features());
        let under = candidates
            .iter()
            .find(|c| c.bet_type == BetType::Under25)
            .expect("under candidate");
        assert_relative_eq!(under.predicted_prob, 0.48);
        assert_relative_eq!(under.odds, 2.5);
        assert_relative_eq!(under.edge, 0.08, epsilon = 1e-12);
        // Complement consistency of the over-2.5 rate.
        assert_relative_eq!(under.consistency, 0.4, epsilon = 1e-12);
    }

    #[test]
    fn model_only_markets_price_against_the_reference_table() {
        let detector = ValueDetector::new(0.05);
        let candidates = detector.evaluate_all_markets(&report(), None, &features());
        // BTTS_YES: 0.58 vs 1/1.80 = 0.5556 → edge 2.4% → excluded.
        assert!(!candidates.iter().any(|c| c.bet_type == BetType::BttsYes));
        // HT_DRAW: 0.42 vs 1/2.00 = 0.50 → negative edge → excluded.
        assert!(!candidates.iter().any(|c| c.bet_type == BetType::HtDraw));
        // LATE_GOAL: 0.45 vs 1/2.20 = 0.4545 → negative edge → excluded.
        assert!(!candidates.iter().any(|c| c.bet_type == BetType::LateGoal));
        // HT_OVER_0.5: 0.70 vs 1/1.40 = 0.7143 → negative → excluded.
        assert!(!candidates.iter().any(|c| c.bet_type == BetType::HtOver05));
        // EVEN_GOALS: 0.50 vs 1/1.90 = 0.5263 → negative → excluded.
        // ODD_GOALS identical. HT_HOME: 0.38 vs 1/2.80 = 0.3571 → 2.3% → excluded.
        // CLEAN_SHEET_AWAY: 0.20 vs 1/3.00 = 0.3333 → negative → excluded.
        // The one that clears: nothing at these probabilities.
        assert!(candidates.is_empty());
    }

    #[test]
    fn model_only_candidate_reports_fair_value_odds() {
        let detector = ValueDetector::new(0.05);
        let mut probs = report();
        probs.clean_sheet_home = 0.48; // vs 1/2.50 = 0.40 → 8% edge
        let candidates = detector.evaluate_all_markets(&probs, None, &features());
        let cs = candidates
            .iter()
            .find(|c| c.bet_type == BetType::CleanSheetHome)
            .expect("clean sheet candidate");
        assert!(!cs.has_bookmaker_odds);
        assert_relative_eq!(cs.implied_prob, 0.4);
        // Fair value, not the reference price: 1 / 0.48 ≈ 2.08.
        assert_relative_eq!(cs.odds, 2.08);
        assert_relative_eq!(cs.edge, 0.08, epsilon = 1e-12);
    }

    #[test]
    fn tiny_model_probabilities_are_ignored() {
        let detector = ValueDetector::new(0.05);
        let mut probs = report();
        probs.ht_away = 0.04; // would have huge "edge" vs 4.50 if not gated
        let candidates = detector.evaluate_all_markets(&probs, None, &features());
        assert!(!candidates.iter().any(|c| c.bet_type == BetType::HtAway));
    }

    #[test]
    fn candidates_come_back_sorted_by_descending_edge() {
        let detector = ValueDetector::new(0.05);
        let snap = odds(Some(2.4), Some(2.2), None);
        let mut probs = report();
        probs.clean_sheet_home = 0.55;
        let candidates = detector.evaluate_all_markets(&probs, Some(&snap), &features());
        assert!(candidates.len() >= 2);
        for pair in candidates.windows(2) {
            assert!(pair[0].edge >= pair[1].edge);
        }
    }
}

//! Multi-market outcome probabilities from an independent-Poisson
//! scoreline model.
//!
//! Attack/defence strength ratios are formed against fixed league
//! baselines, nudged by form and table position, and turned into expected
//! goals per side. A scoreline grid P(h, a) = Pois(home_xg, h) ·
//! Pois(away_xg, a) then yields every derived market: 1X2, totals lines,
//! BTTS, clean sheets, goal parity and a scaled-down half-time block.
//! The late-goal market is a second-half proxy rather than a grid readout.

use super::features::FeatureVector;

/// League-average goals per match for the home and away side.
const LEAGUE_HOME_GOALS: f64 = 1.45;
const LEAGUE_AWAY_GOALS: f64 = 1.15;

/// Form baselines the adjustment term measures excess against.
const HOME_FORM_BASELINE: f64 = 0.4;
const AWAY_FORM_BASELINE: f64 = 0.3;
const HOME_FORM_WEIGHT: f64 = 0.3;
const AWAY_FORM_WEIGHT: f64 = 0.2;

/// Position gap contribution, and its damping when folded into xg.
const POSITION_GAP_WEIGHT: f64 = 0.02;
const POSITION_GAP_XG_SCALE: f64 = 0.1;

/// No xg is allowed below this; even hopeless sides score sometimes.
const XG_FLOOR: f64 = 0.3;

/// Scoreline grid sizes (goals 0..=N per side).
const MAX_GOALS_FULL_TIME: usize = 7;
const MAX_GOALS_HALF_TIME: usize = 5;

/// Share of a match's expected goals falling in the first half.
const HALF_TIME_XG_SHARE: f64 = 0.42;

/// Second-half share and the rate constant of the late-goal proxy.
const SECOND_HALF_XG_SHARE: f64 = 0.58;
const LATE_GOAL_RATE: f64 = 0.4;

/// Full multi-market probability report for one match.
///
/// Probabilities are rounded to 4 decimals, expected goals to 2.
/// Outcomes partitioning the same event space sum to 1 within rounding
/// tolerance.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbabilityReport {
    pub home: f64,
    pub draw: f64,
    pub away: f64,
    pub over_05: f64,
    pub over_15: f64,
    pub over_25: f64,
    pub over_35: f64,
    pub btts_yes: f64,
    pub btts_no: f64,
    pub clean_sheet_home: f64,
    pub clean_sheet_away: f64,
    pub odd_goals: f64,
    pub even_goals: f64,
    pub ht_home: f64,
    pub ht_draw: f64,
    pub ht_away: f64,
    pub ht_over_05: f64,
    pub ht_over_15: f64,
    pub late_goal: f64,
    pub home_xg: f64,
    pub away_xg: f64,
}

impl ProbabilityReport {
    /// Outcome keys in fixed report order, expected-goals excluded.
    pub fn outcomes(&self) -> [(&'static str, f64); 19] {
        [
            ("home", self.home),
            ("draw", self.draw),
            ("away", self.away),
            ("over_05", self.over_05),
            ("over_15", self.over_15),
            ("over_25", self.over_25),
            ("over_35", self.over_35),
            ("btts_yes", self.btts_yes),
            ("btts_no", self.btts_no),
            ("clean_sheet_home", self.clean_sheet_home),
            ("clean_sheet_away", self.clean_sheet_away),
            ("odd_goals", self.odd_goals),
            ("even_goals", self.even_goals),
            ("ht_home", self.ht_home),
            ("ht_draw", self.ht_draw),
            ("ht_away", self.ht_away),
            ("ht_over_05", self.ht_over_05),
            ("ht_over_15", self.ht_over_15),
            ("late_goal", self.late_goal),
        ]
    }

    /// Key of the single most likely outcome in the report.
    pub fn dominant_outcome(&self) -> &'static str {
        self.outcomes()
            .iter()
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(key, _)| *key)
            .expect("report has outcomes")
    }
}

/// Compute the full probability report for one feature vector.
pub fn calculate_probabilities(features: &FeatureVector) -> ProbabilityReport {
    let (home_xg, away_xg) = expected_goals(features);

    let grid = ScoreGrid::new(home_xg, away_xg, MAX_GOALS_FULL_TIME);

    let home = grid.mass(|h, a| h > a);
    let draw = grid.mass(|h, a| h == a);
    let away = grid.mass(|h, a| h < a);

    let over_05 = 1.0 - grid.mass(|h, a| h + a == 0);
    let over_15 = 1.0 - grid.mass(|h, a| h + a <= 1);
    let over_25 = 1.0 - grid.mass(|h, a| h + a <= 2);
    let over_35 = 1.0 - grid.mass(|h, a| h + a <= 3);

    let home_blank = grid.mass(|h, _| h == 0);
    let away_blank = grid.mass(|_, a| a == 0);
    let both_blank = grid.mass(|h, a| h == 0 && a == 0);
    let btts_yes = 1.0 - home_blank - away_blank + both_blank;

    let odd_goals = grid.mass(|h, a| (h + a) % 2 == 1);
    let even_goals = grid.mass(|h, a| (h + a) % 2 == 0);

    let ht_grid = ScoreGrid::new(
        home_xg * HALF_TIME_XG_SHARE,
        away_xg * HALF_TIME_XG_SHARE,
        MAX_GOALS_HALF_TIME,
    );
    let ht_home = ht_grid.mass(|h, a| h > a);
    let ht_draw = ht_grid.mass(|h, a| h == a);
    let ht_away = ht_grid.mass(|h, a| h < a);
    let ht_over_05 = 1.0 - ht_grid.mass(|h, a| h + a == 0);
    let ht_over_15 = 1.0 - ht_grid.mass(|h, a| h + a <= 1);

    // Proxy for a busy finish: 2+ goals after the break. Not a grid
    // readout; the grid has no notion of when goals fall.
    let second_half_xg = SECOND_HALF_XG_SHARE * (home_xg + away_xg);
    let late_goal = 1.0 - (-second_half_xg * LATE_GOAL_RATE).exp();

    ProbabilityReport {
        home: round_prob(home),
        draw: round_prob(draw),
        away: round_prob(away),
        over_05: round_prob(over_05),
        over_15: round_prob(over_15),
        over_25: round_prob(over_25),
        over_35: round_prob(over_35),
        btts_yes: round_prob(btts_yes),
        btts_no: round_prob(1.0 - btts_yes),
        clean_sheet_home: round_prob(away_blank),
        clean_sheet_away: round_prob(home_blank),
        odd_goals: round_prob(odd_goals),
        even_goals: round_prob(even_goals),
        ht_home: round_prob(ht_home),
        ht_draw: round_prob(ht_draw),
        ht_away: round_prob(ht_away),
        ht_over_05: round_prob(ht_over_05),
        ht_over_15: round_prob(ht_over_15),
        late_goal: round_prob(late_goal),
        home_xg: round_xg(home_xg),
        away_xg: round_xg(away_xg),
    }
}

/// Expected goals per side from strength ratios plus form and table
/// adjustments, floored at [`XG_FLOOR`].
fn expected_goals(f: &FeatureVector) -> (f64, f64) {
    let home_attack = f.home_scored_avg / LEAGUE_HOME_GOALS;
    let home_defense = f.home_conceded_avg / LEAGUE_AWAY_GOALS;
    let away_attack = f.away_scored_avg / LEAGUE_AWAY_GOALS;
    let away_defense = f.away_conceded_avg / LEAGUE_HOME_GOALS;

    let home_xg = home_attack * away_defense * LEAGUE_HOME_GOALS;
    let away_xg = away_attack * home_defense * LEAGUE_AWAY_GOALS;

    let form_term = (f.home_form_avg - HOME_FORM_BASELINE) * HOME_FORM_WEIGHT
        - (f.away_form_avg - AWAY_FORM_BASELINE) * AWAY_FORM_WEIGHT;
    let gap_term = f.position_gap * POSITION_GAP_WEIGHT * POSITION_GAP_XG_SCALE;
    let adjustment = form_term + gap_term;

    (
        (home_xg + adjustment).max(XG_FLOOR),
        (away_xg - adjustment).max(XG_FLOOR),
    )
}

/// Normalized independent-Poisson scoreline grid over goals 0..=max per
/// side.
struct ScoreGrid {
    cells: Vec<Vec<f64>>,
}

impl ScoreGrid {
    fn new(home_xg: f64, away_xg: f64, max_goals: usize) -> Self {
        let home_pmf = poisson_pmf(home_xg, max_goals);
        let away_pmf = poisson_pmf(away_xg, max_goals);

        let mut cells = vec![vec![0.0; max_goals + 1]; max_goals + 1];
        let mut total = 0.0;
        for (h, ph) in home_pmf.iter().enumerate() {
            for (a, pa) in away_pmf.iter().enumerate() {
                cells[h][a] = ph * pa;
                total += cells[h][a];
            }
        }
        // Normalize away the truncated tail so grid-derived outcome
        // families always sum to 1.
        if total > 0.0 {
            for row in &mut cells {
                for cell in row.iter_mut() {
                    *cell /= total;
                }
            }
        }
        ScoreGrid { cells }
    }

    /// Total probability mass of scorelines satisfying the predicate.
    fn mass(&self, pred: impl Fn(usize, usize) -> bool) -> f64 {
        let mut sum = 0.0;
        for (h, row) in self.cells.iter().enumerate() {
            for (a, p) in row.iter().enumerate() {
                if pred(h, a) {
                    sum += p;
                }
            }
        }
        sum
    }
}

/// Poisson pmf for k = 0..=max_k via the multiplicative recurrence.
fn poisson_pmf(lambda: f64, max_k: usize) -> Vec<f64> {
    let lambda = lambda.max(0.0);
    let mut pmf = vec![0.0; max_k + 1];
    pmf[0] = (-lambda).exp();
    for k in 1..=max_k {
        pmf[k] = pmf[k - 1] * lambda / k as f64;
    }
    pmf
}

fn round_prob(p: f64) -> f64 {
    (p * 10_000.0).round() / 10_000.0
}

fn round_xg(xg: f64) -> f64 {
    (xg * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn neutral_features() -> FeatureVector {
        FeatureVector {
            home_form_avg: 0.4,
            away_form_avg: 0.3,
            position_gap: 0.0,
            home_scored_avg: 1.2,
            home_conceded_avg: 1.0,
            away_scored_avg: 1.0,
            away_conceded_avg: 1.3,
            ht_home_scored_avg: 0.5,
            ht_home_conceded_avg: 0.45,
            ht_away_scored_avg: 0.4,
            ht_away_conceded_avg: 0.55,
            over_15_home_rate: 0.7,
            over_25_home_rate: 0.5,
            over_35_home_rate: 0.3,
            btts_home_rate: 0.5,
            btts_away_rate: 0.5,
            clean_sheet_home_rate: 0.3,
            clean_sheet_away_rate: 0.25,
            odd_goals_rate: 0.5,
            late_goal_home_rate: 0.4,
        }
    }

    fn feature_grid() -> Vec<FeatureVector> {
        let mut out = Vec::new();
        for scored in [0.3, 1.0, 1.8, 3.0] {
            for conceded in [0.4, 1.1, 2.2] {
                for gap in [-12.0, 0.0, 9.0] {
                    let mut f = neutral_features();
                    f.home_scored_avg = scored;
                    f.away_conceded_avg = conceded;
                    f.home_form_avg = 0.8;
                    f.position_gap = gap;
                    out.push(f);
                }
            }
        }
        out
    }

    #[test]
    fn match_outcomes_sum_to_one() {
        for f in feature_grid() {
            let report = calculate_probabilities(&f);
            let sum = report.home + report.draw + report.away;
            assert!(
                (sum - 1.0).abs() < 0.01,
                "1X2 sum {:.4} out of tolerance for {:?}",
                sum,
                f
            );
        }
    }

    #[test]
    fn totals_ladder_is_monotonic() {
        for f in feature_grid() {
            let r = calculate_probabilities(&f);
            assert!(r.over_05 >= r.over_15, "over_05 < over_15");
            assert!(r.over_15 >= r.over_25, "over_15 < over_25");
            assert!(r.over_25 >= r.over_35, "over_25 < over_35");
        }
    }

    #[test]
    fn complementary_pairs_sum_to_one() {
        for f in feature_grid() {
            let r = calculate_probabilities(&f);
            assert!((r.btts_yes + r.btts_no - 1.0).abs() < 1e-3);
            assert!((r.odd_goals + r.even_goals - 1.0).abs() < 1e-3);
        }
    }

    #[test]
    fn half_time_outcomes_sum_to_one() {
        for f in feature_grid() {
            let r = calculate_probabilities(&f);
            let sum = r.ht_home + r.ht_draw + r.ht_away;
            assert!((sum - 1.0).abs() < 0.01, "HT sum {:.4}", sum);
        }
    }

    #[test]
    fn stronger_attack_raises_home_xg_and_win_probability() {
        let weak = calculate_probabilities(&neutral_features());
        let mut f = neutral_features();
        f.home_scored_avg = 2.4;
        f.home_form_avg = 0.8;
        let strong = calculate_probabilities(&f);
        assert!(strong.home_xg > weak.home_xg);
        assert!(strong.home > weak.home);
        assert!(strong.over_25 > weak.over_25);
    }

    #[test]
    fn position_gap_shifts_expected_goals() {
        let mut favourite = neutral_features();
        favourite.position_gap = 10.0;
        let mut underdog = neutral_features();
        underdog.position_gap = -10.0;
        let fav = calculate_probabilities(&favourite);
        let dog = calculate_probabilities(&underdog);
        assert!(fav.home_xg > dog.home_xg);
        assert!(fav.home > dog.home);
    }

    #[test]
    fn xg_never_drops_below_floor() {
        let mut f = neutral_features();
        f.home_scored_avg = 0.0;
        f.home_form_avg = 0.0;
        f.away_form_avg = 1.0;
        f.position_gap = -20.0;
        let r = calculate_probabilities(&f);
        assert!(r.home_xg >= XG_FLOOR);
        assert!(r.away_xg >= XG_FLOOR);
    }

    #[test]
    fn half_time_block_is_quieter_than_full_time() {
        let r = calculate_probabilities(&neutral_features());
        assert!(r.ht_over_05 < r.over_05);
        assert!(r.ht_over_15 < r.over_15);
        assert!(r.ht_draw > r.draw);
    }

    #[test]
    fn late_goal_matches_closed_form() {
        let r = calculate_probabilities(&neutral_features());
        let expected = 1.0 - (-(0.58 * (r.home_xg + r.away_xg)) * 0.4).exp();
        // Reported xg values are rounded, so allow a loose tolerance.
        assert_relative_eq!(r.late_goal, expected, epsilon = 5e-3);
    }

    #[test]
    fn clean_sheet_probabilities_reflect_defensive_strength() {
        let mut f = neutral_features();
        f.away_scored_avg = 0.3;
        f.home_conceded_avg = 0.4;
        let r = calculate_probabilities(&f);
        let baseline = calculate_probabilities(&neutral_features());
        assert!(r.clean_sheet_home > baseline.clean_sheet_home);
    }

    #[test]
    fn dominant_outcome_is_argmax() {
        let mut f = neutral_features();
        f.home_scored_avg = 3.5;
        f.home_form_avg = 1.0;
        f.position_gap = 15.0;
        let r = calculate_probabilities(&f);
        let max = r
            .outcomes()
            .iter()
            .cloned()
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .unwrap();
        assert_eq!(r.dominant_outcome(), max.0);
    }

    #[test]
    fn poisson_pmf_recurrence_matches_direct_formula() {
        let pmf = poisson_pmf(1.45, 7);
        // P(k=2) = e^-λ λ^2 / 2!
        let direct = (-1.45f64).exp() * 1.45f64.powi(2) / 2.0;
        assert_relative_eq!(pmf[2], direct, epsilon = 1e-12);
    }
}

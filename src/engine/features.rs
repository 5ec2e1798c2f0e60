//! Derives a flat numeric feature vector for one upcoming match from the
//! two teams' trailing venue histories and the current league table.
//!
//! Every feature has a documented neutral prior so a freshly promoted team
//! with no history still produces a usable vector; priors sit near
//! league-typical values rather than 0.5 across the board.

use crate::db::models::{MatchRecord, StandingRow};

/// Trailing matches considered per side.
const FORM_WINDOW: usize = 5;

/// League-table position assumed when a team is missing from the snapshot.
const DEFAULT_POSITION: i64 = 10;

// Priors used when a side has no usable history.
const DEFAULT_HOME_FORM: f64 = 0.4;
const DEFAULT_AWAY_FORM: f64 = 0.3;
const DEFAULT_HOME_SCORED: f64 = 1.2;
const DEFAULT_HOME_CONCEDED: f64 = 1.0;
const DEFAULT_AWAY_SCORED: f64 = 1.0;
const DEFAULT_AWAY_CONCEDED: f64 = 1.3;
const DEFAULT_HT_HOME_SCORED: f64 = 0.5;
const DEFAULT_HT_HOME_CONCEDED: f64 = 0.45;
const DEFAULT_HT_AWAY_SCORED: f64 = 0.4;
const DEFAULT_HT_AWAY_CONCEDED: f64 = 0.55;
const DEFAULT_OVER_15_RATE: f64 = 0.7;
const DEFAULT_OVER_25_RATE: f64 = 0.5;
const DEFAULT_OVER_35_RATE: f64 = 0.3;
const DEFAULT_BTTS_RATE: f64 = 0.5;
const DEFAULT_CLEAN_SHEET_HOME_RATE: f64 = 0.3;
const DEFAULT_CLEAN_SHEET_AWAY_RATE: f64 = 0.25;
const DEFAULT_ODD_GOALS_RATE: f64 = 0.5;
const DEFAULT_LATE_GOAL_RATE: f64 = 0.4;

/// Fixed-key bundle of derived numeric signals for one match.
///
/// Built fresh per analysis pass, never persisted, never mutated after
/// construction.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    /// Home team's win rate over its trailing home matches
    pub home_form_avg: f64,
    /// Away team's win rate over its trailing away matches
    pub away_form_avg: f64,
    /// Away standing position minus home standing position; positive means
    /// the home side is ranked higher
    pub position_gap: f64,
    pub home_scored_avg: f64,
    pub home_conceded_avg: f64,
    pub away_scored_avg: f64,
    pub away_conceded_avg: f64,
    /// Half-time goal averages, from matches with a recorded HT score
    pub ht_home_scored_avg: f64,
    pub ht_home_conceded_avg: f64,
    pub ht_away_scored_avg: f64,
    pub ht_away_conceded_avg: f64,
    /// Share of the home side's matches with 2+/3+/4+ combined goals
    pub over_15_home_rate: f64,
    pub over_25_home_rate: f64,
    pub over_35_home_rate: f64,
    pub btts_home_rate: f64,
    pub btts_away_rate: f64,
    /// Share of home matches where the away side failed to score
    pub clean_sheet_home_rate: f64,
    /// Share of away matches where the home side failed to score
    pub clean_sheet_away_rate: f64,
    /// Share of home matches with an odd combined goal count
    pub odd_goals_rate: f64,
    /// Share of home matches (with HT scores) seeing 2+ second-half goals
    pub late_goal_home_rate: f64,
}

/// Build the feature vector for one match. Pure function of its inputs.
///
/// `home_history` holds the home team's finished home-venue matches and
/// `away_history` the away team's finished away-venue matches, both newest
/// first; only the most recent [`FORM_WINDOW`] of each are used.
pub fn build_features(
    target: &MatchRecord,
    home_history: &[MatchRecord],
    away_history: &[MatchRecord],
    standings: &[StandingRow],
) -> FeatureVector {
    let home = window(home_history);
    let away = window(away_history);

    let home_pos = position_of(standings, target.home_team_id);
    let away_pos = position_of(standings, target.away_team_id);

    let home_ht: Vec<&MatchRecord> = home.iter().copied().filter(|m| m.ht_score().is_some()).collect();
    let away_ht: Vec<&MatchRecord> = away.iter().copied().filter(|m| m.ht_score().is_some()).collect();

    FeatureVector {
        home_form_avg: rate(&home, |m| score(m).0 > score(m).1, DEFAULT_HOME_FORM),
        away_form_avg: rate(&away, |m| score(m).1 > score(m).0, DEFAULT_AWAY_FORM),
        position_gap: (away_pos - home_pos) as f64,
        home_scored_avg: average(&home, |m| score(m).0 as f64, DEFAULT_HOME_SCORED),
        home_conceded_avg: average(&home, |m| score(m).1 as f64, DEFAULT_HOME_CONCEDED),
        away_scored_avg: average(&away, |m| score(m).1 as f64, DEFAULT_AWAY_SCORED),
        away_conceded_avg: average(&away, |m| score(m).0 as f64, DEFAULT_AWAY_CONCEDED),
        ht_home_scored_avg: average(&home_ht, |m| ht(m).0 as f64, DEFAULT_HT_HOME_SCORED),
        ht_home_conceded_avg: average(&home_ht, |m| ht(m).1 as f64, DEFAULT_HT_HOME_CONCEDED),
        ht_away_scored_avg: average(&away_ht, |m| ht(m).1 as f64, DEFAULT_HT_AWAY_SCORED),
        ht_away_conceded_avg: average(&away_ht, |m| ht(m).0 as f64, DEFAULT_HT_AWAY_CONCEDED),
        over_15_home_rate: rate(&home, |m| total(m) > 1, DEFAULT_OVER_15_RATE),
        over_25_home_rate: rate(&home, |m| total(m) > 2, DEFAULT_OVER_25_RATE),
        over_35_home_rate: rate(&home, |m| total(m) > 3, DEFAULT_OVER_35_RATE),
        btts_home_rate: rate(&home, |m| score(m).0 > 0 && score(m).1 > 0, DEFAULT_BTTS_RATE),
        btts_away_rate: rate(&away, |m| score(m).0 > 0 && score(m).1 > 0, DEFAULT_BTTS_RATE),
        clean_sheet_home_rate: rate(&home, |m| score(m).1 == 0, DEFAULT_CLEAN_SHEET_HOME_RATE),
        clean_sheet_away_rate: rate(&away, |m| score(m).0 == 0, DEFAULT_CLEAN_SHEET_AWAY_RATE),
        odd_goals_rate: rate(&home, |m| total(m) % 2 == 1, DEFAULT_ODD_GOALS_RATE),
        late_goal_home_rate: rate(
            &home_ht,
            |m| m.second_half_goals().unwrap_or(0) >= 2,
            DEFAULT_LATE_GOAL_RATE,
        ),
    }
}

fn window(history: &[MatchRecord]) -> Vec<&MatchRecord> {
    history
        .iter()
        .filter(|m| m.final_score().is_some())
        .take(FORM_WINDOW)
        .collect()
}

fn position_of(standings: &[StandingRow], team_id: i64) -> i64 {
    standings
        .iter()
        .find(|s| s.team_id == team_id)
        .map(|s| s.position)
        .unwrap_or(DEFAULT_POSITION)
}

fn score(m: &MatchRecord) -> (i64, i64) {
    m.final_score().unwrap_or((0, 0))
}

fn ht(m: &MatchRecord) -> (i64, i64) {
    m.ht_score().unwrap_or((0, 0))
}

fn total(m: &MatchRecord) -> i64 {
    let (h, a) = score(m);
    h + a
}

fn rate(matches: &[&MatchRecord], pred: impl Fn(&MatchRecord) -> bool, default: f64) -> f64 {
    if matches.is_empty() {
        return default;
    }
    matches.iter().filter(|m| pred(m)).count() as f64 / matches.len() as f64
}

fn average(matches: &[&MatchRecord], value: impl Fn(&MatchRecord) -> f64, default: f64) -> f64 {
    if matches.is_empty() {
        return default;
    }
    matches.iter().map(|m| value(m)).sum::<f64>() / matches.len() as f64
}

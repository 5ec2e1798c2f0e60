use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a fixture as reported by the data-fetch layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchStatus {
    Scheduled,
    Timed,
    InPlay,
    Finished,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Scheduled => "SCHEDULED",
            MatchStatus::Timed => "TIMED",
            MatchStatus::InPlay => "IN_PLAY",
            MatchStatus::Finished => "FINISHED",
        }
    }

    /// Unknown provider statuses fall back to `Scheduled`.
    pub fn parse(s: &str) -> MatchStatus {
        match s {
            "TIMED" => MatchStatus::Timed,
            "IN_PLAY" => MatchStatus::InPlay,
            "FINISHED" => MatchStatus::Finished,
            _ => MatchStatus::Scheduled,
        }
    }

}

/// One league fixture, finished or upcoming.
///
/// Finished matches are immutable apart from the cached predicted
/// probabilities, which the pipeline writes back after a successful
/// analysis pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchRecord {
    pub id: i64,
    /// Fixture ID from the external data provider
    pub external_id: i64,
    pub utc_date: DateTime<Utc>,
    pub status: MatchStatus,
    pub matchday: Option<i64>,
    pub home_team_id: i64,
    pub away_team_id: i64,
    /// Full-time scores, NULL until the match finishes
    pub home_score: Option<i64>,
    pub away_score: Option<i64>,
    /// Half-time scores; some providers omit these
    pub home_ht_score: Option<i64>,
    pub away_ht_score: Option<i64>,
    pub predicted_home_prob: Option<f64>,
    pub predicted_draw_prob: Option<f64>,
    pub predicted_away_prob: Option<f64>,
}

impl MatchRecord {
    /// Final score as (home, away), if the match has one.
    pub fn final_score(&self) -> Option<(i64, i64)> {
        match (self.home_score, self.away_score) {
            (Some(h), Some(a)) => Some((h, a)),
            _ => None,
        }
    }

    /// Half-time score as (home, away), if recorded.
    pub fn ht_score(&self) -> Option<(i64, i64)> {
        match (self.home_ht_score, self.away_ht_score) {
            (Some(h), Some(a)) => Some((h, a)),
            _ => None,
        }
    }

    /// Goals scored after half time, when both scores are recorded.
    pub fn second_half_goals(&self) -> Option<i64> {
        match (self.final_score(), self.ht_score()) {
            (Some((h, a)), Some((hh, ha))) => Some((h + a) - (hh + ha)),
            _ => None,
        }
    }
}

/// One row of a league table snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandingRow {
    pub snapshot_date: NaiveDate,
    pub team_id: i64,
    pub position: i64,
    pub points: i64,
    pub goal_difference: i64,
}

/// One bookmaker odds snapshot for a match. All prices are decimal odds;
/// any field can be NULL when the bookmaker did not quote that market.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OddsSnapshot {
    pub id: i64,
    pub match_id: i64,
    pub bookmaker: String,
    pub recorded_at: DateTime<Utc>,
    pub home_odds: Option<f64>,
    pub draw_odds: Option<f64>,
    pub away_odds: Option<f64>,
    pub over_15_odds: Option<f64>,
    pub under_15_odds: Option<f64>,
    pub over_25_odds: Option<f64>,
    pub under_25_odds: Option<f64>,
    pub over_35_odds: Option<f64>,
    pub under_35_odds: Option<f64>,
}

/// A persisted betting recommendation for one (match, bet type) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalRecord {
    pub id: Option<i64>,
    pub match_id: i64,
    pub created_at: DateTime<Utc>,
    /// Market category key: "1x2", "totals", "btts", ...
    pub market_key: String,
    /// Bet type key: "HOME_WIN", "OVER_2.5", ...
    pub suggested_bet: String,
    pub predicted_prob: f64,
    pub implied_prob: f64,
    pub value_edge: f64,
    /// Quoted decimal odds, or the fair-value price for model-only markets
    pub bookmaker_odds: f64,
    pub has_bookmaker_odds: bool,
    pub confidence_score: f64,
    pub market_confidence: f64,
    pub consistency_pct: f64,
    pub recommended_stake: f64,
    /// 1-based rank within the match; NULL marks a legacy (pre-ranking) row
    pub rank_in_match: Option<i64>,
    /// Names of the patterns backing this signal
    pub patterns_detected: Vec<String>,
    pub explanation: String,
    pub is_published: bool,
    /// NULL until the settlement flow resolves the match
    pub result_won: Option<bool>,
}

/// Persisted win/loss aggregate for a named pattern heuristic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternStat {
    pub pattern_name: String,
    pub occurrences: i64,
    pub wins: i64,
    pub losses: i64,
    pub reliability_score: f64,
}

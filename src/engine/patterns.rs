//! Named heuristic patterns detected from trailing venue histories.
//!
//! Each pattern is a fixed-schema record: a kind, a strength weight, a
//! human-readable description and an optional set of bet types it
//! endorses. A pattern with no market restriction applies to every bet
//! type in the match. Patterns are ephemeral; only their win/loss
//! aggregates persist (see the reliability tracker).

use crate::db::models::MatchRecord;

use super::features::FeatureVector;
use super::markets::BetType;

/// History-based detection needs at least this many finished matches on
/// the relevant side; half-time patterns additionally need this many
/// matches with recorded HT scores.
const MIN_MATCHES: usize = 3;

/// Trailing matches examined per side.
const PATTERN_WINDOW: usize = 5;

/// Table-position gap that separates different classes of team.
const CLASS_GAP_THRESHOLD: f64 = 8.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatternKind {
    HomeColdStreak,
    HomeFortress,
    HighScoringHome,
    LowScoringHome,
    BttsHomeTrend,
    HomeCleanSheetMachine,
    HomeFastStarter,
    FirstHalfGoals,
    LateSurge,
    AwayWeakness,
    AwayLeakyDefense,
    AwayCleanSheetMachine,
    BttsAwayTrend,
    ClassGap,
    GiantKillerScenario,
}

impl PatternKind {
    pub fn name(&self) -> &'static str {
        match self {
            PatternKind::HomeColdStreak => "HOME_COLD_STREAK",
            PatternKind::HomeFortress => "HOME_FORTRESS",
            PatternKind::HighScoringHome => "HIGH_SCORING_HOME",
            PatternKind::LowScoringHome => "LOW_SCORING_HOME",
            PatternKind::BttsHomeTrend => "BTTS_HOME_TREND",
            PatternKind::HomeCleanSheetMachine => "HOME_CLEAN_SHEET_MACHINE",
            PatternKind::HomeFastStarter => "HOME_FAST_STARTER",
            PatternKind::FirstHalfGoals => "FIRST_HALF_GOALS",
            PatternKind::LateSurge => "LATE_SURGE",
            PatternKind::AwayWeakness => "AWAY_WEAKNESS",
            PatternKind::AwayLeakyDefense => "AWAY_LEAKY_DEFENSE",
            PatternKind::AwayCleanSheetMachine => "AWAY_CLEAN_SHEET_MACHINE",
            PatternKind::BttsAwayTrend => "BTTS_AWAY_TREND",
            PatternKind::ClassGap => "CLASS_GAP",
            PatternKind::GiantKillerScenario => "GIANT_KILLER_SCENARIO",
        }
    }
}

/// One detected heuristic.
#[derive(Debug, Clone)]
pub struct Pattern {
    pub kind: PatternKind,
    /// How strongly the heuristic has historically predicted its markets
    pub strength: f64,
    pub description: String,
    /// Bet types this pattern endorses; `None` endorses every bet type
    pub markets: Option<&'static [BetType]>,
}

impl Pattern {
    pub fn applies_to(&self, bet: BetType) -> bool {
        self.markets.map_or(true, |markets| markets.contains(&bet))
    }
}

// Market restriction sets. Absence of a set means the pattern speaks to
// the whole match rather than specific markets.
const HOME_WIN_MARKETS: &[BetType] = &[BetType::HomeWin];
const AWAY_WIN_MARKETS: &[BetType] = &[BetType::AwayWin, BetType::Draw];
const HIGH_SCORING_MARKETS: &[BetType] = &[BetType::Over25, BetType::BttsYes];
const LOW_SCORING_MARKETS: &[BetType] = &[BetType::Under25, BetType::BttsNo];
const BTTS_MARKETS: &[BetType] = &[BetType::BttsYes];
const HOME_SHUTOUT_MARKETS: &[BetType] = &[BetType::CleanSheetHome, BetType::BttsNo];
const AWAY_SHUTOUT_MARKETS: &[BetType] = &[BetType::CleanSheetAway, BetType::BttsNo];
const FAST_START_MARKETS: &[BetType] = &[BetType::HtHome, BetType::HtOver05];
const FIRST_HALF_MARKETS: &[BetType] = &[BetType::HtOver05];
const LATE_SURGE_MARKETS: &[BetType] = &[BetType::LateGoal, BetType::Over25];
const LEAKY_AWAY_MARKETS: &[BetType] = &[BetType::HomeWin, BetType::Over25];

/// Detect every pattern present for one match. `home_history` and
/// `away_history` are newest-first finished matches at the respective
/// venue; only the most recent [`PATTERN_WINDOW`] are examined.
pub fn detect_patterns(
    home_history: &[MatchRecord],
    away_history: &[MatchRecord],
    features: &FeatureVector,
) -> Vec<Pattern> {
    let mut patterns = Vec::new();

    let home: Vec<&MatchRecord> = trailing(home_history);
    let away: Vec<&MatchRecord> = trailing(away_history);

    if home.len() >= MIN_MATCHES {
        detect_home_patterns(&home, &mut patterns);
    }
    if away.len() >= MIN_MATCHES {
        detect_away_patterns(&away, &mut patterns);
    }
    detect_table_patterns(features, &mut patterns);

    // Strongest heuristics first; this is the order they appear in signal
    // explanations.
    patterns.sort_by(|a, b| b.strength.total_cmp(&a.strength));
    patterns
}

fn detect_home_patterns(home: &[&MatchRecord], out: &mut Vec<Pattern>) {
    let losses_last_3 = home
        .iter()
        .take(3)
        .filter(|m| goals(m).0 < goals(m).1)
        .count();
    if losses_last_3 >= 3 {
        out.push(Pattern {
            kind: PatternKind::HomeColdStreak,
            strength: 0.70,
            description: "Lost each of the last 3 home matches".into(),
            markets: Some(AWAY_WIN_MARKETS),
        });
    }

    let wins = count(home, |h, a| h > a);
    if wins >= 4 {
        out.push(Pattern {
            kind: PatternKind::HomeFortress,
            strength: 0.80,
            description: format!("Won {wins} of the last {} home matches", home.len()),
            markets: Some(HOME_WIN_MARKETS),
        });
    }

    let high_scoring = count(home, |h, a| h + a > 2);
    if high_scoring >= 4 {
        out.push(Pattern {
            kind: PatternKind::HighScoringHome,
            strength: 0.65,
            description: format!("3+ goals in {high_scoring} of the last {} home matches", home.len()),
            markets: Some(HIGH_SCORING_MARKETS),
        });
    }

    let low_scoring = count(home, |h, a| h + a <= 2);
    if low_scoring >= 4 {
        out.push(Pattern {
            kind: PatternKind::LowScoringHome,
            strength: 0.65,
            description: format!("2 or fewer goals in {low_scoring} of the last {} home matches", home.len()),
            markets: Some(LOW_SCORING_MARKETS),
        });
    }

    let btts = count(home, |h, a| h > 0 && a > 0);
    if btts >= 4 {
        out.push(Pattern {
            kind: PatternKind::BttsHomeTrend,
            strength: 0.70,
            description: format!("Both teams scored in {btts} of the last {} home matches", home.len()),
            markets: Some(BTTS_MARKETS),
        });
    }

    let shutouts = count(home, |_, a| a == 0);
    if shutouts >= 3 {
        out.push(Pattern {
            kind: PatternKind::HomeCleanSheetMachine,
            strength: 0.75,
            description: format!("{shutouts} home clean sheets in the last {}", home.len()),
            markets: Some(HOME_SHUTOUT_MARKETS),
        });
    }

    // Half-time patterns need enough matches with recorded HT scores.
    let with_ht: Vec<&&MatchRecord> = home.iter().filter(|m| m.ht_score().is_some()).collect();
    if with_ht.len() >= MIN_MATCHES {
        let leading_at_ht = with_ht
            .iter()
            .filter(|m| {
                let (h, a) = m.ht_score().unwrap_or((0, 0));
                h > a
            })
            .count();
        if leading_at_ht >= 3 {
            out.push(Pattern {
                kind: PatternKind::HomeFastStarter,
                strength: 0.70,
                description: format!("Led at half time in {leading_at_ht} recent home matches"),
                markets: Some(FAST_START_MARKETS),
            });
        }

        let first_half_goal = with_ht
            .iter()
            .filter(|m| {
                let (h, a) = m.ht_score().unwrap_or((0, 0));
                h + a > 0
            })
            .count();
        if first_half_goal >= 4 {
            out.push(Pattern {
                kind: PatternKind::FirstHalfGoals,
                strength: 0.65,
                description: format!("A first-half goal in {first_half_goal} recent home matches"),
                markets: Some(FIRST_HALF_MARKETS),
            });
        }

        let late_surges = with_ht
            .iter()
            .filter(|m| m.second_half_goals().unwrap_or(0) >= 2)
            .count();
        if late_surges >= 3 {
            out.push(Pattern {
                kind: PatternKind::LateSurge,
                strength: 0.60,
                description: format!("2+ second-half goals in {late_surges} recent home matches"),
                markets: Some(LATE_SURGE_MARKETS),
            });
        }
    }
}

fn detect_away_patterns(away: &[&MatchRecord], out: &mut Vec<Pattern>) {
    let losses = count(away, |h, a| a < h);
    if losses >= 4 {
        out.push(Pattern {
            kind: PatternKind::AwayWeakness,
            strength: 0.70,
            description: format!("Lost {losses} of the last {} away matches", away.len()),
            markets: Some(HOME_WIN_MARKETS),
        });
    }

    let conceded = count(away, |h, _| h > 0);
    if conceded >= 4 {
        out.push(Pattern {
            kind: PatternKind::AwayLeakyDefense,
            strength: 0.60,
            description: format!("Conceded in {conceded} of the last {} away matches", away.len()),
            markets: Some(LEAKY_AWAY_MARKETS),
        });
    }

    let shutouts = count(away, |h, _| h == 0);
    if shutouts >= 3 {
        out.push(Pattern {
            kind: PatternKind::AwayCleanSheetMachine,
            strength: 0.70,
            description: format!("{shutouts} away clean sheets in the last {}", away.len()),
            markets: Some(AWAY_SHUTOUT_MARKETS),
        });
    }

    let btts = count(away, |h, a| h > 0 && a > 0);
    if btts >= 4 {
        out.push(Pattern {
            kind: PatternKind::BttsAwayTrend,
            strength: 0.65,
            description: format!("Both teams scored in {btts} of the last {} away matches", away.len()),
            markets: Some(BTTS_MARKETS),
        });
    }
}

fn detect_table_patterns(features: &FeatureVector, out: &mut Vec<Pattern>) {
    if features.position_gap >= CLASS_GAP_THRESHOLD {
        out.push(Pattern {
            kind: PatternKind::ClassGap,
            strength: 0.75,
            description: format!(
                "Home side ranked {} places above the opposition",
                features.position_gap as i64
            ),
            markets: Some(HOME_WIN_MARKETS),
        });
    }
    if features.position_gap <= -CLASS_GAP_THRESHOLD {
        out.push(Pattern {
            kind: PatternKind::GiantKillerScenario,
            strength: 0.50,
            description: format!(
                "Home side ranked {} places below the opposition",
                (-features.position_gap) as i64
            ),
            markets: None,
        });
    }
}

fn trailing(history: &[MatchRecord]) -> Vec<&MatchRecord> {
    history
        .iter()
        .filter(|m| m.final_score().is_some())
        .take(PATTERN_WINDOW)
        .collect()
}

fn goals(m: &MatchRecord) -> (i64, i64) {
    m.final_score().unwrap_or((0, 0))
}

fn count(matches: &[&MatchRecord], pred: impl Fn(i64, i64) -> bool) -> usize {
    matches
        .iter()
        .filter(|m| {
            let (h, a) = goals(m);
            pred(h, a)
        })
        .count()
}

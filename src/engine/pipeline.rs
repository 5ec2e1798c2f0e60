//! Per-match orchestration: features → probabilities → patterns →
//! candidates → confidence/stake → decisions → persisted signals.
//!
//! One batch run walks every upcoming match, diversifies and ranks the
//! surviving candidates, and commits everything at the end as a single
//! transaction. The bankroll is snapshotted once at the start of the run
//! so every match sizes against the same balance. Individual match
//! faults are caught, logged and reported; they never take the run down.

use std::collections::{HashMap, HashSet};

use anyhow::Result;
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::config::RiskProfile;
use crate::db::models::{MatchRecord, PatternStat, SignalRecord};
use crate::db::Database;

use super::features::build_features;
use super::market_confidence;
use super::markets::{BetType, MarketCategory};
use super::patterns::{detect_patterns, Pattern};
use super::probability::calculate_probabilities;
use super::reliability;
use super::signal::{DecisionTag, SignalEngine};
use super::stake::StakeEngine;
use super::value::{MarketCandidate, ValueDetector};

/// Finished matches fetched per side; the feature builder and pattern
/// engine narrow further to their own windows.
const HISTORY_FETCH_LIMIT: i64 = 10;

/// Settled results considered for streak-based stake adjustment.
const STREAK_LOOKBACK: i64 = 10;

/// Flat confidence boost per pattern relevant to the pick.
const PATTERN_BOOST: f64 = 0.05;

/// What happened to one match during a batch run.
#[derive(Debug, Clone)]
pub enum MatchOutcome {
    /// Signals were generated and queued for the run commit
    Signals { match_id: i64, count: usize },
    /// No candidate cleared the edge bar or survived the decision gate
    NoValue { match_id: i64 },
    /// A fully-ranked signal set already exists; nothing to do
    AlreadyAnalyzed { match_id: i64 },
    /// Unexpected per-match fault; logged and skipped
    Failed { match_id: i64, reason: String },
}

/// Aggregate result of one batch run.
#[derive(Debug)]
pub struct BatchReport {
    pub outcomes: Vec<MatchOutcome>,
    /// Newly created signals, in commit order, with assigned row IDs
    pub signals: Vec<SignalRecord>,
}

impl BatchReport {
    pub fn matches_processed(&self) -> usize {
        self.outcomes.len()
    }

    pub fn matches_failed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, MatchOutcome::Failed { .. }))
            .count()
    }

    pub fn matches_skipped(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, MatchOutcome::AlreadyAnalyzed { .. }))
            .count()
    }
}

/// Outcome of analyzing a single match, before the run commit.
enum MatchAnalysis {
    AlreadyAnalyzed,
    NoValue {
        purge_existing: bool,
    },
    Signals {
        purge_existing: bool,
        signals: Vec<SignalRecord>,
        match_probs: (f64, f64, f64),
    },
}

pub struct SignalPipeline {
    db: Database,
    profile: RiskProfile,
}

impl SignalPipeline {
    pub fn new(db: Database, profile: RiskProfile) -> Self {
        SignalPipeline { db, profile }
    }

    /// Run one batch over every upcoming match. All signal writes and
    /// cached probabilities commit atomically at the end; a failure
    /// before that point leaves the store untouched.
    pub fn run(&self) -> Result<BatchReport> {
        // Single run-scoped bankroll snapshot, never re-read mid-run.
        let bankroll = self.db.current_balance()?.unwrap_or(0.0);
        if bankroll <= 0.0 {
            warn!("Bankroll is {:.2}; every stake will be zero", bankroll);
        }
        let streak = self.db.recent_signal_results(STREAK_LOOKBACK)?;
        let upcoming = self.db.upcoming_matches(Utc::now())?;
        info!(
            "Batch run over {} upcoming matches (bankroll {:.2}, profile min_edge {:.3})",
            upcoming.len(),
            bankroll,
            self.profile.min_edge
        );

        let mut outcomes = Vec::new();
        let mut purge_ids = Vec::new();
        let mut pending: Vec<SignalRecord> = Vec::new();
        let mut prob_cache = Vec::new();

        for m in &upcoming {
            match self.analyze_match(m, bankroll, &streak) {
                Ok(MatchAnalysis::AlreadyAnalyzed) => {
                    debug!("Match {} already has a ranked signal set", m.id);
                    outcomes.push(MatchOutcome::AlreadyAnalyzed { match_id: m.id });
                }
                Ok(MatchAnalysis::NoValue { purge_existing }) => {
                    if purge_existing {
                        purge_ids.push(m.id);
                    }
                    outcomes.push(MatchOutcome::NoValue { match_id: m.id });
                }
                Ok(MatchAnalysis::Signals {
                    purge_existing,
                    signals,
                    match_probs,
                }) => {
                    if purge_existing {
                        purge_ids.push(m.id);
                    }
                    let (home, draw, away) = match_probs;
                    prob_cache.push((m.id, home, draw, away));
                    outcomes.push(MatchOutcome::Signals {
                        match_id: m.id,
                        count: signals.len(),
                    });
                    pending.extend(signals);
                }
                Err(e) => {
                    warn!("Match {} analysis failed, skipping: {:#}", m.id, e);
                    outcomes.push(MatchOutcome::Failed {
                        match_id: m.id,
                        reason: format!("{e:#}"),
                    });
                }
            }
        }

        self.db.commit_run(&purge_ids, &mut pending, &prob_cache)?;

        let report = BatchReport {
            outcomes,
            signals: pending,
        };
        info!(
            "Batch complete: {} signals across {} matches ({} skipped, {} failed)",
            report.signals.len(),
            report.matches_processed(),
            report.matches_skipped(),
            report.matches_failed()
        );
        Ok(report)
    }

    fn analyze_match(
        &self,
        m: &MatchRecord,
        bankroll: f64,
        streak: &[bool],
    ) -> Result<MatchAnalysis> {
        // Idempotency: a fully-ranked set means this match is done; a
        // legacy (unranked) set is purged and regenerated.
        let existing = self.db.signals_for_match(m.id)?;
        let purge_existing = if existing.is_empty() {
            false
        } else if existing.iter().all(|s| s.rank_in_match.is_some()) {
            if let (Some(h), Some(d), Some(a)) = (
                m.predicted_home_prob,
                m.predicted_draw_prob,
                m.predicted_away_prob,
            ) {
                debug!(
                    "Match {}: cached 1X2 probabilities {:.2}/{:.2}/{:.2}",
                    m.id, h, d, a
                );
            }
            return Ok(MatchAnalysis::AlreadyAnalyzed);
        } else {
            true
        };

        let home_history = self.db.home_history(m.home_team_id, HISTORY_FETCH_LIMIT)?;
        let away_history = self.db.away_history(m.away_team_id, HISTORY_FETCH_LIMIT)?;
        let standings = self.db.latest_standings()?;

        let features = build_features(m, &home_history, &away_history, &standings);
        debug!(
            "Match {}: form {:.2}/{:.2}, gap {:+.0}, goals {:.2}-{:.2}/{:.2}-{:.2}, \
             ht goals {:.2}-{:.2}/{:.2}-{:.2}, btts {:.2}/{:.2}",
            m.id,
            features.home_form_avg,
            features.away_form_avg,
            features.position_gap,
            features.home_scored_avg,
            features.home_conceded_avg,
            features.away_scored_avg,
            features.away_conceded_avg,
            features.ht_home_scored_avg,
            features.ht_home_conceded_avg,
            features.ht_away_scored_avg,
            features.ht_away_conceded_avg,
            features.btts_home_rate,
            features.btts_away_rate,
        );
        let probs = calculate_probabilities(&features);
        let patterns = detect_patterns(&home_history, &away_history, &features);
        for p in &patterns {
            debug!("Match {}: pattern {} ({})", m.id, p.kind.name(), p.description);
        }

        let latest_odds = self.db.latest_odds(m.id)?;
        if let Some(snap) = &latest_odds {
            debug!(
                "Match {}: odds snapshot #{} from '{}' at {}",
                m.id, snap.id, snap.bookmaker, snap.recorded_at
            );
        }
        let detector = ValueDetector::new(self.profile.min_edge);
        let candidates = detector.evaluate_all_markets(&probs, latest_odds.as_ref(), &features);
        if candidates.is_empty() {
            debug!("Match {}: no market clears the edge bar", m.id);
            return Ok(MatchAnalysis::NoValue { purge_existing });
        }

        // Reliability stats for every detected pattern, fetched once.
        let mut stats_by_name: HashMap<&'static str, PatternStat> = HashMap::new();
        for p in &patterns {
            if let Some(stat) = self.db.pattern_stat(p.kind.name())? {
                debug!(
                    "Pattern {}: reliability {:.2} over {} occurrence(s) ({} lost)",
                    stat.pattern_name, stat.reliability_score, stat.occurrences, stat.losses
                );
                stats_by_name.insert(p.kind.name(), stat);
            }
        }
        let odds_history = self.db.odds_history(m.id)?;

        let selected = diversify(&candidates, self.profile.max_signals_per_match);

        let stake_engine = StakeEngine::new(self.profile.kelly_fraction, self.profile.max_stake_pct);
        let signal_engine = SignalEngine::new(self.profile.min_edge, self.profile.min_confidence);

        let mut signals = Vec::new();
        for candidate in &selected {
            let relevant: Vec<Pattern> = patterns
                .iter()
                .filter(|p| p.applies_to(candidate.bet_type))
                .cloned()
                .collect();
            let stats: Vec<PatternStat> = relevant
                .iter()
                .filter_map(|p| stats_by_name.get(p.kind.name()).cloned())
                .collect();

            let base_confidence = (candidate.predicted_prob + candidate.consistency) / 2.0;
            let adjusted = reliability::adjust_confidence(base_confidence, &stats);
            let confidence = (adjusted + PATTERN_BOOST * relevant.len() as f64).min(1.0);

            let market_confidence = market_confidence::get_score(candidate.bet_type, &odds_history);
            let stake = stake_engine.calculate_kelly_stake(
                bankroll,
                candidate.staking_odds(),
                candidate.predicted_prob,
            );
            let stake = stake_engine.adjust_for_streak(stake, streak);

            let decision = signal_engine.generate_final_decision(
                &probs,
                candidate.edge,
                confidence,
                stake,
                candidate.bet_type,
                &relevant,
                market_confidence,
            );
            if decision.decision != DecisionTag::Bet {
                debug!(
                    "Match {}: {} {} ({})",
                    m.id,
                    candidate.bet_type.as_str(),
                    decision.decision.as_str(),
                    decision.explanation
                );
                continue;
            }

            debug!(
                "Match {}: {} BET stake {:.2}, expecting {}",
                m.id,
                decision.bet_type.as_str(),
                decision.stake,
                decision.expected_outcome
            );

            signals.push(SignalRecord {
                id: None,
                match_id: m.id,
                created_at: Utc::now(),
                market_key: candidate.category.as_str().to_string(),
                suggested_bet: candidate.bet_type.as_str().to_string(),
                predicted_prob: candidate.predicted_prob,
                implied_prob: candidate.implied_prob,
                value_edge: decision.edge,
                bookmaker_odds: candidate.odds,
                has_bookmaker_odds: candidate.has_bookmaker_odds,
                confidence_score: decision.confidence,
                market_confidence: decision.market_confidence,
                consistency_pct: candidate.consistency,
                recommended_stake: decision.stake,
                rank_in_match: None,
                patterns_detected: relevant.iter().map(|p| p.kind.name().to_string()).collect(),
                explanation: decision.explanation,
                is_published: false,
                result_won: None,
            });
        }

        if signals.is_empty() {
            debug!("Match {}: no candidate survived the decision gate", m.id);
            return Ok(MatchAnalysis::NoValue { purge_existing });
        }

        // Rank reflects diversification order, not raw edge order.
        for (i, signal) in signals.iter_mut().enumerate() {
            signal.rank_in_match = Some(i as i64 + 1);
        }

        info!(
            "Match {}: {} signal(s), top pick {}",
            m.id,
            signals.len(),
            signals[0].suggested_bet
        );

        Ok(MatchAnalysis::Signals {
            purge_existing,
            signals,
            match_probs: (probs.home, probs.draw, probs.away),
        })
    }
}

/// Diversification pass: one candidate per market category in
/// descending-edge order, then backfill remaining slots from the
/// unselected remainder, still in edge order. Selection order becomes
/// the final rank.
fn diversify(candidates: &[MarketCandidate], cap: usize) -> Vec<MarketCandidate> {
    let mut selected: Vec<MarketCandidate> = Vec::new();
    let mut used_categories: HashSet<MarketCategory> = HashSet::new();

    for c in candidates {
        if selected.len() >= cap {
            break;
        }
        if used_categories.insert(c.category) {
            selected.push(c.clone());
        }
    }

    if selected.len() < cap {
        let mut taken: HashSet<BetType> = selected.iter().map(|c| c.bet_type).collect();
        for c in candidates {
            if selected.len() >= cap {
                break;
            }
            if taken.insert(c.bet_type) {
                selected.push(c.clone());
            }
        }
    }

    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{MatchStatus, OddsSnapshot, StandingRow};
    use chrono::{Duration, NaiveDate, TimeZone, Utc};

    fn candidate(bet_type: BetType, edge: f64) -> MarketCandidate {
        MarketCandidate {
            bet_type,
            category: bet_type.category(),
            predicted_prob: 0.5,
            implied_prob: 0.5 - edge,
            odds: 2.0,
            edge,
            consistency: 0.5,
            has_bookmaker_odds: true,
        }
    }

    #[test]
    fn diversification_takes_one_per_category_before_backfilling() {
        // Descending edge: two 1x2 candidates lead, but only one may be
        // taken in the first pass.
        let candidates = vec![
            candidate(BetType::HomeWin, 0.15),
            candidate(BetType::Draw, 0.12),
            candidate(BetType::Over25, 0.10),
            candidate(BetType::BttsYes, 0.08),
            candidate(BetType::CleanSheetHome, 0.06),
        ];
        let selected = diversify(&candidates, 4);
        let types: Vec<BetType> = selected.iter().map(|c| c.bet_type).collect();
        assert_eq!(
            types,
            vec![
                BetType::HomeWin,
                BetType::Over25,
                BetType::BttsYes,
                BetType::CleanSheetHome
            ]
        );
    }

    #[test]
    fn diversification_backfills_when_categories_run_out() {
        let candidates = vec![
            candidate(BetType::HomeWin, 0.15),
            candidate(BetType::Draw, 0.12),
            candidate(BetType::AwayWin, 0.10),
            candidate(BetType::Over25, 0.08),
        ];
        let selected = diversify(&candidates, 4);
        let types: Vec<BetType> = selected.iter().map(|c| c.bet_type).collect();
        // First pass: HomeWin, Over25. Backfill: Draw, AwayWin.
        assert_eq!(
            types,
            vec![
                BetType::HomeWin,
                BetType::Over25,
                BetType::Draw,
                BetType::AwayWin
            ]
        );
    }

    #[test]
    fn diversification_respects_the_cap() {
        let candidates = vec![
            candidate(BetType::HomeWin, 0.15),
            candidate(BetType::Over25, 0.12),
            candidate(BetType::BttsYes, 0.10),
            candidate(BetType::CleanSheetHome, 0.08),
            candidate(BetType::OddGoals, 0.06),
        ];
        assert_eq!(diversify(&candidates, 3).len(), 3);
    }

    // ── Store-backed pipeline tests ──────────────────────────────────────────

    fn test_db() -> Database {
        Database::open(":memory:").expect("in-memory db")
    }

    fn seed_teams(db: &Database) -> (i64, i64) {
        let home = db.insert_team(101, "Home United", Some("HMU")).unwrap();
        let away = db.insert_team(102, "Away City", Some("AWC")).unwrap();
        (home, away)
    }

    fn upcoming_match(db: &Database, home_team_id: i64, away_team_id: i64) -> i64 {
        db.insert_match(&MatchRecord {
            id: 0,
            external_id: 5001,
            utc_date: Utc::now() + Duration::days(1),
            status: MatchStatus::Scheduled,
            matchday: Some(30),
            home_team_id,
            away_team_id,
            home_score: None,
            away_score: None,
            home_ht_score: None,
            away_ht_score: None,
            predicted_home_prob: None,
            predicted_draw_prob: None,
            predicted_away_prob: None,
        })
        .unwrap()
    }

    fn seed_odds(db: &Database, match_id: i64) {
        // Over-1.5 at 2.00 gives the model (~58% with neutral priors) a
        // clear edge and enough base confidence to survive the gate.
        db.insert_odds(&OddsSnapshot {
            id: 0,
            match_id,
            bookmaker: "average".into(),
            recorded_at: Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap(),
            home_odds: Some(3.5),
            draw_odds: Some(3.3),
            away_odds: Some(2.4),
            over_15_odds: Some(2.0),
            under_15_odds: Some(1.8),
            over_25_odds: None,
            under_25_odds: None,
            over_35_odds: None,
            under_35_odds: None,
        })
        .unwrap();
    }

    fn seed_standings(db: &Database, home_team_id: i64, away_team_id: i64) {
        let date = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        for (team_id, position) in [(home_team_id, 5), (away_team_id, 9)] {
            db.insert_standing(&StandingRow {
                snapshot_date: date,
                team_id,
                position,
                points: 50 - position,
                goal_difference: 15 - position,
            })
            .unwrap();
        }
    }

    fn pipeline(db: &Database) -> SignalPipeline {
        SignalPipeline::new(db.clone(), RiskProfile::default())
    }

    #[test]
    fn run_generates_ranked_signals_and_caches_probabilities() {
        let db = test_db();
        let (home, away) = seed_teams(&db);
        let match_id = upcoming_match(&db, home, away);
        seed_odds(&db, match_id);
        seed_standings(&db, home, away);
        db.record_balance(1000.0, 0.0).unwrap();

        let report = pipeline(&db).run().unwrap();
        assert!(!report.signals.is_empty(), "expected at least one signal");

        let stored = db.signals_for_match(match_id).unwrap();
        assert_eq!(stored.len(), report.signals.len());
        for (i, signal) in stored.iter().enumerate() {
            assert_eq!(signal.rank_in_match, Some(i as i64 + 1));
            assert!(signal.id.is_some());
            assert!(signal.recommended_stake > 0.0);
        }

        // Cached 1X2 probabilities written by the run commit.
        let m = &db.upcoming_matches(Utc::now()).unwrap()[0];
        assert!(m.predicted_home_prob.is_some());
        assert!(m.predicted_draw_prob.is_some());
        assert!(m.predicted_away_prob.is_some());
    }

    #[test]
    fn rerun_is_idempotent_for_ranked_sets() {
        let db = test_db();
        let (home, away) = seed_teams(&db);
        let match_id = upcoming_match(&db, home, away);
        seed_odds(&db, match_id);
        db.record_balance(1000.0, 0.0).unwrap();

        let first = pipeline(&db).run().unwrap();
        assert!(!first.signals.is_empty());
        let count_after_first = db.signals_for_match(match_id).unwrap().len();

        let second = pipeline(&db).run().unwrap();
        assert!(second.signals.is_empty(), "rerun must not add signals");
        assert_eq!(second.matches_skipped(), 1);
        assert_eq!(db.signals_for_match(match_id).unwrap().len(), count_after_first);
    }

    #[test]
    fn legacy_unranked_signals_are_purged_and_regenerated() {
        let db = test_db();
        let (home, away) = seed_teams(&db);
        let match_id = upcoming_match(&db, home, away);
        seed_odds(&db, match_id);
        db.record_balance(1000.0, 0.0).unwrap();

        // A pre-ranking row: no rank_in_match.
        let mut legacy = vec![SignalRecord {
            id: None,
            match_id,
            created_at: Utc::now() - Duration::days(2),
            market_key: "1x2".into(),
            suggested_bet: "AWAY_WIN".into(),
            predicted_prob: 0.4,
            implied_prob: 0.35,
            value_edge: 0.05,
            bookmaker_odds: 2.85,
            has_bookmaker_odds: true,
            confidence_score: 0.6,
            market_confidence: 0.5,
            consistency_pct: 0.5,
            recommended_stake: 10.0,
            rank_in_match: None,
            patterns_detected: vec![],
            explanation: "Moderate value edge".into(),
            is_published: false,
            result_won: None,
        }];
        db.commit_run(&[], &mut legacy, &[]).unwrap();

        let report = pipeline(&db).run().unwrap();
        assert!(!report.signals.is_empty());

        let stored = db.signals_for_match(match_id).unwrap();
        assert!(stored.iter().all(|s| s.rank_in_match.is_some()));
        assert!(
            !stored.iter().any(|s| s.suggested_bet == "AWAY_WIN"),
            "legacy signal should have been purged"
        );
    }

    #[test]
    fn empty_bankroll_yields_no_signals() {
        let db = test_db();
        let (home, away) = seed_teams(&db);
        let match_id = upcoming_match(&db, home, away);
        seed_odds(&db, match_id);
        // No balance recorded: every Kelly stake is 0 → PASS across the board.

        let report = pipeline(&db).run().unwrap();
        assert!(report.signals.is_empty());
        assert!(matches!(
            report.outcomes.as_slice(),
            [MatchOutcome::NoValue { .. }]
        ));
        assert!(db.signals_for_match(match_id).unwrap().is_empty());
    }

    #[test]
    fn match_without_odds_can_still_signal_model_only_markets() {
        let db = test_db();
        let (home, away) = seed_teams(&db);
        let match_id = upcoming_match(&db, home, away);
        db.record_balance(1000.0, 0.0).unwrap();

        // Strong home scoring history: 5 high-scoring home wins.
        for i in 0..5 {
            db.insert_match(&MatchRecord {
                id: 0,
                external_id: 6000 + i,
                utc_date: Utc::now() - Duration::days(7 * (i + 1)),
                status: MatchStatus::Finished,
                matchday: Some(20),
                home_team_id: home,
                away_team_id: away,
                home_score: Some(3),
                away_score: Some(1),
                home_ht_score: Some(1),
                away_ht_score: Some(1),
                predicted_home_prob: None,
                predicted_draw_prob: None,
                predicted_away_prob: None,
            })
            .unwrap();
        }

        let report = pipeline(&db).run().unwrap();
        assert!(
            !report.signals.is_empty(),
            "high-scoring history should surface model-only value"
        );
        // With no quoted odds every signal must be model-only.
        for signal in &report.signals {
            assert!(!signal.has_bookmaker_odds);
            assert!(signal.recommended_stake > 0.0);
        }
        assert!(!db.signals_for_match(match_id).unwrap().is_empty());
    }
}

//! Settles signals once their matches finish: resolves each bet against
//! the final (and half-time) score, applies PnL to the bankroll and
//! feeds the win/loss back into the pattern reliability aggregates.
//!
//! Runs after the analysis pass in the daily cycle. Signals on half-time
//! markets stay unsettled when the provider never recorded HT scores.

use anyhow::Result;
use tracing::{info, warn};

use crate::db::models::MatchRecord;
use crate::db::Database;

use super::markets::BetType;

#[derive(Debug, Default)]
pub struct SettlementSummary {
    pub settled: usize,
    pub wins: usize,
    pub losses: usize,
    pub total_pnl: f64,
    /// Signals left unsettled (unparseable bet or missing HT data)
    pub skipped: usize,
}

/// Settle every unsettled signal whose match has finished.
pub fn settle_finished_matches(db: &Database) -> Result<SettlementSummary> {
    let pending = db.unsettled_signals()?;
    let mut summary = SettlementSummary::default();

    for (signal, m) in pending {
        let Some(id) = signal.id else { continue };
        let Some(bet) = BetType::parse(&signal.suggested_bet) else {
            warn!("Signal {}: unknown bet type '{}'", id, signal.suggested_bet);
            summary.skipped += 1;
            continue;
        };
        let Some(won) = resolve_bet(&m, bet) else {
            summary.skipped += 1;
            continue;
        };

        db.set_signal_result(id, won)?;

        let pnl = if won {
            signal.recommended_stake * (signal.bookmaker_odds - 1.0)
        } else {
            -signal.recommended_stake
        };
        let balance = db.current_balance()?.unwrap_or(0.0);
        db.record_balance(round2(balance + pnl), round2(pnl))?;

        for pattern_name in &signal.patterns_detected {
            db.record_pattern_result(pattern_name, won)?;
        }

        summary.settled += 1;
        if won {
            summary.wins += 1;
        } else {
            summary.losses += 1;
        }
        summary.total_pnl += pnl;
    }

    if summary.settled > 0 {
        info!(
            "Settled {} signal(s): {} won, {} lost, pnl {:+.2}",
            summary.settled, summary.wins, summary.losses, summary.total_pnl
        );
    }
    Ok(summary)
}

/// Whether the bet won, judged from the final score. Half-time and
/// late-goal markets need a recorded HT score; `None` leaves the signal
/// unsettled.
fn resolve_bet(m: &MatchRecord, bet: BetType) -> Option<bool> {
    let (h, a) = m.final_score()?;
    let total = h + a;
    let won = match bet {
        BetType::HomeWin => h > a,
        BetType::Draw => h == a,
        BetType::AwayWin => h < a,
        BetType::Over15 => total >= 2,
        BetType::Under15 => total <= 1,
        BetType::Over25 => total >= 3,
        BetType::Under25 => total <= 2,
        BetType::Over35 => total >= 4,
        BetType::Under35 => total <= 3,
        BetType::BttsYes => h > 0 && a > 0,
        BetType::BttsNo => h == 0 || a == 0,
        BetType::CleanSheetHome => a == 0,
        BetType::CleanSheetAway => h == 0,
        BetType::OddGoals => total % 2 == 1,
        BetType::EvenGoals => total % 2 == 0,
        BetType::HtHome => {
            let (hh, ha) = m.ht_score()?;
            hh > ha
        }
        BetType::HtDraw => {
            let (hh, ha) = m.ht_score()?;
            hh == ha
        }
        BetType::HtAway => {
            let (hh, ha) = m.ht_score()?;
            hh < ha
        }
        BetType::HtOver05 => {
            let (hh, ha) = m.ht_score()?;
            hh + ha >= 1
        }
        BetType::LateGoal => m.second_half_goals()? >= 2,
    };
    Some(won)
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

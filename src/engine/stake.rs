//! Fractional-Kelly stake sizing.
//!
//! Standard Kelly:
//!   f* = (b·p − q) / b
//! where b = decimal odds − 1, p = win probability, q = 1 − p. A
//! fractional multiplier tames variance, and a hard cap keeps any single
//! bet to a small share of the bankroll regardless of how confident the
//! model is. A losing streak halves the stake; a winning streak lets it
//! run slightly.

pub struct StakeEngine {
    kelly_fraction: f64,
    max_stake_pct: f64,
}

impl StakeEngine {
    pub fn new(kelly_fraction: f64, max_stake_pct: f64) -> Self {
        StakeEngine {
            kelly_fraction,
            max_stake_pct,
        }
    }

    /// Size a bet from bankroll, decimal odds and win probability.
    /// Returns 0 when there is no edge (`prob <= 1/odds`) or the odds are
    /// degenerate. Rounded to 2 decimals.
    pub fn calculate_kelly_stake(&self, bankroll: f64, odds: f64, prob: f64) -> f64 {
        if prob <= 0.0 || odds <= 1.0 {
            return 0.0;
        }
        if prob <= 1.0 / odds {
            return 0.0;
        }

        let b = odds - 1.0;
        let kelly = (b * prob - (1.0 - prob)) / b;
        let stake = bankroll * kelly * self.kelly_fraction;

        let capped = stake.min(bankroll * self.max_stake_pct);
        round2(capped.max(0.0))
    }

    /// Streak adjustment from recent settled results, oldest first.
    /// Fewer than 3 results leaves the stake unchanged; 3 straight losses
    /// halve it, 3 straight wins scale it by 1.2.
    pub fn adjust_for_streak(&self, stake: f64, recent_results: &[bool]) -> f64 {
        if recent_results.len() < 3 {
            return stake;
        }
        let last_3 = &recent_results[recent_results.len() - 3..];
        if last_3.iter().all(|won| !won) {
            round2(stake * 0.5)
        } else if last_3.iter().all(|won| *won) {
            round2(stake * 1.2)
        } else {
            stake
        }
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

//! Final decision gate: turns an evaluated candidate into a BET or PASS
//! with a human-readable explanation.

use super::markets::BetType;
use super::patterns::Pattern;
use super::probability::ProbabilityReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionTag {
    Bet,
    Pass,
}

impl DecisionTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionTag::Bet => "BET",
            DecisionTag::Pass => "PASS",
        }
    }
}

/// The fully-formed decision for one candidate.
#[derive(Debug, Clone)]
pub struct Decision {
    pub decision: DecisionTag,
    pub bet_type: BetType,
    pub edge: f64,
    pub confidence: f64,
    pub market_confidence: f64,
    pub stake: f64,
    /// Key of the single most likely outcome in the probability report
    pub expected_outcome: &'static str,
    pub explanation: String,
}

pub struct SignalEngine {
    min_edge: f64,
    min_confidence: f64,
}

impl SignalEngine {
    pub fn new(min_edge: f64, min_confidence: f64) -> Self {
        SignalEngine {
            min_edge,
            min_confidence,
        }
    }

    /// A candidate is viable only when edge, confidence and stake all
    /// clear their bars; any shortfall is a PASS.
    pub fn generate_final_decision(
        &self,
        probs: &ProbabilityReport,
        edge: f64,
        confidence: f64,
        stake: f64,
        bet_type: BetType,
        patterns: &[Pattern],
        market_confidence: f64,
    ) -> Decision {
        let viable = edge >= self.min_edge && confidence >= self.min_confidence && stake > 0.0;

        let mut parts: Vec<String> = Vec::new();
        if edge >= 0.10 {
            parts.push("Strong value edge detected".into());
        } else if edge >= 0.05 {
            parts.push("Moderate value edge".into());
        }
        if confidence >= 0.75 {
            parts.push("High confidence signal".into());
        } else if confidence >= 0.60 {
            parts.push("Decent confidence".into());
        }
        if market_confidence >= 0.7 {
            parts.push("Market agrees with prediction".into());
        }
        if !patterns.is_empty() {
            let names: Vec<&str> = patterns.iter().map(|p| p.kind.name()).collect();
            parts.push(format!("Patterns: {}", names.join(", ")));
        }
        let explanation = if parts.is_empty() {
            "Standard analysis".to_string()
        } else {
            parts.join(". ")
        };

        Decision {
            decision: if viable { DecisionTag::Bet } else { DecisionTag::Pass },
            bet_type,
            edge: round4(edge),
            confidence: round4(confidence),
            market_confidence: round4(market_confidence),
            stake,
            expected_outcome: probs.dominant_outcome(),
            explanation,
        }
    }
}

fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}

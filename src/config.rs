use clap::{Parser, ValueEnum};

/// Football betting signal bot
#[derive(Parser, Debug, Clone)]
#[command(name = "matchday-signals", version, about)]
pub struct Config {
    /// SQLite database path
    #[arg(long, env = "DATABASE_PATH", default_value = "matchday.db")]
    pub database_path: String,

    /// Bankroll seeded on first start (league currency units)
    #[arg(long, env = "INITIAL_BANKROLL", default_value = "1000.0")]
    pub initial_bankroll: f64,

    /// Risk profile governing edge/confidence thresholds and stake sizing
    #[arg(long, env = "RISK_PROFILE", value_enum, default_value = "balanced")]
    pub risk_profile: RiskProfileName,

    /// Run one analysis cycle and exit instead of scheduling daily runs
    #[arg(long, default_value = "false")]
    pub run_once: bool,

    /// Seconds between scheduled analysis cycles
    #[arg(long, env = "RUN_INTERVAL_SECS", default_value = "86400")]
    pub run_interval_secs: u64,

    /// Maximum random start-up jitter before the first cycle, in seconds
    #[arg(long, env = "STARTUP_JITTER_SECS", default_value = "60")]
    pub startup_jitter_secs: u64,
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.initial_bankroll <= 0.0 {
            anyhow::bail!("initial_bankroll must be positive");
        }
        if self.run_interval_secs < 60 {
            anyhow::bail!("run_interval_secs must be at least 60");
        }
        Ok(())
    }

    /// Resolve the selected profile into its concrete parameters.
    pub fn profile(&self) -> RiskProfile {
        self.risk_profile.profile()
    }
}

/// Named risk profile selectable on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RiskProfileName {
    Conservative,
    Balanced,
    Aggressive,
}

impl RiskProfileName {
    pub fn profile(&self) -> RiskProfile {
        match self {
            RiskProfileName::Conservative => RiskProfile {
                min_edge: 0.08,
                min_confidence: 0.70,
                kelly_fraction: 0.05,
                max_stake_pct: 0.03,
                max_signals_per_match: 3,
            },
            RiskProfileName::Balanced => RiskProfile::default(),
            RiskProfileName::Aggressive => RiskProfile {
                min_edge: 0.03,
                min_confidence: 0.40,
                kelly_fraction: 0.15,
                max_stake_pct: 0.08,
                max_signals_per_match: 6,
            },
        }
    }
}

/// Concrete risk parameters threaded through the pipeline call. Never a
/// process-wide mutable value; each run receives the profile it was
/// invoked with.
#[derive(Debug, Clone, Copy)]
pub struct RiskProfile {
    /// Minimum edge for a candidate to be worth a signal
    pub min_edge: f64,
    /// Minimum adjusted confidence for a BET decision
    pub min_confidence: f64,
    /// Fractional Kelly multiplier
    pub kelly_fraction: f64,
    /// Hard cap on a single stake as a fraction of bankroll
    pub max_stake_pct: f64,
    /// Diversification cap per match
    pub max_signals_per_match: usize,
}

impl Default for RiskProfile {
    fn default() -> Self {
        RiskProfile {
            min_edge: 0.05,
            min_confidence: 0.50,
            kelly_fraction: 0.10,
            max_stake_pct: 0.05,
            max_signals_per_match: 4,
        }
    }
}

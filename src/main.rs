use anyhow::Result;
use clap::Parser;
use rand::Rng;
use std::time::Duration;
use tracing::{debug, error, info};

mod config;
mod db;
mod engine;

use config::Config;
use db::Database;
use engine::pipeline::MatchOutcome;
use engine::settlement::settle_finished_matches;
use engine::SignalPipeline;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise tracing / logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    config.validate()?;

    let db = Database::open(&config.database_path)?;
    info!("Database opened: {}", config.database_path);

    // Seed the bankroll ledger on first start
    if db.current_balance()?.is_none() {
        db.record_balance(config.initial_bankroll, 0.0)?;
        info!("Initial bankroll recorded: {:.2}", config.initial_bankroll);
    }

    let profile = config.profile();
    info!(
        "Risk profile {:?}: min_edge {:.2}, min_confidence {:.2}, kelly {:.2}, cap {} signals/match",
        config.risk_profile,
        profile.min_edge,
        profile.min_confidence,
        profile.kelly_fraction,
        profile.max_signals_per_match
    );

    let pipeline = SignalPipeline::new(db.clone(), profile);

    if config.run_once {
        run_cycle(&pipeline, &db);
        return Ok(());
    }

    // Small start-up jitter so restarts do not hammer the store at the
    // exact same instant as the data-fetch jobs.
    if config.startup_jitter_secs > 0 {
        let jitter = rand::thread_rng().gen_range(0..=config.startup_jitter_secs);
        info!("Sleeping {}s before the first cycle", jitter);
        tokio::time::sleep(Duration::from_secs(jitter)).await;
    }

    let mut interval = tokio::time::interval(Duration::from_secs(config.run_interval_secs));
    loop {
        tokio::select! {
            _ = interval.tick() => run_cycle(&pipeline, &db),
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown requested, exiting");
                return Ok(());
            }
        }
    }
}

/// One daily cycle: settle yesterday's signals, then analyze upcoming
/// matches. Either half failing is logged without taking the loop down.
fn run_cycle(pipeline: &SignalPipeline, db: &Database) {
    match settle_finished_matches(db) {
        Ok(summary) if summary.settled > 0 => info!(
            "Settlement: {} settled, {} still open, pnl {:+.2}",
            summary.settled, summary.skipped, summary.total_pnl
        ),
        Ok(_) => {}
        Err(e) => error!("Settlement sweep failed: {:#}", e),
    }

    match pipeline.run() {
        Ok(report) => {
            for outcome in &report.outcomes {
                match outcome {
                    MatchOutcome::Signals { match_id, count } => {
                        debug!("Match {}: {} signal(s) queued for publication", match_id, count)
                    }
                    MatchOutcome::NoValue { match_id } => {
                        debug!("Match {}: nothing worth backing", match_id)
                    }
                    MatchOutcome::AlreadyAnalyzed { match_id } => {
                        debug!("Match {}: signal set already present", match_id)
                    }
                    MatchOutcome::Failed { match_id, reason } => {
                        error!("Match {} was skipped this cycle: {}", match_id, reason)
                    }
                }
            }
            info!(
                "Analysis cycle done: {} new signal(s), {} match(es) processed",
                report.signals.len(),
                report.matches_processed()
            );
        }
        Err(e) => error!("Analysis run failed: {:#}", e),
    }
}

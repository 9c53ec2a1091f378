//! Simulation runner.
//!
//! # Usage
//!
//! ```bash
//! # Every scenario with seed 0
//! enveil-sim
//!
//! # One scenario over 100 seeds, with runtime logs
//! enveil-sim --scenario reply-all --seed 1 --runs 100 --log-level debug
//! ```

use std::process::ExitCode;

use clap::Parser;
use enveil_harness::{Scenario, scenario};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Enveil deterministic simulation
#[derive(Parser, Debug)]
#[command(name = "enveil-sim")]
#[command(about = "Run enveil user stories under deterministic simulation")]
#[command(version)]
struct Args {
    /// First seed
    #[arg(long, default_value = "0")]
    seed: u64,

    /// Seeds to run, starting at `--seed`
    #[arg(long, default_value = "1")]
    runs: u64,

    /// Run only this scenario
    #[arg(long, value_enum)]
    scenario: Option<Scenario>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> ExitCode {
    let args = Args::parse();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_time().start_paused(true).build() {
        Ok(runtime) => runtime,
        Err(err) => {
            tracing::error!(%err, "cannot build runtime");
            return ExitCode::FAILURE;
        },
    };

    let scenarios = args.scenario.map_or_else(|| Scenario::ALL.to_vec(), |s| vec![s]);
    let mut failures = 0usize;

    for seed in args.seed..args.seed.saturating_add(args.runs) {
        for &scenario in &scenarios {
            if let Err(err) = runtime.block_on(scenario::run(scenario, seed)) {
                tracing::error!(%scenario, seed, %err, "scenario failed");
                failures += 1;
            }
        }
    }

    let total = scenarios.len() as u64 * args.runs;
    if failures == 0 {
        tracing::info!(total, "all scenarios passed");
        ExitCode::SUCCESS
    } else {
        tracing::error!(failures, total, "scenarios failed");
        ExitCode::FAILURE
    }
}

//! accrue: drive a staking pool from the command line.
//!
//! `accrue demo` runs the reference two-participant scenario; `accrue replay`
//! executes a JSON operation script. Both print the step outcomes and a final
//! pool report as JSON on stdout. Logs go to stderr.

use std::path::PathBuf;

use accrue_core::types::Timestamp;
use accrue_pool::{PoolConfig, PoolReport, StakingPool};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;

mod script;

use script::{Labels, Op, Step, StepOutcome};

/// Accrue: time-weighted staking reward ledger.
#[derive(Parser, Debug)]
#[command(name = "accrue", version, about = "Time-weighted staking reward ledger")]
struct Args {
    /// Config file (TOML, JSON, or YAML); ACCRUE_* env vars override it
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Log output format ("text" or "json")
    #[arg(long, global = true, default_value = "text")]
    log_format: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the reference scenario: a 10-second round funded with 1000 units.
    Demo,
    /// Replay an operation script against a fresh pool.
    Replay {
        /// Path to a JSON array of steps
        script: PathBuf,
        /// Abort on the first failing step
        #[arg(long)]
        strict: bool,
        /// Report time; defaults to the last step's time
        #[arg(long)]
        report_at: Option<Timestamp>,
    },
}

/// A report line with the participant's label instead of raw identity.
#[derive(Serialize)]
struct NamedLine {
    name: String,
    stake: u64,
    earned: u64,
    paid: u64,
}

#[derive(Serialize)]
struct Output {
    steps: Vec<StepOutcome>,
    report: PoolReport,
    participants: Vec<NamedLine>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config =
        PoolConfig::load(args.config.as_deref()).context("Failed to load pool configuration")?;
    if let Some(level) = args.log_level {
        config.log_level = level;
    }
    init_logging(&config.log_level, &args.log_format);

    info!("accrue v{}", env!("CARGO_PKG_VERSION"));

    let (steps, strict, report_at) = match args.command {
        Command::Demo => {
            config.duration_secs = 10;
            (demo_steps(&config.admin), true, None)
        }
        Command::Replay {
            script,
            strict,
            report_at,
        } => (script::load(&script)?, strict, report_at),
    };

    let pool = StakingPool::new(&config);
    let mut labels = Labels::default();
    labels.id(&config.admin);

    let outcomes = script::run(&pool, &steps, &mut labels, strict)?;

    let now = report_at.or_else(|| steps.last().map(|s| s.at)).unwrap_or(0);
    let report = pool.report(now).context("Failed to build pool report")?;
    let participants = report
        .participants
        .iter()
        .map(|line| NamedLine {
            name: labels.name(&line.participant),
            stake: line.stake,
            earned: line.earned,
            paid: line.paid,
        })
        .collect();

    let output = Output {
        steps: outcomes,
        report,
        participants,
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// The reference scenario.
///
/// Round of 10 seconds funded with 1000 at t=1 (rate 100/s). A stakes 10 at
/// t=2, B stakes 20 at t=4, A adds 30 at t=6, B withdraws 20 at t=8, A
/// withdraws 40 at t=9, then both claim.
fn demo_steps(admin: &str) -> Vec<Step> {
    let step = |at, op, who: &str, amount| Step {
        at,
        op,
        who: who.to_string(),
        amount,
    };
    vec![
        step(1, Op::Fund, admin, 1000),
        step(2, Op::Stake, "alice", 10),
        step(4, Op::Stake, "bob", 20),
        step(6, Op::Stake, "alice", 30),
        step(8, Op::Withdraw, "bob", 20),
        step(9, Op::Withdraw, "alice", 40),
        step(10, Op::Claim, "bob", 0),
        step(10, Op::Claim, "alice", 0),
    ]
}

/// Initialize tracing subscriber with the given log level and output format.
///
/// `RUST_LOG` takes precedence over `level_str`. Logs are written to stderr
/// so that stdout carries only the JSON result.
fn init_logging(level_str: &str, format: &str) {
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level_str));

    if format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_level(true).with_writer(std::io::stderr))
            .init();
    }
}

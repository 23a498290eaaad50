//! # PLC Cycle Stability Tool
//!
//! Reads a `plc_runtime` log (file or stdin), prints the stability report
//! and exits with code 1 when fewer cycles than required stayed inside the
//! jitter band.

use std::fs::File;
use std::io::{self, BufReader};
use std::path::PathBuf;
use std::process;

use clap::Parser;
use plc_common::config::RuntimeConfig;
use plc_diagnostic::{StabilityCriteria, StabilityReport, parse_cycle_times};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// PLC cycle stability analysis
#[derive(Parser, Debug)]
#[command(name = "plc_diagnostic")]
#[command(version)]
#[command(about = "Check cycle timing stability from a plc_runtime log")]
struct Args {
    /// Log file to analyse; reads stdin when omitted or `-`.
    log: Option<PathBuf>,

    /// Target cycle period in ms.
    #[arg(long)]
    period: Option<f64>,

    /// Take the target period from this runtime configuration.
    #[arg(long, conflicts_with = "period")]
    config: Option<PathBuf>,

    /// Band half-width in percent of the period.
    #[arg(long)]
    tolerance: Option<f64>,

    /// Share of cycles that must lie in the band, in percent.
    #[arg(long)]
    required: Option<f64>,

    /// Print the report as JSON.
    #[arg(long)]
    json: bool,

    /// Enable verbose logging (DEBUG level).
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let args = Args::parse();
    setup_tracing(args.verbose);

    match run(&args) {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            error!("FATAL: {e}");
            process::exit(1);
        }
    }
}

/// Returns whether the stability check passed.
fn run(args: &Args) -> Result<bool, Box<dyn std::error::Error>> {
    let criteria = criteria(args)?;

    let times = match args.log.as_deref() {
        Some(path) if path.as_os_str() != "-" => {
            info!(path = %path.display(), "analysing log file");
            parse_cycle_times(BufReader::new(File::open(path)?))?
        }
        _ => {
            info!("analysing stdin");
            parse_cycle_times(io::stdin().lock())?
        }
    };
    info!(samples = times.len(), "cycle times extracted");

    let report = StabilityReport::analyze(&times, criteria)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{report}");
    }
    Ok(report.passed)
}

fn criteria(args: &Args) -> Result<StabilityCriteria, Box<dyn std::error::Error>> {
    let mut criteria = StabilityCriteria::default();
    if let Some(path) = &args.config {
        let config = RuntimeConfig::load_validated(path)?;
        criteria.target_ms = f64::from(config.runtime.cycle_period_ms);
    }
    if let Some(period) = args.period {
        criteria.target_ms = period;
    }
    if let Some(tolerance) = args.tolerance {
        criteria.tolerance_percent = tolerance;
    }
    if let Some(required) = args.required {
        criteria.required_percent = required;
    }
    criteria.validate()?;
    Ok(criteria)
}

/// Logs go to stderr; stdout carries the report.
fn setup_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .compact()
        .init();
}

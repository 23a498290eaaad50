//! # PLC Cycle Runtime
//!
//! Loads the runtime TOML, builds the cycle graph, optionally opens the
//! debug-attach listener and runs the fixed-period cycle until stopped
//! (Ctrl-C / SIGTERM) or the configured cycle limit is reached.

use clap::Parser;
use plc_common::config::LoggingConfig;
use plc_common::consts::{CYCLE_PERIOD_MS_MAX, CYCLE_PERIOD_MS_MIN, DEFAULT_CONFIG_PATH};
use plc_runtime::config::LoadedConfig;
use plc_runtime::cycle::rt_setup;
use plc_runtime::debug::DebugServer;
use plc_runtime::{CycleScheduler, LogSink, MonotonicClock, SharedProcessImage};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// PLC Cycle Runtime: fixed-period function block execution
#[derive(Parser, Debug)]
#[command(name = "plc_runtime")]
#[command(version)]
#[command(about = "Drift-free fixed-period PLC cycle runtime")]
struct Args {
    /// Path to the runtime configuration TOML.
    #[arg(default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Stop after this many cycles (overrides runtime.max_cycles).
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    cycles: Option<u64>,

    /// Cycle period in ms (overrides runtime.cycle_period_ms).
    #[arg(
        long,
        value_parser = clap::value_parser!(u32).range(CYCLE_PERIOD_MS_MIN as i64..=CYCLE_PERIOD_MS_MAX as i64)
    )]
    period_ms: Option<u32>,

    /// Enable verbose logging (DEBUG level).
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format.
    #[arg(long)]
    json: bool,
}

fn main() {
    let args = Args::parse();

    let loaded = match LoadedConfig::load(&args.config) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("FATAL: {}: {e}", args.config.display());
            process::exit(1);
        }
    };

    if let Err(e) = setup_tracing(&args, &loaded.config.logging) {
        eprintln!("FATAL: logging setup failed: {e}");
        process::exit(1);
    }

    info!("PLC runtime v{} starting...", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(&args, loaded) {
        error!("FATAL: {e}");
        process::exit(1);
    }

    info!("PLC runtime shutdown complete");
}

fn run(args: &Args, mut loaded: LoadedConfig) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(cycles) = args.cycles {
        loaded.config.runtime.max_cycles = Some(cycles);
    }
    if let Some(period_ms) = args.period_ms {
        loaded.config.runtime.cycle_period_ms = period_ms;
    }

    let period = loaded.period();
    let options = loaded.scheduler_options();
    info!(
        period_ms = period.as_millis() as u64,
        blocks = loaded.graph.len(),
        inputs = loaded.inputs.len(),
        max_cycles = ?options.max_cycles,
        "config OK"
    );

    let LoadedConfig {
        config,
        graph,
        inputs,
    } = loaded;

    let image = SharedProcessImage::new(inputs.clone(), graph.output_image());
    let sink = LogSink::new(config.diagnostics.stats_interval);
    let mut scheduler =
        CycleScheduler::new(graph, inputs, MonotonicClock::new(), image.clone(), sink, options);
    let handle = scheduler.handle();

    // Setup signal handler for graceful shutdown at the next cycle boundary.
    let stop = handle.clone();
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        let _ = stop.stop();
    })?;

    let _debug = if config.debug.enabled {
        match DebugServer::spawn(
            config.debug.address(),
            Duration::from_secs(config.debug.timeout_s),
            handle.clone(),
        ) {
            Ok(server) => Some(server),
            Err(e) => {
                warn!(
                    addr = %config.debug.address(),
                    error = %e,
                    "debug attach unavailable, continuing without it"
                );
                None
            }
        }
    } else {
        None
    };

    rt_setup(config.performance.cpu_affinity, config.performance.rt_priority)?;
    info!(
        cpu_affinity = ?config.performance.cpu_affinity,
        priority = config.performance.rt_priority,
        "RT setup complete"
    );

    let stats = scheduler.run(period)?;
    info!(
        cycles = stats.cycle_count,
        within_tolerance_pct = format_args!("{:.1}", stats.within_tolerance_percent()),
        overruns = stats.overruns,
        "cycle loop finished"
    );
    for (name, value) in image.outputs().iter() {
        info!(output = name, value, "final output");
    }

    Ok(())
}

/// Setup tracing subscriber from CLI arguments and the `[logging]` section.
fn setup_tracing(
    args: &Args,
    logging: &LoggingConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let directive = if args.verbose {
        "debug"
    } else {
        logging.level.as_directive()
    };
    let filter = EnvFilter::from_default_env().add_directive(directive.parse()?);
    let json = args.json || logging.json;
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match (&logging.file, json) {
        (Some(path), true) => builder
            .json()
            .with_ansi(false)
            .with_writer(open_log(path)?)
            .init(),
        (Some(path), false) => builder
            .compact()
            .with_ansi(false)
            .with_writer(open_log(path)?)
            .init(),
        (None, true) => builder.json().init(),
        (None, false) => builder.compact().init(),
    }
    Ok(())
}

fn open_log(path: &Path) -> std::io::Result<Mutex<std::fs::File>> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    Ok(Mutex::new(file))
}

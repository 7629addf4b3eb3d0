//! # Mech Control Unit
//!
//! Fixed-rate control loop for the ball-handling mechanisms.
//!
//! This binary is the composition root: it loads the TOML configuration
//! (or built-in defaults), constructs one instance per subsystem, wires
//! them to their hardware ports, registers them with the cycle runner,
//! and runs until ctrl-c. Command-issuing layers (operator input,
//! autonomous routines) receive handles to the same subsystem instances;
//! there is no global lookup.
//!
//! Simulation ports are wired in when no hardware backend is present;
//! real drivers implement the same capability traits.

use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;

use mech_common::config::{load_config, ControlConfig};
use mech_control_unit::cycle::{CycleRunner, RtOptions};
use mech_control_unit::sim::{SimDigitalInput, SimMotor};
use mech_control_unit::subsystems::{Feeder, Intake};

/// Mech Control Unit — fixed-rate subsystem control loop
#[derive(Parser, Debug)]
#[command(name = "mech_control_unit")]
#[command(version)]
#[command(about = "Fixed-rate subsystem control loop for ball-handling mechanisms")]
struct Args {
    /// Path to control configuration TOML. Built-in defaults when omitted.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// CPU core to pin the cycle thread to (rt builds only).
    #[arg(long, default_value_t = 1)]
    cpu_core: usize,

    /// SCHED_FIFO priority for the cycle thread (rt builds only).
    #[arg(long, default_value_t = 80)]
    rt_priority: i32,

    /// Enable verbose logging (DEBUG level).
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format.
    #[arg(long)]
    json: bool,
}

fn main() {
    let args = Args::parse();
    setup_tracing(&args);

    info!("Mech Control Unit v{} starting...", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(&args) {
        error!("FATAL: {e}");
        process::exit(1);
    }

    info!("Mech Control Unit shutdown complete");
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = match &args.config {
        Some(path) => {
            info!("loading config from {}", path.display());
            load_config(path)?
        }
        None => {
            warn!("no --config given, using built-in defaults");
            ControlConfig::default()
        }
    };
    info!(period_ms = config.cycle.period_ms, "config OK");

    // Composition root: one instance per mechanism.
    let feeder = Arc::new(Feeder::new(
        config.feeder.clone(),
        SimMotor::new(),
        SimDigitalInput::new(false),
        SimDigitalInput::new(false),
    ));
    let intake = Arc::new(Intake::new(
        config.intake.clone(),
        SimMotor::new(),
        SimDigitalInput::new(false),
    ));

    let mut runner = CycleRunner::new(config.cycle.period()).with_rt(RtOptions {
        cpu_core: args.cpu_core,
        priority: args.rt_priority,
    });
    runner.register(feeder.clone())?;
    runner.register(intake.clone())?;
    runner.start()?;
    info!("cycle runner started");

    // Command-issuing layers would hold `feeder` / `intake` handles here.

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        info!("received shutdown signal");
        r.store(false, Ordering::SeqCst);
    })?;

    while running.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_millis(100));
    }

    runner.stop()?;
    let stats = runner.stats();
    info!(
        cycles = stats.cycle_count,
        overruns = stats.overruns,
        avg_us = stats.avg_cycle_ns() / 1000,
        "final cycle statistics"
    );
    Ok(())
}

/// Setup tracing subscriber based on CLI arguments.
fn setup_tracing(args: &Args) {
    let level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .compact()
            .init();
    }
}

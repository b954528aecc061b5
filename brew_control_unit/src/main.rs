//! # Brew Control Unit
//!
//! Runs the fermentation chamber controller against the built-in chamber
//! simulator. Settings persist in an EEPROM-sized image file when `--store`
//! is given, otherwise in memory for the lifetime of the process.

use brew_common::config::{ConfigError, LogLevel};
use brew_common::fixed::Temp;
use brew_control_unit::config::{ControllerConfig, load_config};
use brew_control_unit::controller::ControlLoop;
use brew_control_unit::cycle::{CycleRunner, RunOptions, rt_setup};
use brew_control_unit::sim::Chamber;
use brew_control_unit::store::{FileStore, MemoryStore, SettingsStore};
use clap::Parser;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{Level, error, info};
use tracing_subscriber::EnvFilter;

/// Brew Control Unit: fermentation chamber controller
#[derive(Parser, Debug)]
#[command(name = "brew_control_unit")]
#[command(author = "RTS007")]
#[command(version)]
#[command(about = "Fermentation chamber temperature controller with chamber simulator")]
struct Args {
    /// Path to the controller configuration TOML.
    #[arg(default_value = "config/chamber.toml")]
    config: PathBuf,

    /// Settings store image file. In-memory when absent.
    #[arg(long, value_name = "FILE")]
    store: Option<PathBuf>,

    /// Stop after this many ticks.
    #[arg(long)]
    ticks: Option<u64>,

    /// Run the simulated clock without sleeping.
    #[arg(long)]
    fast: bool,

    /// Mode code to apply at start: o, b, f, p or t.
    #[arg(long, value_name = "CODE")]
    mode: Option<char>,

    /// Beer setpoint to apply at start [°C].
    #[arg(long, value_name = "DEGREES")]
    beer: Option<f64>,

    /// Fridge setpoint to apply at start [°C].
    #[arg(long, value_name = "DEGREES")]
    fridge: Option<f64>,

    /// CPU core to pin the control thread to (default: 1).
    #[arg(long, default_value_t = 1)]
    cpu_core: usize,

    /// SCHED_FIFO priority (default: 40).
    #[arg(long, default_value_t = 40)]
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
    let config = load_config(&args.config);
    let level = config
        .as_ref()
        .map(|c| c.shared.log_level)
        .unwrap_or_default();
    setup_tracing(&args, level);

    info!("Brew Control Unit v{} starting...", env!("CARGO_PKG_VERSION"));

    let result = config
        .map_err(|e| config_error(&args, e))
        .and_then(|config| run(&args, config));
    if let Err(e) = result {
        error!("FATAL: {e}");
        process::exit(1);
    }

    info!("Brew Control Unit shutdown complete");
}

fn config_error(args: &Args, e: ConfigError) -> Box<dyn std::error::Error> {
    format!("{}: {e}", args.config.display()).into()
}

fn run(args: &Args, config: ControllerConfig) -> Result<(), Box<dyn std::error::Error>> {
    info!(
        service = %config.shared.service_name,
        min_cool_off = config.timing.min_cool_off_time,
        min_switch = config.timing.min_switch_time,
        "Config OK"
    );

    match &args.store {
        Some(path) => {
            info!("Settings store: {}", path.display());
            run_with_store(args, config, FileStore::open(path))
        }
        None => {
            info!("Settings store: in memory");
            run_with_store(args, config, MemoryStore::new())
        }
    }
}

fn run_with_store<S: SettingsStore>(
    args: &Args,
    config: ControllerConfig,
    store: S,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut controller = ControlLoop::boot(store, config.constants, config.timing, 0);
    apply_overrides(args, &mut controller)?;

    rt_setup(args.cpu_core, args.rt_priority)?;
    info!(
        "RT setup complete (cpu_core={}, priority={})",
        args.cpu_core, args.rt_priority
    );

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        r.store(false, Ordering::SeqCst);
    })?;

    let options = RunOptions {
        fast: args.fast,
        max_ticks: args.ticks,
    };
    let mut runner = CycleRunner::new(
        controller,
        Chamber::new(config.simulation),
        running,
        options,
    );
    runner.run()?;

    let c = &runner.controller;
    info!(
        state = %c.state(),
        mode = %c.mode(),
        heat_estimator = %c.settings().heat_estimator,
        cool_estimator = %c.settings().cool_estimator,
        "final controller state"
    );
    Ok(())
}

/// Apply command-line mode and setpoints through the host API.
fn apply_overrides<S: SettingsStore>(
    args: &Args,
    controller: &mut ControlLoop<S>,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(code) = args.mode {
        let code = u8::try_from(code).map_err(|_| format!("mode code {code:?} is not ASCII"))?;
        controller.set_mode_code(code)?;
    }
    if let Some(beer) = args.beer {
        controller.set_beer_setting(Temp::from_f64(beer))?;
    }
    if let Some(fridge) = args.fridge {
        controller.set_fridge_setting(Temp::from_f64(fridge))?;
    }
    info!(
        mode = %controller.mode(),
        beer_setting = ?controller.beer_setting(),
        fridge_setting = ?controller.fridge_setting(),
        "controller ready"
    );
    Ok(())
}

/// Setup tracing subscriber based on CLI arguments and the configured level.
fn setup_tracing(args: &Args, level: LogLevel) {
    let filter = if args.verbose {
        EnvFilter::from_default_env().add_directive(Level::DEBUG.into())
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::default().add_directive(Level::from(level).into()))
    };

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

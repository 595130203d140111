//! # Servo HAL Binary
//!
//! Cyclic read/write service for a chain of smart servos on one serial bus.
//!
//! # Usage
//!
//! ```bash
//! # Run against the configured bus
//! servo_hal --config config/servo.toml
//!
//! # Simulated servos, 500 cycles, verbose
//! servo_hal --config config/servo.toml --simulate --cycles 500 -v
//!
//! # No hardware at all: commands loop back into state
//! servo_hal --config config/servo.toml --dummy
//! ```

#![deny(warnings)]

use clap::Parser;
use servo_common::config::{LogLevel, load_system_config};
use servo_common::consts::DEFAULT_CONFIG_PATH;
use servo_hal::core::ServoCore;
use servo_hal::driver_registry::DriverRegistry;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use tracing::{Level, error, info};
use tracing_subscriber::EnvFilter;

/// Servo HAL - multi-servo hardware interface with pluggable bus drivers
#[derive(Parser, Debug)]
#[command(name = "servo_hal")]
#[command(version)]
#[command(about = "Multi-servo hardware interface with pluggable bus drivers")]
#[command(long_about = None)]
struct Args {
    /// Path to the system configuration file.
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Bus driver to load (overrides `hardware.driver`)
    #[arg(short, long)]
    driver: Option<String>,

    /// Force the simulation driver
    #[arg(short = 's', long, conflicts_with = "driver")]
    simulate: bool,

    /// Run without hardware; commands loop back into state
    #[arg(long, conflicts_with_all = ["driver", "simulate"])]
    dummy: bool,

    /// Stop after this many cycles
    #[arg(long, value_name = "N")]
    cycles: Option<u64>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long)]
    json: bool,
}

fn main() {
    if let Err(e) = run() {
        error!("Servo HAL failed: {}", e);
        eprintln!("servo_hal: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = load_system_config(&args.config)?;

    setup_tracing(&args, config.shared.log_level);

    info!(
        "Servo HAL v{} starting ({})...",
        env!("CARGO_PKG_VERSION"),
        config.shared.service_name
    );

    let driver_name = if args.dummy {
        info!("Dummy mode enabled");
        config.hardware.use_dummy = true;
        "dummy".to_string()
    } else if args.simulate {
        info!("Simulation mode enabled");
        "simulation".to_string()
    } else if let Some(driver) = args.driver.clone() {
        info!("Driver from CLI: {}", driver);
        driver
    } else {
        config.hardware.driver.clone()
    };

    let mut core = ServoCore::new(config, DriverRegistry::with_builtin_drivers())?;

    let running = core.running_flag();
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        running.store(false, Ordering::SeqCst);
    })?;

    core.init(&driver_name)?;

    if let Err(e) = core.run(args.cycles) {
        error!("Cycle loop error: {}", e);
    }

    if args.cycles.is_some() {
        match core.snapshot_json() {
            Ok(snapshot) => println!("{snapshot}"),
            Err(e) => error!("Snapshot unavailable: {}", e),
        }
    }

    core.shutdown()?;

    let stats = core.stats();
    info!(
        "Servo HAL shutdown complete: {} cycles, avg={}us, max={}us, violations={}, failed={}",
        stats.cycle_count,
        stats.avg_cycle_time_us(),
        stats.max_cycle_time_us,
        stats.timing_violations,
        stats.failed_cycles
    );
    Ok(())
}

/// Setup tracing subscriber; `--verbose` overrides the configured level.
fn setup_tracing(args: &Args, log_level: LogLevel) {
    let filter = if args.verbose {
        EnvFilter::from_default_env().add_directive(Level::DEBUG.into())
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(log_level.as_directive()))
    };

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

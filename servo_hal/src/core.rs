//! Servo core struct and cycle loop management.
//!
//! The `ServoCore` struct is the main entry point of the service. It owns
//! the configuration, creates the bus driver through the registry and paces
//! `read()`/`write()` pairs on the hardware interface.

use crate::driver_registry::DriverRegistry;
use crate::error::HardwareError;
use crate::hardware::{Lifecycle, ServoHardware};
use serde::Serialize;
use servo_common::bus::driver::ActuatorBus;
use servo_common::config::SystemConfig;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Hardware interface over a registry-created bus.
pub type DynHardware = ServoHardware<Box<dyn ActuatorBus>>;

/// Servo core manages the driver and the cycle loop.
pub struct ServoCore {
    /// System configuration
    config: SystemConfig,
    /// Available drivers
    registry: DriverRegistry,
    /// Active hardware interface
    hardware: Option<DynHardware>,
    /// Running flag for loop control
    running: Arc<AtomicBool>,
    /// Cycle time from config
    cycle_time: Duration,
    /// Timing statistics
    stats: TimingStats,
}

/// Timing statistics for loop monitoring.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimingStats {
    /// Number of cycles executed
    pub cycle_count: u64,
    /// Number of timing violations (cycle exceeded target)
    pub timing_violations: u64,
    /// Cycles whose read or write returned an error
    pub failed_cycles: u64,
    /// Maximum observed cycle time
    pub max_cycle_time_us: u64,
    /// Sum of cycle times for average calculation
    pub total_cycle_time_us: u64,
}

impl TimingStats {
    /// Average cycle time, zero before the first cycle.
    pub fn avg_cycle_time_us(&self) -> u64 {
        self.total_cycle_time_us
            .checked_div(self.cycle_count)
            .unwrap_or(0)
    }

    /// Account one cycle; returns true on a timing violation.
    fn record(&mut self, cycle_time_us: u64, target_us: u64) -> bool {
        self.cycle_count += 1;
        self.total_cycle_time_us += cycle_time_us;
        self.max_cycle_time_us = self.max_cycle_time_us.max(cycle_time_us);
        let violated = cycle_time_us > target_us;
        if violated {
            self.timing_violations += 1;
        }
        violated
    }
}

/// Log the first ten occurrences, then every thousandth.
fn should_report(count: u64) -> bool {
    count <= 10 || count % 1000 == 0
}

impl ServoCore {
    /// Create a new ServoCore instance with the given configuration.
    ///
    /// # Errors
    /// Returns error if configuration validation fails.
    pub fn new(config: SystemConfig, registry: DriverRegistry) -> Result<Self, HardwareError> {
        config.validate()?;

        let cycle_time = Duration::from_micros(config.hardware.cycle_time_us as u64);

        info!(
            "ServoCore created with {} joints, cycle_time={}us",
            config.joints.len(),
            config.hardware.cycle_time_us
        );

        Ok(Self {
            config,
            registry,
            hardware: None,
            running: Arc::new(AtomicBool::new(false)),
            cycle_time,
            stats: TimingStats::default(),
        })
    }

    /// Create the bus driver and bring the hardware interface up.
    ///
    /// # Arguments
    /// * `driver_name` - Name of driver to load (e.g., "protocol2")
    ///
    /// # Errors
    /// Returns error if the driver is unknown or bring-up fails.
    pub fn init(&mut self, driver_name: &str) -> Result<(), HardwareError> {
        info!("Initializing ServoCore with driver '{}'...", driver_name);

        let bus = self.registry.create_driver(driver_name)?;
        info!("Created driver: {}", bus.name());

        let mut hardware =
            ServoHardware::new(bus, self.config.hardware.clone(), &self.config.joints)?;
        hardware.activate()?;
        self.hardware = Some(hardware);

        info!("ServoCore initialized successfully");
        Ok(())
    }

    /// One `read()` followed by one `write()`.
    ///
    /// The write still runs when the read fails; the first error is returned.
    pub fn step(&mut self) -> Result<(), HardwareError> {
        let hardware = self.hardware.as_mut().ok_or(HardwareError::NotConfigured)?;
        let read = hardware.read();
        let write = hardware.write();
        read.and(write)
    }

    /// Run the cycle loop.
    ///
    /// Blocks until the running flag is cleared or `max_cycles` cycles have
    /// run. Failing cycles are logged and counted, never fatal.
    ///
    /// # Errors
    /// Returns error if the core has not been initialized.
    pub fn run(&mut self, max_cycles: Option<u64>) -> Result<(), HardwareError> {
        if self.hardware.is_none() {
            return Err(HardwareError::NotConfigured);
        }

        info!(
            "Starting ServoCore loop (cycle_time={}us)...",
            self.cycle_time.as_micros()
        );
        self.running.store(true, Ordering::SeqCst);

        if detect_rt_mode() {
            info!("Running in real-time mode");
        } else {
            info!("Running in standard (non-RT) mode");
        }

        let target_us = self.config.hardware.cycle_time_us as u64;

        while self.running.load(Ordering::SeqCst)
            && max_cycles.is_none_or(|max| self.stats.cycle_count < max)
        {
            let cycle_start = Instant::now();

            if let Err(e) = self.step() {
                self.stats.failed_cycles += 1;
                if should_report(self.stats.failed_cycles) {
                    warn!("Cycle #{} failed: {}", self.stats.cycle_count, e);
                }
            }

            let cycle_time_us = cycle_start.elapsed().as_micros() as u64;
            if self.stats.record(cycle_time_us, target_us)
                && should_report(self.stats.timing_violations)
            {
                warn!(
                    "Timing violation #{}: cycle took {}us (target {}us)",
                    self.stats.timing_violations, cycle_time_us, target_us
                );
            }

            // Sleep for remaining cycle time
            let elapsed = cycle_start.elapsed();
            if elapsed < self.cycle_time {
                std::thread::sleep(self.cycle_time - elapsed);
            }

            if self.stats.cycle_count % 1000 == 0 {
                debug!(
                    "Loop: {} cycles, avg={}us, max={}us, violations={}, failed={}",
                    self.stats.cycle_count,
                    self.stats.avg_cycle_time_us(),
                    self.stats.max_cycle_time_us,
                    self.stats.timing_violations,
                    self.stats.failed_cycles
                );
            }
        }

        self.running.store(false, Ordering::SeqCst);
        info!(
            "ServoCore loop stopped after {} cycles (violations: {}, failed: {})",
            self.stats.cycle_count, self.stats.timing_violations, self.stats.failed_cycles
        );
        Ok(())
    }

    /// Stop the loop and deactivate the hardware interface.
    pub fn shutdown(&mut self) -> Result<(), HardwareError> {
        info!("Shutdown requested");
        self.running.store(false, Ordering::SeqCst);

        if let Some(hardware) = self.hardware.as_mut() {
            if let Some(diag) = hardware.bus().diagnostics() {
                info!(
                    "Bus diagnostics: tx={} rx={} errors={}",
                    diag.tx_packets, diag.rx_packets, diag.errors
                );
            }
            if hardware.lifecycle() == Lifecycle::Active {
                hardware.deactivate()?;
            }
        }
        Ok(())
    }

    /// Get the running flag for signal handlers.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Get timing statistics.
    pub fn stats(&self) -> TimingStats {
        self.stats
    }

    /// Get the configuration.
    pub fn config(&self) -> &SystemConfig {
        &self.config
    }

    /// Get the hardware interface, once initialized.
    pub fn hardware(&self) -> Option<&DynHardware> {
        self.hardware.as_ref()
    }

    /// Get the hardware interface mutably, once initialized.
    pub fn hardware_mut(&mut self) -> Option<&mut DynHardware> {
        self.hardware.as_mut()
    }

    /// Joint states, commands and mode flags as JSON.
    pub fn snapshot_json(&self) -> Result<String, HardwareError> {
        let hardware = self.hardware.as_ref().ok_or(HardwareError::NotConfigured)?;
        let joints: Vec<serde_json::Value> = hardware
            .joints()
            .iter()
            .map(|j| {
                serde_json::json!({
                    "name": j.name,
                    "id": j.device_id(),
                    "state": j.state,
                    "command": j.command,
                })
            })
            .collect();
        let snapshot = serde_json::json!({
            "cycle": self.stats.cycle_count,
            "control_mode": hardware.control_mode(),
            "gripper_mode": hardware.gripper_mode(),
            "torque_enabled": hardware.torque_enabled(),
            "joints": joints,
        });
        Ok(snapshot.to_string())
    }
}

/// Detect if running in real-time mode by checking scheduler policy.
fn detect_rt_mode() -> bool {
    #[cfg(target_os = "linux")]
    {
        use libc::{SCHED_FIFO, SCHED_RR, sched_getscheduler};
        // SAFETY: sched_getscheduler(0) only queries the calling thread.
        unsafe {
            let policy = sched_getscheduler(0);
            policy == SCHED_FIFO || policy == SCHED_RR
        }
    }
    #[cfg(not(target_os = "linux"))]
    {
        false
    }
}

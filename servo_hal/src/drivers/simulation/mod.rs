//! Simulation driver module.
//!
//! This module provides a software bus of ideal servos for development and
//! testing without physical hardware. Devices hold a byte-accurate control
//! table, so register resolution, batched spans and unit conversions behave
//! as on a real bus.

mod driver;
mod journal;
mod servo;

pub use driver::SimulatedBus;
pub use journal::{BusEvent, SimOp};

use servo_common::bus::control_table::DEFAULT_MODEL;
use servo_common::bus::driver::ActuatorBus;

/// Factory function to create a simulation bus instance.
///
/// Every pinged id answers as the default model.
pub fn create_driver() -> Box<dyn ActuatorBus> {
    Box::new(SimulatedBus::auto_provisioning(DEFAULT_MODEL))
}

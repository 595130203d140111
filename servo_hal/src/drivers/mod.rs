//! Bus driver implementations.
//!
//! This module contains all bus driver implementations:
//!
//! - [`protocol2`] - Dynamixel Protocol 2.0 over a serial port
//! - [`simulation`] - Software servos for development and testing
//! - [`dummy`] - Accepts every call without touching hardware
//!
//! # Adding New Drivers
//!
//! 1. Create a new submodule under `drivers/`
//! 2. Implement the `ActuatorBus` trait from `servo_common::bus::driver`
//! 3. Register the driver in [`register_all_drivers`]

pub mod dummy;
pub mod protocol2;
pub mod simulation;

use crate::driver_registry::DriverRegistry;

/// Register all built-in drivers.
pub fn register_all_drivers(registry: &mut DriverRegistry) {
    registry.register("protocol2", protocol2::create_driver);
    registry.register("simulation", simulation::create_driver);
    registry.register("dummy", dummy::create_driver);
}

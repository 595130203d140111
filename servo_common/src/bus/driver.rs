//! Actuator bus trait and error types.
//!
//! This module defines:
//! - `ActuatorBus` trait - Interface for pluggable bus drivers
//! - `BusError` enum - Error types for bus operations
//! - `BusFactory` type alias - Factory function type
//! - `BusDiagnostics` struct - Optional driver diagnostics

use crate::bus::types::{ControlItem, DeviceId, HandlerId, ModelNumber};
use std::time::Duration;
use thiserror::Error;

/// Error types for bus operations.
///
/// Every variant carries the driver's descriptive message; callers only
/// distinguish success from failure.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BusError {
    /// Transport could not be opened or configured.
    #[error("Transport error: {0}")]
    Transport(String),

    /// No (valid) response from a device.
    #[error("Communication error: {0}")]
    Communication(String),

    /// Device answered with an error status.
    #[error("Device error: {0}")]
    Device(String),

    /// Register name or span unknown for the device.
    #[error("Register error: {0}")]
    Register(String),

    /// Handler id not registered or id/value lists mismatched.
    #[error("Handler error: {0}")]
    Handler(String),

    /// Operation not supported by the device or driver.
    #[error("Unsupported: {0}")]
    Unsupported(String),
}

/// Factory function type for creating bus instances.
pub type BusFactory = fn() -> Box<dyn ActuatorBus>;

/// Optional driver diagnostics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BusDiagnostics {
    /// Packets (or simulated transactions) sent.
    pub tx_packets: u64,
    /// Valid status packets received.
    pub rx_packets: u64,
    /// Failed transactions.
    pub errors: u64,
    /// Driver-specific diagnostics (JSON string)
    pub custom: Option<String>,
}

/// Trait defining the interface for actuator bus drivers.
///
/// The hardware interface drives devices exclusively through this trait,
/// so the orchestration logic never depends on a wire format.
///
/// # Lifecycle
///
/// 1. `init()` - Open the transport
/// 2. `ping()` - Discover each configured device
/// 3. `register_batched_read()` / `register_batched_write()` - Once per span
/// 4. `batched_read()` / `get_batched_value()` / `batched_write()` - Every cycle
/// 5. `shutdown()` - Release the transport
///
/// # Timing
///
/// All calls are synchronous and bounded by the transport timeout.
pub trait ActuatorBus: Send {
    /// Returns the driver's unique identifier (e.g., "protocol2", "simulation").
    fn name(&self) -> &'static str;

    /// Open the transport.
    fn init(&mut self, port: &str, baud_rate: u32) -> Result<(), BusError>;

    /// Confirm a device is present; returns its model number.
    fn ping(&mut self, id: DeviceId) -> Result<ModelNumber, BusError>;

    /// Enable torque on one device.
    fn torque_on(&mut self, id: DeviceId) -> Result<(), BusError>;

    /// Disable torque on one device.
    fn torque_off(&mut self, id: DeviceId) -> Result<(), BusError>;

    /// Select position control.
    fn set_position_mode(&mut self, id: DeviceId) -> Result<(), BusError>;

    /// Select velocity control.
    fn set_velocity_mode(&mut self, id: DeviceId) -> Result<(), BusError>;

    /// Select current-limited position control.
    fn set_current_based_position_mode(&mut self, id: DeviceId) -> Result<(), BusError>;

    /// Look up a named register of a device.
    fn resolve_register(&self, id: DeviceId, item: &str) -> Option<ControlItem>;

    /// Register a batched write span.
    fn register_batched_write(&mut self, span: ControlItem) -> Result<HandlerId, BusError>;

    /// Register a batched read span.
    fn register_batched_read(&mut self, span: ControlItem) -> Result<HandlerId, BusError>;

    /// Write one raw value per device id through a write handler.
    fn batched_write(
        &mut self,
        handler: HandlerId,
        ids: &[DeviceId],
        values: &[i32],
    ) -> Result<(), BusError>;

    /// Read the handler's span from every device id.
    fn batched_read(&mut self, handler: HandlerId, ids: &[DeviceId]) -> Result<(), BusError>;

    /// Extract `item` from the last batched read, one value per id into `out`.
    fn get_batched_value(
        &self,
        handler: HandlerId,
        ids: &[DeviceId],
        item: ControlItem,
        out: &mut [i32],
    ) -> Result<(), BusError>;

    /// Write a single named register.
    fn write_item(&mut self, id: DeviceId, item: &str, value: i32) -> Result<(), BusError>;

    /// Radians → raw position.
    fn radian_to_value(&self, id: DeviceId, radian: f64) -> i32;

    /// Raw position → radians.
    fn value_to_radian(&self, id: DeviceId, value: i32) -> f64;

    /// rad/s → raw velocity.
    fn velocity_to_value(&self, id: DeviceId, velocity: f64) -> i32;

    /// Raw velocity → rad/s.
    fn value_to_velocity(&self, id: DeviceId, value: i32) -> f64;

    /// Amperes → raw current.
    fn current_to_value(&self, id: DeviceId, current: f64) -> i32;

    /// Raw current → amperes.
    fn value_to_current(&self, id: DeviceId, value: i32) -> f64;

    /// Bound every transaction by `timeout`; applied before `init()`.
    /// Default: no-op
    fn set_timeout(&mut self, _timeout: Duration) {}

    /// Release the transport.
    /// Default: no-op
    fn shutdown(&mut self) -> Result<(), BusError> {
        Ok(())
    }

    /// Get driver-specific diagnostics.
    /// Default: None
    fn diagnostics(&self) -> Option<BusDiagnostics> {
        None
    }
}

impl<B: ActuatorBus + ?Sized> ActuatorBus for Box<B> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn init(&mut self, port: &str, baud_rate: u32) -> Result<(), BusError> {
        (**self).init(port, baud_rate)
    }

    fn ping(&mut self, id: DeviceId) -> Result<ModelNumber, BusError> {
        (**self).ping(id)
    }

    fn torque_on(&mut self, id: DeviceId) -> Result<(), BusError> {
        (**self).torque_on(id)
    }

    fn torque_off(&mut self, id: DeviceId) -> Result<(), BusError> {
        (**self).torque_off(id)
    }

    fn set_position_mode(&mut self, id: DeviceId) -> Result<(), BusError> {
        (**self).set_position_mode(id)
    }

    fn set_velocity_mode(&mut self, id: DeviceId) -> Result<(), BusError> {
        (**self).set_velocity_mode(id)
    }

    fn set_current_based_position_mode(&mut self, id: DeviceId) -> Result<(), BusError> {
        (**self).set_current_based_position_mode(id)
    }

    fn resolve_register(&self, id: DeviceId, item: &str) -> Option<ControlItem> {
        (**self).resolve_register(id, item)
    }

    fn register_batched_write(&mut self, span: ControlItem) -> Result<HandlerId, BusError> {
        (**self).register_batched_write(span)
    }

    fn register_batched_read(&mut self, span: ControlItem) -> Result<HandlerId, BusError> {
        (**self).register_batched_read(span)
    }

    fn batched_write(
        &mut self,
        handler: HandlerId,
        ids: &[DeviceId],
        values: &[i32],
    ) -> Result<(), BusError> {
        (**self).batched_write(handler, ids, values)
    }

    fn batched_read(&mut self, handler: HandlerId, ids: &[DeviceId]) -> Result<(), BusError> {
        (**self).batched_read(handler, ids)
    }

    fn get_batched_value(
        &self,
        handler: HandlerId,
        ids: &[DeviceId],
        item: ControlItem,
        out: &mut [i32],
    ) -> Result<(), BusError> {
        (**self).get_batched_value(handler, ids, item, out)
    }

    fn write_item(&mut self, id: DeviceId, item: &str, value: i32) -> Result<(), BusError> {
        (**self).write_item(id, item, value)
    }

    fn radian_to_value(&self, id: DeviceId, radian: f64) -> i32 {
        (**self).radian_to_value(id, radian)
    }

    fn value_to_radian(&self, id: DeviceId, value: i32) -> f64 {
        (**self).value_to_radian(id, value)
    }

    fn velocity_to_value(&self, id: DeviceId, velocity: f64) -> i32 {
        (**self).velocity_to_value(id, velocity)
    }

    fn value_to_velocity(&self, id: DeviceId, value: i32) -> f64 {
        (**self).value_to_velocity(id, value)
    }

    fn current_to_value(&self, id: DeviceId, current: f64) -> i32 {
        (**self).current_to_value(id, current)
    }

    fn value_to_current(&self, id: DeviceId, value: i32) -> f64 {
        (**self).value_to_current(id, value)
    }

    fn set_timeout(&mut self, timeout: Duration) {
        (**self).set_timeout(timeout)
    }

    fn shutdown(&mut self) -> Result<(), BusError> {
        (**self).shutdown()
    }

    fn diagnostics(&self) -> Option<BusDiagnostics> {
        (**self).diagnostics()
    }
}

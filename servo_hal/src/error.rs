//! Hardware interface error types.

use servo_common::bus::types::{ControlMode, DeviceId};
use servo_common::config::ConfigError;
use thiserror::Error;

/// Error types for hardware interface operations.
///
/// Bring-up errors (`TransportInit` through `HandlerRegistration`) abort
/// activation. Transition errors abort the triggering call and leave the
/// tracked mode and torque flag at their last known good values.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HardwareError {
    /// Transport could not be opened.
    #[error("Transport init failed: {0}")]
    TransportInit(String),

    /// Device did not answer a ping.
    #[error("Device {id} not found: {reason}")]
    DeviceNotFound {
        /// Pinged id.
        id: DeviceId,
        /// Bus error message.
        reason: String,
    },

    /// Required register unresolvable under every accepted name.
    #[error("Register not available: {0}")]
    MissingRegister(String),

    /// Batched read or write handler could not be registered.
    #[error("Handler registration failed: {0}")]
    HandlerRegistration(String),

    /// Mode-set (or gripper current write) failed on the bus.
    #[error("Transition to {mode} mode failed: {reason}")]
    ModeTransition {
        /// Requested mode.
        mode: ControlMode,
        /// Bus error message.
        reason: String,
    },

    /// Torque on/off failed on the bus.
    #[error("Torque transition failed: {0}")]
    TorqueTransition(String),

    /// Mode that the joint group cannot be driven in.
    #[error("Unsupported control mode: {0}")]
    UnsupportedMode(ControlMode),

    /// Nonzero effort command without a velocity command.
    #[error("Effort control is not implemented")]
    EffortUnimplemented,

    /// Cycle entry point called outside the active state.
    #[error("Hardware interface is not active")]
    NotActive,

    /// Lifecycle step called out of order.
    #[error("Hardware interface is not configured")]
    NotConfigured,

    /// No joint with this name.
    #[error("Unknown joint: {0}")]
    UnknownJoint(String),

    /// No bus driver registered under this name.
    #[error("Driver not found: {0}")]
    DriverNotFound(String),

    /// Configuration rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

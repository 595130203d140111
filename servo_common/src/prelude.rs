//! Prelude module for common re-exports.
//!
//! This module provides convenient re-exports of commonly used types
//! so that consumers can do `use servo_common::prelude::*;` and get
//! the most important types without listing individual paths.
//!
//! # Usage
//!
//! ```rust
//! use servo_common::prelude::*;
//! ```

use std::time::Duration;

// ─── Logging ────────────────────────────────────────────────────────
pub use crate::config::LogLevel;

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::bus::config::{HardwareConfig, JointConfig, JointRole};
pub use crate::config::{ConfigError, ConfigLoader, SharedConfig, SystemConfig};

// ─── System Constants ───────────────────────────────────────────────
pub use crate::consts::{CYCLE_TIME_US, MAX_JOINTS};

// ─── Actuator Bus ───────────────────────────────────────────────────
pub use crate::bus::driver::{ActuatorBus, BusDiagnostics, BusError, BusFactory};
pub use crate::bus::types::{ControlItem, ControlMode, DeviceId, HandlerId, ModelNumber};

/// Default runner cycle time as Duration.
pub const DEFAULT_CYCLE_TIME: Duration = Duration::from_micros(CYCLE_TIME_US as u64);

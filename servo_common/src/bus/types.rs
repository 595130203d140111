//! Bus-level value types.
//!
//! - `DeviceId` - Numeric address of a servo on the bus
//! - `ControlItem` - Register address/length pair from a control table
//! - `HandlerId` - Opaque handle to a registered batched read/write span
//! - `ControlMode` - Actuation strategy of a device group

use serde::{Deserialize, Serialize};
use std::fmt;

/// Numeric address of a device on the bus.
pub type DeviceId = u8;

/// Model number reported by a device on ping.
pub type ModelNumber = u16;

/// One register of a device control table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ControlItem {
    /// Register name (e.g. "Goal_Position").
    pub name: &'static str,
    /// Start address in device memory.
    pub address: u16,
    /// Length in bytes (1, 2 or 4).
    pub length: u16,
}

impl ControlItem {
    /// Create a control item.
    pub const fn new(name: &'static str, address: u16, length: u16) -> Self {
        Self {
            name,
            address,
            length,
        }
    }

    /// First address past the end of this item.
    #[inline]
    pub const fn end(&self) -> u16 {
        self.address + self.length
    }

    /// True if `other` lies entirely inside this item's span.
    #[inline]
    pub const fn contains(&self, other: &ControlItem) -> bool {
        other.address >= self.address && other.end() <= self.end()
    }
}

/// Opaque handle returned when registering a batched read or write span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(pub usize);

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Actuation strategy tracked per device group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ControlMode {
    /// No mode has been set since bring-up.
    #[default]
    Unset,
    /// Goal-position control.
    Position,
    /// Goal-velocity control.
    Velocity,
    /// Goal-position control with a goal-current ceiling.
    CurrentBasedPosition,
}

impl fmt::Display for ControlMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unset => "unset",
            Self::Position => "position",
            Self::Velocity => "velocity",
            Self::CurrentBasedPosition => "current-based position",
        };
        f.write_str(name)
    }
}

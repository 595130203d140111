//! Hardware and joint configuration.
//!
//! - `HardwareConfig` - Transport, driver and runner settings (`[hardware]`)
//! - `JointConfig` - One `[[joints]]` entry
//! - `JointRole` - Typed role a joint resolves to at bring-up

use crate::bus::consts::{DEFAULT_GRIPPER_CURRENT_LIMIT, GRIPPER_JOINT_NAME};
use crate::bus::types::DeviceId;
use crate::config::ConfigError;
use crate::consts::{
    CYCLE_TIME_US, DEFAULT_BAUD_RATE, DEFAULT_TIMEOUT_MS, DEFAULT_USB_PORT, MAX_DEVICE_ID,
    MAX_JOINTS,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::warn;

fn default_usb_port() -> String {
    DEFAULT_USB_PORT.to_string()
}

fn default_baud_rate() -> u32 {
    DEFAULT_BAUD_RATE
}

fn default_driver() -> String {
    "protocol2".to_string()
}

fn default_cycle_time_us() -> u32 {
    CYCLE_TIME_US
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

/// Transport and runner settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HardwareConfig {
    /// Serial device of the bus.
    #[serde(default = "default_usb_port")]
    pub usb_port: String,

    /// Bus baud rate.
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// Offline mode: no transport, commands loop back into state.
    #[serde(default)]
    pub use_dummy: bool,

    /// Leave torque disabled after bring-up.
    #[serde(default)]
    pub torque_off: bool,

    /// Bus driver name (`protocol2`, `simulation`, `dummy`).
    #[serde(default = "default_driver")]
    pub driver: String,

    /// Runner period in microseconds.
    #[serde(default = "default_cycle_time_us")]
    pub cycle_time_us: u32,

    /// Bounded transport timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for HardwareConfig {
    fn default() -> Self {
        Self {
            usb_port: default_usb_port(),
            baud_rate: default_baud_rate(),
            use_dummy: false,
            torque_off: false,
            driver: default_driver(),
            cycle_time_us: default_cycle_time_us(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl HardwareConfig {
    /// Validate the hardware section.
    ///
    /// # Validation Rules
    /// 1. `baud_rate` > 0
    /// 2. `cycle_time_us` > 0
    /// 3. `timeout_ms` > 0
    /// 4. `driver` not empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.baud_rate == 0 {
            return Err(ConfigError::ValidationError(
                "baud_rate must be greater than 0".to_string(),
            ));
        }
        if self.cycle_time_us == 0 {
            return Err(ConfigError::ValidationError(
                "cycle_time_us must be greater than 0".to_string(),
            ));
        }
        if self.timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "timeout_ms must be greater than 0".to_string(),
            ));
        }
        if self.driver.is_empty() {
            return Err(ConfigError::ValidationError(
                "driver cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// One logical joint.
///
/// ```toml
/// [[joints]]
/// name = "gripper"
/// id = 5
/// current_limit = 0.25
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JointConfig {
    /// Unique joint name.
    pub name: String,

    /// Device id on the bus; required unless virtual.
    #[serde(default)]
    pub id: Option<DeviceId>,

    /// Joint without a physical actuator.
    #[serde(default)]
    pub is_virtual: bool,

    /// Goal current in amperes; only meaningful for the gripper.
    #[serde(default)]
    pub current_limit: Option<f64>,
}

impl JointConfig {
    /// Device-backed joint.
    pub fn physical(name: impl Into<String>, id: DeviceId) -> Self {
        Self {
            name: name.into(),
            id: Some(id),
            is_virtual: false,
            current_limit: None,
        }
    }

    /// Joint with no actuator.
    pub fn virtual_joint(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: None,
            is_virtual: true,
            current_limit: None,
        }
    }

    /// Resolve the typed role of this joint.
    ///
    /// The non-virtual joint named `gripper` becomes the gripper device;
    /// without a configured limit it falls back to
    /// [`DEFAULT_GRIPPER_CURRENT_LIMIT`].
    pub fn role(&self) -> Result<JointRole, ConfigError> {
        if self.is_virtual {
            return Ok(JointRole::Virtual);
        }

        let id = self.id.ok_or_else(|| {
            ConfigError::ValidationError(format!("joint '{}' has no device id", self.name))
        })?;

        if self.name == GRIPPER_JOINT_NAME {
            let current_limit = match self.current_limit {
                Some(limit) => limit,
                None => {
                    warn!(
                        "Gripper current limit not set, using default {} A",
                        DEFAULT_GRIPPER_CURRENT_LIMIT
                    );
                    DEFAULT_GRIPPER_CURRENT_LIMIT
                }
            };
            return Ok(JointRole::Gripper { id, current_limit });
        }

        if self.current_limit.is_some() {
            warn!(
                "current_limit on joint '{}' ignored (only the gripper uses it)",
                self.name
            );
        }
        Ok(JointRole::Physical { id })
    }
}

/// Typed role of a joint, resolved once at bring-up.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum JointRole {
    /// Device-backed member of the main group.
    Physical {
        /// Bus device id.
        id: DeviceId,
    },
    /// Device-backed gripper, held in current-based position mode.
    Gripper {
        /// Bus device id.
        id: DeviceId,
        /// Goal current in amperes.
        current_limit: f64,
    },
    /// No actuator; state loops back from command.
    Virtual,
}

impl JointRole {
    /// Device id, if device-backed.
    pub const fn device_id(&self) -> Option<DeviceId> {
        match self {
            Self::Physical { id } | Self::Gripper { id, .. } => Some(*id),
            Self::Virtual => None,
        }
    }
}

/// Validate a joint list.
///
/// # Validation Rules
/// 1. At most `MAX_JOINTS` joints
/// 2. Names non-empty and unique
/// 3. Every non-virtual joint has an id in `0..=MAX_DEVICE_ID`
/// 4. Device ids unique across physical joints
/// 5. Virtual joints carry no id
/// 6. `current_limit`, if set, is finite and positive
pub fn validate_joints(joints: &[JointConfig]) -> Result<(), ConfigError> {
    if joints.len() > MAX_JOINTS {
        return Err(ConfigError::ValidationError(format!(
            "Too many joints: {} (max {})",
            joints.len(),
            MAX_JOINTS
        )));
    }

    let mut names = HashSet::new();
    let mut ids = HashSet::new();

    for joint in joints {
        if joint.name.is_empty() {
            return Err(ConfigError::ValidationError(
                "joint name cannot be empty".to_string(),
            ));
        }
        if !names.insert(joint.name.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "duplicate joint name '{}'",
                joint.name
            )));
        }

        match (joint.is_virtual, joint.id) {
            (true, Some(id)) => {
                return Err(ConfigError::ValidationError(format!(
                    "virtual joint '{}' must not have a device id (got {})",
                    joint.name, id
                )));
            }
            (false, None) => {
                return Err(ConfigError::ValidationError(format!(
                    "joint '{}' has no device id",
                    joint.name
                )));
            }
            (false, Some(id)) => {
                if id > MAX_DEVICE_ID {
                    return Err(ConfigError::ValidationError(format!(
                        "joint '{}' device id {} out of range (max {})",
                        joint.name, id, MAX_DEVICE_ID
                    )));
                }
                if !ids.insert(id) {
                    return Err(ConfigError::ValidationError(format!(
                        "device id {} used by more than one joint",
                        id
                    )));
                }
            }
            (true, None) => {}
        }

        if let Some(limit) = joint.current_limit
            && !(limit.is_finite() && limit > 0.0)
        {
            return Err(ConfigError::ValidationError(format!(
                "joint '{}' current_limit must be finite and positive (got {})",
                joint.name, limit
            )));
        }
    }

    Ok(())
}

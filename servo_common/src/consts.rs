//! System-wide constants for the servo workspace.
//!
//! Single source of truth for numeric limits and default paths.
//! Imported by all crates; not duplicated elsewhere.

/// Maximum number of joints (device-backed plus virtual) per interface.
pub const MAX_JOINTS: usize = 64;

/// Highest device id addressable on the bus (0xFD is reserved, 0xFE is broadcast).
pub const MAX_DEVICE_ID: u8 = 0xFC;

/// Broadcast device id.
pub const BROADCAST_ID: u8 = 0xFE;

/// Default runner cycle time in microseconds (100 Hz).
pub const CYCLE_TIME_US: u32 = 10_000;

/// Default serial device.
pub const DEFAULT_USB_PORT: &str = "/dev/ttyUSB0";

/// Default baud rate.
pub const DEFAULT_BAUD_RATE: u32 = 57_600;

/// Default transport timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 50;

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/servo/servo.toml";

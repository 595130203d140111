//! Configuration loading traits and types.
//!
//! This module provides the standard way to load the TOML configuration of
//! a servo interface: a `[shared]` table, a `[hardware]` table and one
//! `[[joints]]` entry per logical joint.
//!
//! # Usage
//!
//! ```rust,no_run
//! use servo_common::config::{load_system_config, ConfigError};
//! use std::path::Path;
//!
//! fn main() -> Result<(), ConfigError> {
//!     let config = load_system_config(Path::new("servo.toml"))?;
//!     println!("Service: {} ({} joints)", config.shared.service_name, config.joints.len());
//!     Ok(())
//! }
//! ```

use crate::bus::config::{HardwareConfig, JointConfig, validate_joints};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Error type for configuration loading operations.
///
/// This enum represents all possible errors that can occur when loading
/// or validating configuration files.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// Configuration file not found at specified path.
    #[error("Configuration file not found")]
    FileNotFound,

    /// TOML parsing failed.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Semantic validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

/// Log level for application logging.
///
/// Uses lowercase serde values for TOML compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Most verbose, detailed tracing information.
    Trace,
    /// Debug information useful during development.
    Debug,
    /// General information about application operation.
    #[default]
    Info,
    /// Warning messages for potentially problematic situations.
    Warn,
    /// Error messages for serious problems.
    Error,
}

impl LogLevel {
    /// Directive string understood by `tracing_subscriber::EnvFilter`.
    pub const fn as_directive(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Common configuration fields shared across all servo applications.
///
/// # TOML Example
///
/// ```toml
/// [shared]
/// log_level = "debug"
/// service_name = "arm-left"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedConfig {
    /// Logging verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Application instance identifier.
    pub service_name: String,
}

impl SharedConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if `service_name` is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_name.is_empty() {
            return Err(ConfigError::ValidationError(
                "service_name cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Trait for loading configuration from TOML files.
///
/// # Contract
///
/// - Returns `ConfigError::FileNotFound` if the file does not exist
/// - Returns `ConfigError::ParseError` if TOML syntax is invalid
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    /// Load configuration from a TOML file.
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound
            } else {
                ConfigError::ParseError(e.to_string())
            }
        })?;

        Self::from_toml(&content)
    }

    /// Parse configuration from an in-memory TOML string.
    fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

// Blanket implementation for all types that implement DeserializeOwned.
impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}

/// Complete configuration of one servo interface.
///
/// # TOML Example
///
/// ```toml
/// [shared]
/// service_name = "arm"
///
/// [hardware]
/// usb_port = "/dev/ttyUSB0"
/// baud_rate = 1000000
///
/// [[joints]]
/// name = "joint1"
/// id = 1
///
/// [[joints]]
/// name = "gripper"
/// id = 5
/// current_limit = 0.25
///
/// [[joints]]
/// name = "tool_yaw"
/// is_virtual = true
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SystemConfig {
    /// Shared service settings.
    pub shared: SharedConfig,

    /// Transport and runner settings.
    #[serde(default)]
    pub hardware: HardwareConfig,

    /// Joints in export order.
    #[serde(default)]
    pub joints: Vec<JointConfig>,
}

impl SystemConfig {
    /// Validate every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;
        self.hardware.validate()?;
        validate_joints(&self.joints)
    }
}

/// Load and validate a [`SystemConfig`] from a TOML file.
pub fn load_system_config(path: &Path) -> Result<SystemConfig, ConfigError> {
    let config = SystemConfig::load(path)?;
    config.validate()?;
    Ok(config)
}

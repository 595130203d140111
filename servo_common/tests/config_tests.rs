//! Configuration loading tests.
//!
//! Tests for `load_system_config()`: section defaults, unknown field
//! rejection, joint validation and role resolution of a loaded file.

use servo_common::bus::config::JointRole;
use servo_common::bus::consts::DEFAULT_GRIPPER_CURRENT_LIMIT;
use servo_common::config::{load_system_config, ConfigError};
use servo_common::consts::{DEFAULT_BAUD_RATE, DEFAULT_USB_PORT};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Write `content` as servo.toml in `dir` and return its path.
fn write_config(dir: &Path, content: &str) -> PathBuf {
    let path = dir.join("servo.toml");
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_minimal_config_uses_defaults() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        dir.path(),
        r#"
[shared]
service_name = "arm"
"#,
    );

    let config = load_system_config(&path).unwrap();
    assert_eq!(config.hardware.usb_port, DEFAULT_USB_PORT);
    assert_eq!(config.hardware.baud_rate, DEFAULT_BAUD_RATE);
    assert_eq!(config.hardware.driver, "protocol2");
    assert!(config.joints.is_empty());
}

#[test]
fn test_full_config_resolves_roles() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        dir.path(),
        r#"
[shared]
service_name = "arm"

[hardware]
usb_port = "/dev/ttyUSB1"
baud_rate = 1000000
torque_off = true

[[joints]]
name = "joint1"
id = 1

[[joints]]
name = "joint2"
id = 2

[[joints]]
name = "gripper"
id = 5

[[joints]]
name = "tool_yaw"
is_virtual = true
"#,
    );

    let config = load_system_config(&path).unwrap();
    assert!(config.hardware.torque_off);

    let roles: Vec<JointRole> = config.joints.iter().map(|j| j.role().unwrap()).collect();
    assert_eq!(
        roles,
        vec![
            JointRole::Physical { id: 1 },
            JointRole::Physical { id: 2 },
            JointRole::Gripper {
                id: 5,
                current_limit: DEFAULT_GRIPPER_CURRENT_LIMIT
            },
            JointRole::Virtual,
        ]
    );
}

#[test]
fn test_unknown_field_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        dir.path(),
        r#"
[shared]
service_name = "arm"

[hardware]
usb_prot = "/dev/ttyUSB0"
"#,
    );

    assert!(matches!(
        load_system_config(&path),
        Err(ConfigError::ParseError(_))
    ));
}

#[test]
fn test_duplicate_device_id_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        dir.path(),
        r#"
[shared]
service_name = "arm"

[[joints]]
name = "joint1"
id = 1

[[joints]]
name = "joint2"
id = 1
"#,
    );

    match load_system_config(&path) {
        Err(ConfigError::ValidationError(msg)) => assert!(msg.contains("device id 1")),
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[test]
fn test_zero_cycle_time_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        dir.path(),
        r#"
[shared]
service_name = "arm"

[hardware]
cycle_time_us = 0
"#,
    );

    assert!(matches!(
        load_system_config(&path),
        Err(ConfigError::ValidationError(_))
    ));
}

#[test]
fn test_missing_file() {
    assert_eq!(
        load_system_config(Path::new("/nonexistent/servo.toml")).unwrap_err(),
        ConfigError::FileNotFound
    );
}

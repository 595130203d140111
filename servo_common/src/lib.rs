//! Servo Common Library
//!
//! This crate provides shared constants, configuration loading and the
//! actuator bus contract for all servo workspace crates.
//!
//! # Module Structure
//!
//! - [`bus`] - Actuator bus trait, register catalog and joint configuration
//! - [`config`] - Configuration loading traits and types
//! - [`consts`] - System-wide limits and defaults
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use servo_common::prelude::*;
//! use servo_common::bus::control_table::lookup_model;
//! ```

pub mod bus;
pub mod config;
pub mod consts;
pub mod prelude;

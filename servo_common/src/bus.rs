//! Actuator bus contract, register catalog and interface configuration.
//!
//! This module contains everything the hardware interface needs to know
//! about the servo bus without depending on a concrete transport.

pub mod config;
pub mod consts;
pub mod control_table;
pub mod driver;
pub mod types;

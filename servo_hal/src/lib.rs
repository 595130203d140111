//! # Servo HAL Library
//!
//! Multi-servo hardware interface with control-mode arbitration and
//! pluggable bus drivers.
//!
//! Drivers implement the `ActuatorBus` trait defined in
//! `servo_common::bus::driver`; everything above that trait is independent
//! of the wire format.
//!
//! # Module Structure
//!
//! - [`core`] - ServoCore struct, cycle loop management
//! - [`hardware`] - Lifecycle and bring-up of one servo chain
//! - [`cycle`] - Cyclic `read()` / `write()`
//! - [`mode`] - Control-mode and torque state machine
//! - [`layout`] - Register items and batched handlers resolved at bring-up
//! - [`joint`] - Joint model and exported interfaces
//! - [`error`] - Hardware interface errors
//! - [`driver_registry`] - Driver factory registration
//! - [`drivers`] - Bus driver implementations
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                     servo_hal (single crate)                     │
//! │  ┌─────────────┐    ┌──────────────┐    ┌─────────────────────┐  │
//! │  │  Controller │◄──►│ ServoHardware│◄──►│  Driver Registry    │  │
//! │  │  (commands) │    │  read/write  │    │                     │  │
//! │  └─────────────┘    └──────┬───────┘    └─────────────────────┘  │
//! │                            │  ModeMachine, BusLayout             │
//! │                            ▼                                     │
//! │                   ┌────────────────┐                             │
//! │                   │  ActuatorBus   │ protocol2 / simulation /    │
//! │                   │  trait         │ dummy                       │
//! │                   └────────────────┘                             │
//! └──────────────────────────────────────────────────────────────────┘
//! ```

#![deny(warnings)]
#![deny(missing_docs)]

pub mod core;
pub mod cycle;
pub mod driver_registry;
pub mod drivers;
pub mod error;
pub mod hardware;
pub mod joint;
pub mod layout;
pub mod mode;

// Re-export key types for convenience
pub use crate::core::{ServoCore, TimingStats};
pub use crate::driver_registry::DriverRegistry;
pub use crate::error::HardwareError;
pub use crate::hardware::{Lifecycle, ServoHardware};
pub use crate::joint::{JointSet, JointValues};

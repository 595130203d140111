//! Hardware interface lifecycle.
//!
//! `ServoHardware` owns the bus, the joint model, the mode machine and the
//! cached register layout of one servo chain.
//!
//! # Lifecycle
//!
//! ```text
//! Unconfigured ──configure()──► Configured ──start()──► Active
//!       ▲                                                  │
//!       └──────────────── Inactive ◄──deactivate()─────────┘
//! ```
//!
//! `activate()` runs `configure()` then `start()`. The cycle entry points
//! [`read()`](ServoHardware::read) and [`write()`](ServoHardware::write)
//! live in [`crate::cycle`].

use crate::error::HardwareError;
use crate::joint::{InterfaceDescriptor, Joint, JointSet, JointValues};
use crate::layout::BusLayout;
use crate::mode::ModeMachine;
use servo_common::bus::config::{HardwareConfig, JointConfig};
use servo_common::bus::driver::ActuatorBus;
use servo_common::bus::types::ControlMode;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Lifecycle state of a hardware interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Constructed, no bus traffic yet.
    Unconfigured,
    /// Bring-up done, cycles not started.
    Configured,
    /// Cycling.
    Active,
    /// Deactivated, transport released.
    Inactive,
}

/// Scratch buffers for raw register values, one slot per device-backed joint.
#[derive(Debug, Clone, Default)]
pub(crate) struct RawBuffers {
    pub(crate) position: Vec<i32>,
    pub(crate) velocity: Vec<i32>,
    pub(crate) current: Vec<i32>,
}

impl RawBuffers {
    fn new(len: usize) -> Self {
        Self {
            position: vec![0; len],
            velocity: vec![0; len],
            current: vec![0; len],
        }
    }
}

/// Multi-servo hardware interface over one actuator bus.
pub struct ServoHardware<B: ActuatorBus> {
    pub(crate) bus: B,
    pub(crate) config: HardwareConfig,
    pub(crate) joints: JointSet,
    pub(crate) modes: ModeMachine,
    pub(crate) layout: Option<BusLayout>,
    pub(crate) raw: RawBuffers,
    lifecycle: Lifecycle,
}

impl<B: ActuatorBus> ServoHardware<B> {
    /// Resolve joint roles; no bus traffic.
    ///
    /// # Errors
    /// Returns `HardwareError::Config` if the joint list or hardware section
    /// is invalid.
    pub fn new(
        bus: B,
        config: HardwareConfig,
        joints: &[JointConfig],
    ) -> Result<Self, HardwareError> {
        config.validate()?;
        let joints = JointSet::from_config(joints)?;

        for joint in joints.iter() {
            match joint.device_id() {
                Some(id) if joints.gripper().is_some_and(|g| g.id == id) => {
                    info!("Joint '{}': id {} (gripper)", joint.name, id)
                }
                Some(id) => info!("Joint '{}': id {}", joint.name, id),
                None => info!("Joint '{}': virtual", joint.name),
            }
        }

        Ok(Self {
            bus,
            config,
            raw: RawBuffers::new(joints.physical().len()),
            joints,
            modes: ModeMachine::new(),
            layout: None,
            lifecycle: Lifecycle::Unconfigured,
        })
    }

    /// Bring-up followed by the first cycle.
    pub fn activate(&mut self) -> Result<(), HardwareError> {
        self.configure()?;
        self.start()
    }

    /// Bring-up: open the transport, ping every device, force torque off,
    /// force position mode, optionally enable torque, resolve registers and
    /// register handlers.
    ///
    /// In dummy mode nothing past joint resolution is done.
    pub fn configure(&mut self) -> Result<(), HardwareError> {
        self.modes = ModeMachine::new();
        self.layout = None;

        if self.config.use_dummy {
            info!("Dummy mode: no transport, commands loop back");
            self.lifecycle = Lifecycle::Configured;
            return Ok(());
        }

        info!(
            "Opening {} bus on {} @ {} baud",
            self.bus.name(),
            self.config.usb_port,
            self.config.baud_rate
        );
        self.bus
            .set_timeout(Duration::from_millis(self.config.timeout_ms));
        self.bus
            .init(&self.config.usb_port, self.config.baud_rate)
            .map_err(|e| HardwareError::TransportInit(e.to_string()))?;

        for &id in self.joints.ids() {
            let model = self
                .bus
                .ping(id)
                .map_err(|e| HardwareError::DeviceNotFound {
                    id,
                    reason: e.to_string(),
                })?;
            info!("Device {} answered (model {})", id, model);
        }

        self.modes.force_torque_off(&mut self.bus, &self.joints)?;
        self.modes
            .set_mode(&mut self.bus, &mut self.joints, ControlMode::Position, true)?;
        if self.config.torque_off {
            info!("Torque left off at startup");
        } else {
            self.modes
                .enable_torque(&mut self.bus, &mut self.joints, true)?;
        }

        self.layout = match self.joints.ids().first() {
            Some(&id) => Some(BusLayout::resolve(&mut self.bus, id)?),
            None => {
                warn!("No device-backed joints; bus layout not resolved");
                None
            }
        };

        self.lifecycle = Lifecycle::Configured;
        info!("Hardware configured ({} joints)", self.joints.len());
        Ok(())
    }

    /// Seed unknown states, then run `read()`, `reset_command()`, `write()`.
    pub fn start(&mut self) -> Result<(), HardwareError> {
        if self.lifecycle != Lifecycle::Configured {
            return Err(HardwareError::NotConfigured);
        }

        self.joints.seed_unknown_states(self.config.use_dummy);

        self.read_cycle()?;
        self.reset_command();
        self.write_cycle()?;

        self.lifecycle = Lifecycle::Active;
        info!("Hardware started");
        Ok(())
    }

    /// Stop cycling and release the transport.
    pub fn deactivate(&mut self) -> Result<(), HardwareError> {
        if self.lifecycle == Lifecycle::Inactive {
            debug!("Already inactive");
            return Ok(());
        }
        self.lifecycle = Lifecycle::Inactive;
        if !self.config.use_dummy {
            if let Err(e) = self.bus.shutdown() {
                warn!("Bus shutdown failed: {}", e);
            }
        }
        info!("Hardware deactivated");
        Ok(())
    }

    /// Hold every joint at its current position.
    pub fn reset_command(&mut self) {
        self.joints.reset_command();
    }

    /// Enable or disable torque on every device (edge-triggered).
    ///
    /// No-op in dummy mode.
    pub fn enable_torque(&mut self, enabled: bool) -> Result<(), HardwareError> {
        self.ensure_configured()?;
        if self.config.use_dummy {
            return Ok(());
        }
        self.modes
            .enable_torque(&mut self.bus, &mut self.joints, enabled)
    }

    /// Switch the group control mode.
    ///
    /// No-op in dummy mode.
    pub fn set_control_mode(&mut self, mode: ControlMode, force: bool) -> Result<(), HardwareError> {
        self.ensure_configured()?;
        if self.config.use_dummy {
            return Ok(());
        }
        self.modes
            .set_mode(&mut self.bus, &mut self.joints, mode, force)
    }

    // ─── Accessors ──────────────────────────────────────────────────

    /// Current lifecycle state.
    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    /// True when operating without a transport.
    pub fn is_dummy(&self) -> bool {
        self.config.use_dummy
    }

    /// The joint model.
    pub fn joints(&self) -> &JointSet {
        &self.joints
    }

    /// State of a joint by name.
    pub fn state(&self, name: &str) -> Option<JointValues> {
        self.joints.get(name).map(|j| j.state)
    }

    /// Command of a joint by name.
    pub fn command(&self, name: &str) -> Option<JointValues> {
        self.joints.get(name).map(|j| j.command)
    }

    /// Writable command slot of a joint by name.
    pub fn command_mut(&mut self, name: &str) -> Option<&mut JointValues> {
        self.joints.get_mut(name).map(|j| &mut j.command)
    }

    /// Replace a joint's command.
    pub fn set_command(&mut self, name: &str, command: JointValues) -> Result<(), HardwareError> {
        let joint: &mut Joint = self
            .joints
            .get_mut(name)
            .ok_or_else(|| HardwareError::UnknownJoint(name.to_string()))?;
        joint.command = command;
        Ok(())
    }

    /// Mode of the main group.
    pub fn control_mode(&self) -> ControlMode {
        self.modes.group_mode()
    }

    /// Mode of the gripper.
    pub fn gripper_mode(&self) -> ControlMode {
        self.modes.gripper_mode()
    }

    /// Tracked torque flag.
    pub fn torque_enabled(&self) -> bool {
        self.modes.torque_enabled()
    }

    /// Register layout, once configured with device-backed joints.
    pub fn layout(&self) -> Option<&BusLayout> {
        self.layout.as_ref()
    }

    /// Exported state interfaces.
    pub fn state_interfaces(&self) -> Vec<InterfaceDescriptor> {
        self.joints.state_interfaces()
    }

    /// Exported command interfaces.
    pub fn command_interfaces(&self) -> Vec<InterfaceDescriptor> {
        self.joints.command_interfaces()
    }

    /// The underlying bus.
    pub fn bus(&self) -> &B {
        &self.bus
    }

    /// Mutable access to the underlying bus.
    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    pub(crate) fn ensure_active(&self) -> Result<(), HardwareError> {
        match self.lifecycle {
            Lifecycle::Active => Ok(()),
            _ => Err(HardwareError::NotActive),
        }
    }

    fn ensure_configured(&self) -> Result<(), HardwareError> {
        match self.lifecycle {
            Lifecycle::Configured | Lifecycle::Active => Ok(()),
            _ => Err(HardwareError::NotConfigured),
        }
    }
}

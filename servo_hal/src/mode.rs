//! Control-mode state machine and torque-safety protocol.
//!
//! Two independent machines share one torque flag:
//! - the main group: `Unset -> {Position, Velocity}`
//! - the gripper: `Unset -> CurrentBasedPosition`
//!
//! Every mode-set bus call is issued with torque disabled. If torque was
//! enabled before a transition it is re-enabled afterwards, which also
//! resets commands to the held position.

use crate::error::HardwareError;
use crate::joint::JointSet;
use servo_common::bus::consts::GOAL_CURRENT_ITEM;
use servo_common::bus::driver::{ActuatorBus, BusError};
use servo_common::bus::types::{ControlMode, DeviceId};
use tracing::{debug, info, warn};

/// Tracked group mode, gripper mode and torque flag of one bus session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ModeMachine {
    group: ControlMode,
    gripper: ControlMode,
    torque_enabled: bool,
}

impl ModeMachine {
    /// Fresh session: both modes unset, torque assumed off.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mode of the main group.
    pub fn group_mode(&self) -> ControlMode {
        self.group
    }

    /// Mode of the gripper device.
    pub fn gripper_mode(&self) -> ControlMode {
        self.gripper
    }

    /// Tracked torque flag.
    pub fn torque_enabled(&self) -> bool {
        self.torque_enabled
    }

    /// Switch the group to `target`, then bring the gripper into
    /// current-based position mode if it is not there yet.
    ///
    /// Without `force` each machine only acts when its tracked mode differs.
    /// A per-device failure aborts immediately with the tracked mode left
    /// unchanged (torque stays off if it had been bracketed).
    pub fn set_mode<B: ActuatorBus + ?Sized>(
        &mut self,
        bus: &mut B,
        joints: &mut JointSet,
        target: ControlMode,
        force: bool,
    ) -> Result<(), HardwareError> {
        if !matches!(target, ControlMode::Position | ControlMode::Velocity) {
            return Err(HardwareError::UnsupportedMode(target));
        }

        if force || self.group != target {
            let restore = self.bracket_torque(bus, joints)?;
            for &id in joints.group_ids() {
                apply_mode(bus, id, target).map_err(|e| HardwareError::ModeTransition {
                    mode: target,
                    reason: format!("id {id}: {e}"),
                })?;
            }
            self.group = target;
            info!("Group switched to {} control", target);
            if restore {
                self.enable_torque(bus, joints, true)?;
            }
        }

        let gripper_pending = force || self.gripper != ControlMode::CurrentBasedPosition;
        if let Some(gripper) = joints.gripper().filter(|_| gripper_pending) {
            let mode = ControlMode::CurrentBasedPosition;
            let fail = |e: BusError| HardwareError::ModeTransition {
                mode,
                reason: format!("gripper id {}: {e}", gripper.id),
            };

            let restore = self.bracket_torque(bus, joints)?;
            bus.set_current_based_position_mode(gripper.id).map_err(fail)?;
            let current = bus.current_to_value(gripper.id, gripper.current_limit);
            bus.write_item(gripper.id, GOAL_CURRENT_ITEM, current)
                .map_err(fail)?;
            self.gripper = mode;
            info!(
                "Gripper {} in {} control (limit {:.3} A)",
                gripper.id, mode, gripper.current_limit
            );
            if restore {
                self.enable_torque(bus, joints, true)?;
            }
        }

        Ok(())
    }

    /// Enable or disable torque on every device-backed joint.
    ///
    /// Acts only on an edge of the tracked flag. The flag changes only after
    /// every device accepted the call; a rising edge resets commands.
    pub fn enable_torque<B: ActuatorBus + ?Sized>(
        &mut self,
        bus: &mut B,
        joints: &mut JointSet,
        enabled: bool,
    ) -> Result<(), HardwareError> {
        if enabled == self.torque_enabled {
            debug!("Torque already {}", if enabled { "on" } else { "off" });
            return Ok(());
        }

        if enabled {
            let ids = joints.ids();
            for (n, &id) in ids.iter().enumerate() {
                if let Err(e) = bus.torque_on(id) {
                    // Devices already energized must not outlive the unset flag.
                    for &done in &ids[..n] {
                        if let Err(off) = bus.torque_off(done) {
                            warn!("Torque rollback failed on id {}: {}", done, off);
                        }
                    }
                    return Err(HardwareError::TorqueTransition(format!("on, id {id}: {e}")));
                }
            }
            self.torque_enabled = true;
            joints.reset_command();
            info!("Torque enabled");
        } else {
            self.torque_off_all(bus, joints)?;
            info!("Torque disabled");
        }
        Ok(())
    }

    /// Disable torque on every device regardless of the tracked flag.
    ///
    /// Used at bring-up, where a previous session may have left torque on.
    pub fn force_torque_off<B: ActuatorBus + ?Sized>(
        &mut self,
        bus: &mut B,
        joints: &JointSet,
    ) -> Result<(), HardwareError> {
        self.torque_off_all(bus, joints)?;
        info!("Torque forced off on {} devices", joints.ids().len());
        Ok(())
    }

    fn torque_off_all<B: ActuatorBus + ?Sized>(
        &mut self,
        bus: &mut B,
        joints: &JointSet,
    ) -> Result<(), HardwareError> {
        for &id in joints.ids() {
            bus.torque_off(id)
                .map_err(|e| HardwareError::TorqueTransition(format!("off, id {id}: {e}")))?;
        }
        self.torque_enabled = false;
        Ok(())
    }

    /// Disable torque if on; returns whether it must be restored.
    fn bracket_torque<B: ActuatorBus + ?Sized>(
        &mut self,
        bus: &mut B,
        joints: &mut JointSet,
    ) -> Result<bool, HardwareError> {
        let was_enabled = self.torque_enabled;
        if was_enabled {
            self.enable_torque(bus, joints, false)?;
        }
        Ok(was_enabled)
    }
}

fn apply_mode<B: ActuatorBus + ?Sized>(
    bus: &mut B,
    id: DeviceId,
    mode: ControlMode,
) -> Result<(), BusError> {
    match mode {
        ControlMode::Position => bus.set_position_mode(id),
        ControlMode::Velocity => bus.set_velocity_mode(id),
        ControlMode::CurrentBasedPosition => bus.set_current_based_position_mode(id),
        ControlMode::Unset => Err(BusError::Unsupported(format!("id {id}: unset mode"))),
    }
}

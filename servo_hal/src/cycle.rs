//! Cyclic read/write engine.
//!
//! `read()` pulls present registers of every device-backed joint with one
//! batched read and three extractions. Failures there are logged and the
//! affected state fields stay stale.
//!
//! `write()` arbitrates the group mode once per cycle:
//! 1. any nonzero commanded velocity: velocity mode, batched velocity write
//! 2. else any nonzero commanded effort: `EffortUnimplemented`, no bus I/O
//! 3. else: position mode, batched position write
//!
//! The rule is group-wide. One joint's velocity command puts every joint
//! in velocity mode for that cycle.

use crate::error::HardwareError;
use crate::hardware::ServoHardware;
use servo_common::bus::driver::ActuatorBus;
use servo_common::bus::types::{ControlItem, ControlMode, DeviceId, HandlerId};
use tracing::{error, trace, warn};

/// NaN counts as "no command".
#[inline]
fn is_nonzero(value: f64) -> bool {
    !value.is_nan() && value != 0.0
}

#[inline]
fn or_zero(value: f64) -> f64 {
    if value.is_nan() { 0.0 } else { value }
}

impl<B: ActuatorBus> ServoHardware<B> {
    /// Refresh joint states from the devices.
    ///
    /// # Errors
    /// Returns `HardwareError::NotActive` outside the active state. Bus
    /// failures are never returned.
    pub fn read(&mut self) -> Result<(), HardwareError> {
        self.ensure_active()?;
        self.read_cycle()
    }

    /// Apply joint commands to the devices.
    ///
    /// # Errors
    /// - `HardwareError::NotActive` outside the active state
    /// - `HardwareError::EffortUnimplemented` for an effort-only command
    /// - mode or torque transition errors
    pub fn write(&mut self) -> Result<(), HardwareError> {
        self.ensure_active()?;
        self.write_cycle()
    }

    pub(crate) fn read_cycle(&mut self) -> Result<(), HardwareError> {
        if self.config.use_dummy {
            return Ok(());
        }
        let Some(layout) = self.layout else {
            return Ok(());
        };

        let ids = self.joints.ids();
        let handler = layout.present_handler;

        if let Err(e) = self.bus.batched_read(handler, ids) {
            error!("Batched read failed: {}", e);
        }

        let currents = extract(
            &self.bus,
            handler,
            ids,
            layout.present_current,
            &mut self.raw.current,
        );
        let velocities = extract(
            &self.bus,
            handler,
            ids,
            layout.present_velocity,
            &mut self.raw.velocity,
        );
        let positions = extract(
            &self.bus,
            handler,
            ids,
            layout.present_position,
            &mut self.raw.position,
        );

        let bus = &self.bus;
        let raw = &self.raw;
        for (i, joint) in self.joints.physical_mut().iter_mut().enumerate() {
            let Some(id) = joint.device_id() else {
                continue;
            };
            if positions {
                joint.state.position = bus.value_to_radian(id, raw.position[i]);
            }
            if velocities {
                joint.state.velocity = bus.value_to_velocity(id, raw.velocity[i]);
            }
            if currents {
                joint.state.effort = bus.value_to_current(id, raw.current[i]);
            }
        }

        trace!(
            "read: positions={:?} velocities={:?} currents={:?}",
            self.raw.position, self.raw.velocity, self.raw.current
        );
        Ok(())
    }

    pub(crate) fn write_cycle(&mut self) -> Result<(), HardwareError> {
        self.joints.loop_back_virtual();

        if self.config.use_dummy {
            for joint in self.joints.physical_mut() {
                joint.state.position = joint.command.position;
            }
            return Ok(());
        }
        let Some(layout) = self.layout else {
            return Ok(());
        };

        let physical = self.joints.physical();
        let wants_velocity = physical.iter().any(|j| is_nonzero(j.command.velocity));
        let wants_effort = physical.iter().any(|j| is_nonzero(j.command.effort));

        if wants_velocity {
            self.modes.set_mode(
                &mut self.bus,
                &mut self.joints,
                ControlMode::Velocity,
                false,
            )?;

            let bus = &self.bus;
            for ((raw, joint), &id) in self
                .raw
                .velocity
                .iter_mut()
                .zip(self.joints.physical())
                .zip(self.joints.ids())
            {
                *raw = bus.velocity_to_value(id, or_zero(joint.command.velocity));
            }
            self.send_goals(layout.goal_velocity_handler, "velocity", RawKind::Velocity);
            return Ok(());
        }

        if wants_effort {
            error!("Effort control is not implemented");
            return Err(HardwareError::EffortUnimplemented);
        }

        self.modes.set_mode(
            &mut self.bus,
            &mut self.joints,
            ControlMode::Position,
            false,
        )?;

        if let Some(joint) = self
            .joints
            .physical()
            .iter()
            .find(|j| j.command.position.is_nan())
        {
            warn!(
                "Position command of '{}' unknown, skipping position write",
                joint.name
            );
            return Ok(());
        }

        let bus = &self.bus;
        for ((raw, joint), &id) in self
            .raw
            .position
            .iter_mut()
            .zip(self.joints.physical())
            .zip(self.joints.ids())
        {
            *raw = bus.radian_to_value(id, joint.command.position);
        }
        self.send_goals(layout.goal_position_handler, "position", RawKind::Position);
        Ok(())
    }

    /// Failures are logged; the cycle still succeeds.
    fn send_goals(&mut self, handler: HandlerId, what: &str, kind: RawKind) {
        let values = match kind {
            RawKind::Position => &self.raw.position,
            RawKind::Velocity => &self.raw.velocity,
        };
        trace!("write {}: {:?}", what, values);
        if let Err(e) = self.bus.batched_write(handler, self.joints.ids(), values) {
            error!("Batched {} write failed: {}", what, e);
        }
    }
}

#[derive(Clone, Copy)]
enum RawKind {
    Position,
    Velocity,
}

/// Extract one item for every id; false (logged) on failure.
fn extract<B: ActuatorBus + ?Sized>(
    bus: &B,
    handler: HandlerId,
    ids: &[DeviceId],
    item: ControlItem,
    out: &mut [i32],
) -> bool {
    match bus.get_batched_value(handler, ids, item, out) {
        Ok(()) => true,
        Err(e) => {
            error!("Reading {} failed: {}", item.name, e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::simulation::{BusEvent, SimOp, SimulatedBus};
    use crate::joint::JointValues;
    use servo_common::bus::config::{HardwareConfig, JointConfig};
    use servo_common::bus::consts::PRESENT_VELOCITY_ITEM;
    use servo_common::bus::control_table::{MX_28, XL430_W250, XM430_W350};

    fn active(bus: SimulatedBus, joints: &[JointConfig]) -> ServoHardware<SimulatedBus> {
        let mut hw = ServoHardware::new(bus, HardwareConfig::default(), joints).unwrap();
        hw.activate().unwrap();
        hw.bus_mut().clear_journal();
        hw
    }

    fn two_joints() -> ServoHardware<SimulatedBus> {
        active(
            SimulatedBus::new()
                .with_servo(1, &XM430_W350)
                .with_servo(2, &XM430_W350),
            &[
                JointConfig::physical("joint1", 1),
                JointConfig::physical("joint2", 2),
            ],
        )
    }

    fn batched_writes(hw: &ServoHardware<SimulatedBus>) -> Vec<(HandlerId, Vec<i32>)> {
        hw.bus()
            .journal()
            .iter()
            .filter_map(|e| match e {
                BusEvent::BatchedWrite {
                    handler, values, ..
                } => Some((*handler, values.clone())),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn read_converts_present_values() {
        let mut hw = two_joints();
        hw.bus_mut().place(1, 0.5);
        hw.bus_mut().place(2, -0.25);
        hw.read().unwrap();

        let s1 = hw.state("joint1").unwrap();
        let s2 = hw.state("joint2").unwrap();
        assert!((s1.position - 0.5).abs() < 2e-3);
        assert!((s2.position + 0.25).abs() < 2e-3);
        assert_eq!(s1.velocity, 0.0);
        assert_eq!(s1.effort, 0.0);
    }

    #[test]
    fn transient_read_failure_keeps_stale_state() {
        let mut hw = two_joints();
        hw.bus_mut().place(1, 0.5);
        hw.read().unwrap();
        let before = hw.state("joint1").unwrap();

        hw.bus_mut().place(1, 1.0);
        hw.bus_mut().fail(SimOp::BatchedRead, None);
        hw.bus_mut().fail(SimOp::GetBatchedValue, None);
        assert!(hw.read().is_ok());
        assert_eq!(hw.state("joint1"), Some(before));

        hw.bus_mut().clear_failures();
        hw.read().unwrap();
        assert!((hw.state("joint1").unwrap().position - 1.0).abs() < 2e-3);
    }

    #[test]
    fn failed_extraction_leaves_only_that_field_stale() {
        let mut hw = two_joints();
        hw.joints.physical_mut()[0].state = JointValues {
            position: 9.0,
            velocity: 7.0,
            effort: 5.0,
        };
        hw.bus_mut().place(1, 0.5);
        hw.bus_mut().fail_item(PRESENT_VELOCITY_ITEM);

        assert!(hw.read().is_ok());
        let s1 = hw.state("joint1").unwrap();
        assert!((s1.position - 0.5).abs() < 2e-3);
        assert_eq!(s1.effort, 0.0);
        assert_eq!(s1.velocity, 7.0);

        hw.bus_mut().clear_failures();
        hw.read().unwrap();
        assert_eq!(hw.state("joint1").unwrap().velocity, 0.0);
    }

    #[test]
    fn position_write_holds_mode() {
        let mut hw = two_joints();
        hw.set_command("joint1", JointValues::at(0.0)).unwrap();
        hw.set_command("joint2", JointValues::at(std::f64::consts::FRAC_PI_2))
            .unwrap();
        hw.write().unwrap();

        let writes = batched_writes(&hw);
        let layout = *hw.layout().unwrap();
        assert_eq!(writes, vec![(layout.goal_position_handler, vec![2048, 3072])]);
        assert_eq!(
            hw.bus().count(|e| matches!(e, BusEvent::SetMode { .. })),
            0
        );
    }

    #[test]
    fn nan_position_skips_write() {
        let mut hw = two_joints();
        hw.set_command("joint2", JointValues::UNKNOWN).unwrap();
        hw.set_command("joint1", JointValues::at(0.1)).unwrap();
        assert!(hw.write().is_ok());
        assert!(batched_writes(&hw).is_empty());
    }

    #[test]
    fn nan_velocity_is_not_a_velocity_command() {
        let mut hw = two_joints();
        hw.set_command(
            "joint1",
            JointValues {
                position: 0.0,
                velocity: f64::NAN,
                effort: f64::NAN,
            },
        )
        .unwrap();
        hw.set_command("joint2", JointValues::at(0.0)).unwrap();
        hw.write().unwrap();
        assert_eq!(hw.control_mode(), ControlMode::Position);
    }

    #[test]
    fn effort_rejected_without_bus_traffic() {
        let mut hw = two_joints();
        hw.set_command(
            "joint1",
            JointValues {
                position: 0.0,
                velocity: 0.0,
                effort: 0.2,
            },
        )
        .unwrap();
        assert_eq!(hw.write(), Err(HardwareError::EffortUnimplemented));
        assert!(hw.bus().journal().is_empty());
        assert_eq!(hw.control_mode(), ControlMode::Position);
    }

    #[test]
    fn velocity_takes_priority_over_effort() {
        let mut hw = two_joints();
        hw.set_command(
            "joint1",
            JointValues {
                position: 0.0,
                velocity: 0.3,
                effort: 0.2,
            },
        )
        .unwrap();
        hw.write().unwrap();
        assert_eq!(hw.control_mode(), ControlMode::Velocity);
    }

    #[test]
    fn velocity_write_in_established_mode() {
        let mut hw = two_joints();
        hw.set_control_mode(ControlMode::Velocity, false).unwrap();
        hw.bus_mut().clear_journal();

        hw.set_command(
            "joint1",
            JointValues {
                position: 0.0,
                velocity: 0.5,
                effort: 0.0,
            },
        )
        .unwrap();
        hw.set_command("joint2", JointValues::at(0.2)).unwrap();
        hw.write().unwrap();

        let layout = *hw.layout().unwrap();
        let expected = hw.bus().velocity_to_value(1, 0.5);
        assert_eq!(
            batched_writes(&hw),
            vec![(layout.goal_velocity_handler, vec![expected, 0])]
        );
        assert_ne!(expected, 0);
    }

    #[test]
    fn failed_batched_write_is_tolerated() {
        let mut hw = two_joints();
        hw.bus_mut().fail(SimOp::BatchedWrite, None);
        hw.set_command("joint1", JointValues::at(0.0)).unwrap();
        hw.set_command("joint2", JointValues::at(0.0)).unwrap();
        assert!(hw.write().is_ok());
    }

    #[test]
    fn failed_mode_switch_fails_cycle() {
        let mut hw = two_joints();
        hw.bus_mut().fail(SimOp::SetMode, Some(1));
        hw.command_mut("joint1").unwrap().velocity = 0.4;
        assert!(matches!(
            hw.write(),
            Err(HardwareError::ModeTransition { .. })
        ));
        assert_eq!(hw.control_mode(), ControlMode::Position);
        assert!(batched_writes(&hw).is_empty());
    }

    #[test]
    fn virtual_joints_loop_back_even_on_error() {
        let mut hw = active(
            SimulatedBus::new().with_servo(1, &XM430_W350),
            &[
                JointConfig::physical("joint1", 1),
                JointConfig::virtual_joint("yaw"),
            ],
        );
        let cmd = JointValues {
            position: 0.3,
            velocity: -0.1,
            effort: 0.05,
        };
        hw.set_command("yaw", cmd).unwrap();
        hw.set_command(
            "joint1",
            JointValues {
                position: 0.0,
                velocity: 0.0,
                effort: 1.0,
            },
        )
        .unwrap();

        assert_eq!(hw.write(), Err(HardwareError::EffortUnimplemented));
        assert_eq!(hw.state("yaw"), Some(cmd));
    }

    #[test]
    fn virtual_only_interface_has_no_bus_cycle() {
        let mut hw = active(SimulatedBus::new(), &[JointConfig::virtual_joint("yaw")]);
        hw.set_command("yaw", JointValues::at(1.0)).unwrap();
        hw.read().unwrap();
        hw.write().unwrap();
        assert!(hw.layout().is_none());
        assert!(hw.bus().journal().is_empty());
        assert_eq!(hw.state("yaw"), Some(JointValues::at(1.0)));
    }

    #[test]
    fn load_sensing_devices_report_effort() {
        let mut hw = active(
            SimulatedBus::new().with_servo(1, &XL430_W250),
            &[JointConfig::physical("joint1", 1)],
        );
        hw.read().unwrap();
        assert_eq!(hw.state("joint1").map(|s| s.effort), Some(0.0));
    }

    #[test]
    fn legacy_velocity_write_uses_moving_speed() {
        let mut hw = active(
            SimulatedBus::new().with_servo(1, &MX_28),
            &[JointConfig::physical("joint1", 1)],
        );
        hw.set_control_mode(ControlMode::Velocity, false).unwrap();
        hw.command_mut("joint1").unwrap().velocity = -0.5;
        hw.write().unwrap();

        let raw = hw.bus().register(1, "Moving_Speed").unwrap();
        // Sign-magnitude: direction bit set for negative speeds.
        assert_ne!(raw & 0x400, 0);
        assert_eq!(hw.bus().operating_mode(1), ControlMode::Velocity);
    }
}

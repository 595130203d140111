//! Hardware interface integration tests.
//!
//! Drives `ServoHardware` over the simulated bus through its public API and
//! checks the bus traffic recorded in the journal.

use servo_common::bus::config::{HardwareConfig, JointConfig};
use servo_common::bus::control_table::{DEFAULT_MODEL, XM430_W350};
use servo_common::bus::driver::{ActuatorBus, BusError};
use servo_common::bus::types::{ControlItem, ControlMode, DeviceId, HandlerId, ModelNumber};
use servo_hal::drivers::simulation::{BusEvent, SimOp, SimulatedBus};
use servo_hal::{HardwareError, JointValues, ServoHardware};

type SimHardware = ServoHardware<SimulatedBus>;

fn arm_joints() -> Vec<JointConfig> {
    vec![
        JointConfig::physical("joint1", 1),
        JointConfig::physical("joint2", 2),
    ]
}

fn sim_bus(ids: &[DeviceId]) -> SimulatedBus {
    ids.iter()
        .fold(SimulatedBus::new(), |bus, &id| bus.with_servo(id, &XM430_W350))
}

fn activate(bus: SimulatedBus, config: HardwareConfig, joints: &[JointConfig]) -> SimHardware {
    let mut hw = ServoHardware::new(bus, config, joints).expect("valid config");
    hw.activate().expect("bring-up");
    hw.bus_mut().clear_journal();
    hw
}

fn arm() -> SimHardware {
    activate(sim_bus(&[1, 2]), HardwareConfig::default(), &arm_joints())
}

fn position_handler(hw: &SimHardware) -> HandlerId {
    hw.layout().expect("layout").goal_position_handler
}

fn velocity_handler(hw: &SimHardware) -> HandlerId {
    hw.layout().expect("layout").goal_velocity_handler
}

fn writes_to(hw: &SimHardware, handler: HandlerId) -> Vec<(Vec<DeviceId>, Vec<i32>)> {
    hw.bus()
        .journal()
        .iter()
        .filter_map(|e| match e {
            BusEvent::BatchedWrite {
                handler: h,
                ids,
                values,
            } if *h == handler => Some((ids.clone(), values.clone())),
            _ => None,
        })
        .collect()
}

fn all_writes(hw: &SimHardware) -> usize {
    hw.bus().count(|e| {
        matches!(
            e,
            BusEvent::BatchedWrite { .. } | BusEvent::WriteItem { .. }
        )
    })
}

// ─── Scenarios ──────────────────────────────────────────────────────

#[test]
fn position_cycle_scenario() {
    let mut hw = arm();
    hw.bus_mut().place(1, 0.1);
    hw.bus_mut().place(2, 0.2);

    hw.read().unwrap();
    let s1 = hw.state("joint1").unwrap();
    let s2 = hw.state("joint2").unwrap();
    assert!((s1.position - 0.1).abs() < 2e-3);
    assert!((s2.position - 0.2).abs() < 2e-3);

    hw.set_command("joint1", JointValues::at(0.1)).unwrap();
    hw.set_command("joint2", JointValues::at(0.2)).unwrap();
    hw.bus_mut().clear_journal();
    hw.write().unwrap();

    let expected = vec![
        DEFAULT_MODEL.radian_to_value(0.1),
        DEFAULT_MODEL.radian_to_value(0.2),
    ];
    assert_eq!(
        writes_to(&hw, position_handler(&hw)),
        vec![(vec![1, 2], expected)]
    );
    assert!(writes_to(&hw, velocity_handler(&hw)).is_empty());
    assert_eq!(hw.bus().count(|e| matches!(e, BusEvent::SetMode { .. })), 0);
    assert_eq!(hw.control_mode(), ControlMode::Position);
}

#[test]
fn velocity_cycle_scenario() {
    let mut hw = arm();
    assert!(hw.torque_enabled());
    hw.command_mut("joint1").unwrap().velocity = 0.5;
    hw.command_mut("joint2").unwrap().velocity = 0.0;

    hw.write().unwrap();
    assert_eq!(hw.control_mode(), ControlMode::Velocity);

    let journal = hw.bus().journal().to_vec();
    let pos = |target: &BusEvent| journal.iter().position(|e| e == target).unwrap();
    // Torque bracket around the mode change.
    for id in [1, 2] {
        let set = pos(&BusEvent::SetMode {
            id,
            mode: ControlMode::Velocity,
        });
        assert!(pos(&BusEvent::TorqueOff { id }) < set);
        assert!(set < pos(&BusEvent::TorqueOn { id }));
    }

    let writes = writes_to(&hw, velocity_handler(&hw));
    assert_eq!(writes.len(), 1);
    let (ids, values) = &writes[0];
    assert_eq!(ids, &vec![1, 2]);
    assert_eq!(values[1], DEFAULT_MODEL.velocity_to_value(0.0));
    assert!(writes_to(&hw, position_handler(&hw)).is_empty());

    // Re-enabling torque held the joints, so the velocity goes out next cycle.
    hw.bus_mut().clear_journal();
    hw.command_mut("joint1").unwrap().velocity = 0.5;
    hw.write().unwrap();
    assert_eq!(hw.bus().count(|e| matches!(e, BusEvent::SetMode { .. })), 0);
    let writes = writes_to(&hw, velocity_handler(&hw));
    assert_eq!(
        writes,
        vec![(
            vec![1, 2],
            vec![
                DEFAULT_MODEL.velocity_to_value(0.5),
                DEFAULT_MODEL.velocity_to_value(0.0)
            ]
        )]
    );
}

// ─── Properties ─────────────────────────────────────────────────────

#[test]
fn set_mode_twice_issues_bus_calls_once() {
    let mut hw = arm();
    hw.set_control_mode(ControlMode::Velocity, false).unwrap();
    let after_first = hw.bus().journal().len();
    assert!(after_first > 0);

    hw.set_control_mode(ControlMode::Velocity, false).unwrap();
    assert_eq!(hw.bus().journal().len(), after_first);

    hw.set_control_mode(ControlMode::Velocity, true).unwrap();
    assert!(hw.bus().journal().len() > after_first);
}

#[test]
fn torque_is_off_at_every_mode_set() {
    let joints = vec![
        JointConfig::physical("joint1", 1),
        JointConfig::physical("joint2", 2),
        JointConfig {
            current_limit: Some(0.5),
            ..JointConfig::physical("gripper", 3)
        },
    ];
    let mut hw = ServoHardware::new(sim_bus(&[1, 2, 3]), HardwareConfig::default(), &joints)
        .unwrap();
    hw.activate().unwrap();

    for mode in [
        ControlMode::Velocity,
        ControlMode::Position,
        ControlMode::Velocity,
    ] {
        hw.set_control_mode(mode, false).unwrap();
    }
    hw.set_control_mode(ControlMode::Position, true).unwrap();

    // Replay the journal tracking per-device torque.
    let mut torque = std::collections::HashMap::new();
    let mut mode_sets = 0;
    for event in hw.bus().journal() {
        match event {
            BusEvent::TorqueOn { id } => {
                torque.insert(*id, true);
            }
            BusEvent::TorqueOff { id } => {
                torque.insert(*id, false);
            }
            BusEvent::SetMode { id, .. } => {
                mode_sets += 1;
                assert!(!torque.get(id).copied().unwrap_or(false), "torque on at mode set");
            }
            _ => {}
        }
    }
    assert!(mode_sets >= 9);
    // Restored afterwards.
    assert!(hw.torque_enabled());
    assert!((1..=3).all(|id| hw.bus().torque_enabled(id)));
    assert_eq!(hw.gripper_mode(), ControlMode::CurrentBasedPosition);
    assert_eq!(hw.bus().operating_mode(3), ControlMode::CurrentBasedPosition);
}

#[test]
fn torque_stays_off_when_it_was_off() {
    let config = HardwareConfig {
        torque_off: true,
        ..HardwareConfig::default()
    };
    let mut hw = activate(sim_bus(&[1, 2]), config, &arm_joints());
    hw.set_control_mode(ControlMode::Velocity, false).unwrap();
    assert_eq!(hw.bus().count(|e| matches!(e, BusEvent::TorqueOn { .. })), 0);
    assert!(!hw.torque_enabled());
}

#[test]
fn one_velocity_command_drives_the_whole_group() {
    let mut hw = arm();
    hw.set_command("joint1", JointValues::at(0.3)).unwrap();
    hw.set_command(
        "joint2",
        JointValues {
            position: 0.0,
            velocity: -0.2,
            effort: 0.0,
        },
    )
    .unwrap();

    hw.write().unwrap();
    assert_eq!(hw.control_mode(), ControlMode::Velocity);
    assert_eq!(writes_to(&hw, velocity_handler(&hw)).len(), 1);
    assert!(writes_to(&hw, position_handler(&hw)).is_empty());
    assert_eq!(hw.bus().operating_mode(1), ControlMode::Velocity);
    assert_eq!(hw.bus().operating_mode(2), ControlMode::Velocity);
}

#[test]
fn effort_only_command_is_rejected_without_writes() {
    let mut hw = arm();
    hw.command_mut("joint2").unwrap().effort = 0.1;

    assert_eq!(hw.write(), Err(HardwareError::EffortUnimplemented));
    assert_eq!(all_writes(&hw), 0);
    assert_eq!(hw.bus().count(|e| matches!(e, BusEvent::SetMode { .. })), 0);
    assert_eq!(hw.control_mode(), ControlMode::Position);
}

#[test]
fn virtual_joints_mirror_commands() {
    let joints = vec![
        JointConfig::physical("joint1", 1),
        JointConfig::virtual_joint("rail"),
        JointConfig::virtual_joint("tool"),
    ];
    let mut hw = activate(sim_bus(&[1]), HardwareConfig::default(), &joints);
    let commands = [
        JointValues {
            position: 1.5,
            velocity: -0.25,
            effort: 3.0,
        },
        JointValues {
            position: -2.0,
            velocity: 0.0,
            effort: 0.0,
        },
    ];
    hw.set_command("rail", commands[0]).unwrap();
    hw.set_command("tool", commands[1]).unwrap();
    hw.write().unwrap();
    assert_eq!(hw.state("rail"), Some(commands[0]));
    assert_eq!(hw.state("tool"), Some(commands[1]));

    // Still mirrored when the cycle itself fails.
    hw.command_mut("joint1").unwrap().effort = 1.0;
    hw.command_mut("rail").unwrap().position = 0.75;
    assert!(hw.write().is_err());
    assert_eq!(hw.state("rail").unwrap().position, 0.75);
}

#[test]
fn dummy_mode_loops_positions_back() {
    let config = HardwareConfig {
        use_dummy: true,
        ..HardwareConfig::default()
    };
    let mut hw = activate(SimulatedBus::new(), config, &arm_joints());
    assert!(hw.bus().journal().is_empty());

    let before = hw.state("joint1").unwrap();
    hw.set_command(
        "joint1",
        JointValues {
            position: 0.8,
            velocity: 2.0,
            effort: 1.0,
        },
    )
    .unwrap();
    hw.read().unwrap();
    hw.write().unwrap();

    let after = hw.state("joint1").unwrap();
    assert_eq!(after.position, 0.8);
    assert_eq!(after.velocity, before.velocity);
    assert_eq!(after.effort, before.effort);
    assert!(hw.bus().journal().is_empty());
    assert!(!hw.bus().is_initialized());
}

#[test]
fn torque_enable_edge_resets_commands() {
    let config = HardwareConfig {
        torque_off: true,
        ..HardwareConfig::default()
    };
    let mut hw = activate(sim_bus(&[1, 2]), config, &arm_joints());
    hw.bus_mut().place(1, 0.4);
    hw.read().unwrap();
    hw.set_command(
        "joint1",
        JointValues {
            position: 1.0,
            velocity: 0.3,
            effort: 0.2,
        },
    )
    .unwrap();

    hw.enable_torque(true).unwrap();
    let command = hw.command("joint1").unwrap();
    let state = hw.state("joint1").unwrap();
    assert_eq!(command.position, state.position);
    assert_eq!(command.velocity, 0.0);
    assert_eq!(command.effort, 0.0);

    // Already enabled: no bus call, no reset.
    hw.bus_mut().clear_journal();
    hw.command_mut("joint1").unwrap().velocity = 0.3;
    hw.enable_torque(true).unwrap();
    assert!(hw.bus().journal().is_empty());
    assert_eq!(hw.command("joint1").unwrap().velocity, 0.3);
}

#[test]
fn failed_torque_edge_keeps_flag() {
    let config = HardwareConfig {
        torque_off: true,
        ..HardwareConfig::default()
    };
    let mut hw = activate(sim_bus(&[1, 2]), config, &arm_joints());
    hw.bus_mut().fail(SimOp::TorqueOn, Some(2));

    assert!(matches!(
        hw.enable_torque(true),
        Err(HardwareError::TorqueTransition(_))
    ));
    assert!(!hw.torque_enabled());

    hw.bus_mut().clear_failures();
    hw.enable_torque(true).unwrap();
    assert!(hw.torque_enabled());
}

#[test]
fn failed_mode_set_keeps_tracked_mode() {
    let mut hw = arm();
    hw.bus_mut().fail(SimOp::SetMode, Some(2));

    let result = hw.set_control_mode(ControlMode::Velocity, false);
    assert!(matches!(result, Err(HardwareError::ModeTransition { .. })));
    assert_eq!(hw.control_mode(), ControlMode::Position);
    // Device 1 switched before the abort; device 2 was never reached.
    assert_eq!(hw.bus().operating_mode(1), ControlMode::Velocity);
    assert_eq!(hw.bus().operating_mode(2), ControlMode::Position);
}

#[test]
fn bring_up_fails_on_missing_register() {
    // Bus answers pings but knows no registers for id 1.
    struct NoRegisters(SimulatedBus);
    impl ActuatorBus for NoRegisters {
        fn name(&self) -> &'static str {
            "no-registers"
        }
        fn init(&mut self, port: &str, baud: u32) -> Result<(), BusError> {
            self.0.init(port, baud)
        }
        fn ping(&mut self, id: DeviceId) -> Result<ModelNumber, BusError> {
            self.0.ping(id)
        }
        fn torque_on(&mut self, id: DeviceId) -> Result<(), BusError> {
            self.0.torque_on(id)
        }
        fn torque_off(&mut self, id: DeviceId) -> Result<(), BusError> {
            self.0.torque_off(id)
        }
        fn set_position_mode(&mut self, id: DeviceId) -> Result<(), BusError> {
            self.0.set_position_mode(id)
        }
        fn set_velocity_mode(&mut self, id: DeviceId) -> Result<(), BusError> {
            self.0.set_velocity_mode(id)
        }
        fn set_current_based_position_mode(
            &mut self,
            id: DeviceId,
        ) -> Result<(), BusError> {
            self.0.set_current_based_position_mode(id)
        }
        fn resolve_register(
            &self,
            id: DeviceId,
            item: &str,
        ) -> Option<ControlItem> {
            if item == "Goal_Velocity" || item == "Moving_Speed" {
                None
            } else {
                self.0.resolve_register(id, item)
            }
        }
        fn register_batched_write(
            &mut self,
            span: ControlItem,
        ) -> Result<HandlerId, BusError> {
            self.0.register_batched_write(span)
        }
        fn register_batched_read(
            &mut self,
            span: ControlItem,
        ) -> Result<HandlerId, BusError> {
            self.0.register_batched_read(span)
        }
        fn batched_write(
            &mut self,
            handler: HandlerId,
            ids: &[DeviceId],
            values: &[i32],
        ) -> Result<(), BusError> {
            self.0.batched_write(handler, ids, values)
        }
        fn batched_read(
            &mut self,
            handler: HandlerId,
            ids: &[DeviceId],
        ) -> Result<(), BusError> {
            self.0.batched_read(handler, ids)
        }
        fn get_batched_value(
            &self,
            handler: HandlerId,
            ids: &[DeviceId],
            item: ControlItem,
            out: &mut [i32],
        ) -> Result<(), BusError> {
            self.0.get_batched_value(handler, ids, item, out)
        }
        fn write_item(
            &mut self,
            id: DeviceId,
            item: &str,
            value: i32,
        ) -> Result<(), BusError> {
            self.0.write_item(id, item, value)
        }
        fn radian_to_value(&self, id: DeviceId, radian: f64) -> i32 {
            self.0.radian_to_value(id, radian)
        }
        fn value_to_radian(&self, id: DeviceId, value: i32) -> f64 {
            self.0.value_to_radian(id, value)
        }
        fn velocity_to_value(&self, id: DeviceId, velocity: f64) -> i32 {
            self.0.velocity_to_value(id, velocity)
        }
        fn value_to_velocity(&self, id: DeviceId, value: i32) -> f64 {
            self.0.value_to_velocity(id, value)
        }
        fn current_to_value(&self, id: DeviceId, current: f64) -> i32 {
            self.0.current_to_value(id, current)
        }
        fn value_to_current(&self, id: DeviceId, value: i32) -> f64 {
            self.0.value_to_current(id, value)
        }
    }

    let mut hw = ServoHardware::new(
        NoRegisters(sim_bus(&[1, 2])),
        HardwareConfig::default(),
        &arm_joints(),
    )
    .unwrap();
    assert!(matches!(
        hw.activate(),
        Err(HardwareError::MissingRegister(_))
    ));
    assert!(matches!(hw.read(), Err(HardwareError::NotActive)));
}

#[test]
fn bring_up_fails_on_handler_registration() {
    let mut bus = sim_bus(&[1, 2]);
    bus.fail(SimOp::RegisterHandler, None);
    let mut hw = ServoHardware::new(bus, HardwareConfig::default(), &arm_joints()).unwrap();
    assert!(matches!(
        hw.activate(),
        Err(HardwareError::HandlerRegistration(_))
    ));
}

#[test]
fn reactivation_after_deactivate() {
    let mut hw = arm();
    hw.deactivate().unwrap();
    assert!(matches!(hw.write(), Err(HardwareError::NotActive)));
    assert!(!hw.bus().is_initialized());

    hw.activate().unwrap();
    hw.read().unwrap();
    hw.write().unwrap();
    assert!(hw.torque_enabled());
}

#[test]
fn exported_interfaces() {
    let joints = vec![
        JointConfig::virtual_joint("rail"),
        JointConfig::physical("joint1", 1),
    ];
    let hw = activate(sim_bus(&[1]), HardwareConfig::default(), &joints);
    let states: Vec<String> = hw.state_interfaces().iter().map(ToString::to_string).collect();
    assert_eq!(
        states,
        vec![
            "joint1/position",
            "joint1/velocity",
            "joint1/effort",
            "rail/position",
            "rail/velocity",
            "rail/effort",
        ]
    );
    let commands: Vec<String> = hw
        .command_interfaces()
        .iter()
        .map(ToString::to_string)
        .collect();
    assert_eq!(
        commands,
        vec![
            "joint1/position",
            "joint1/velocity",
            "rail/position",
            "rail/velocity"
        ]
    );
}

#[test]
fn simulated_servo_follows_velocity_command() {
    let mut hw = arm();
    // First velocity cycle switches mode; commands are held.
    hw.command_mut("joint1").unwrap().velocity = 1.0;
    hw.write().unwrap();

    let start = hw.state("joint1").unwrap().position;
    for _ in 0..50 {
        hw.command_mut("joint1").unwrap().velocity = 1.0;
        hw.read().unwrap();
        hw.write().unwrap();
    }
    hw.read().unwrap();
    let travelled = hw.state("joint1").unwrap().position - start;
    // 50 ticks of 10 ms at ~1 rad/s.
    assert!((travelled - 0.5).abs() < 0.05, "travelled {travelled}");
    assert!(hw.state("joint1").unwrap().velocity > 0.9);
}

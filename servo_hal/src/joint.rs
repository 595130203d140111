//! Joint model.
//!
//! Device-backed joints keep configuration order and pair index-for-index
//! with [`JointSet::ids`] for batched bus calls. Virtual joints live in a
//! separate list and never touch the bus.

use serde::Serialize;
use servo_common::bus::config::{JointConfig, JointRole, validate_joints};
use servo_common::bus::types::DeviceId;
use servo_common::config::ConfigError;
use std::collections::HashMap;
use std::fmt;

/// Position, velocity and effort of one joint [rad, rad/s, A].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct JointValues {
    /// Position [rad].
    pub position: f64,
    /// Velocity [rad/s].
    pub velocity: f64,
    /// Effort [A].
    pub effort: f64,
}

impl JointValues {
    /// Not yet read or seeded.
    pub const UNKNOWN: Self = Self {
        position: f64::NAN,
        velocity: f64::NAN,
        effort: f64::NAN,
    };

    /// All fields zero.
    pub const ZERO: Self = Self {
        position: 0.0,
        velocity: 0.0,
        effort: 0.0,
    };

    /// Position-only value with zero velocity and effort.
    pub const fn at(position: f64) -> Self {
        Self {
            position,
            velocity: 0.0,
            effort: 0.0,
        }
    }
}

impl Default for JointValues {
    fn default() -> Self {
        Self::UNKNOWN
    }
}

/// One logical joint.
#[derive(Debug, Clone)]
pub struct Joint {
    /// Unique joint name.
    pub name: String,
    /// Resolved role.
    pub role: JointRole,
    /// Last measured (or looped back) values.
    pub state: JointValues,
    /// Pending command.
    pub command: JointValues,
}

impl Joint {
    fn new(name: &str, role: JointRole) -> Self {
        Self {
            name: name.to_string(),
            role,
            state: JointValues::UNKNOWN,
            command: JointValues::UNKNOWN,
        }
    }

    /// Device id, if device-backed.
    pub fn device_id(&self) -> Option<DeviceId> {
        self.role.device_id()
    }

    /// Hold the current position, zero velocity and effort.
    pub fn reset_command(&mut self) {
        self.command = JointValues::at(self.state.position);
    }
}

/// The distinguished current-limited device.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GripperDevice {
    /// Bus device id.
    pub id: DeviceId,
    /// Goal current [A].
    pub current_limit: f64,
}

#[derive(Debug, Clone, Copy)]
enum Slot {
    Physical(usize),
    Virtual(usize),
}

/// All joints of one hardware interface.
#[derive(Debug, Clone)]
pub struct JointSet {
    physical: Vec<Joint>,
    virtuals: Vec<Joint>,
    ids: Vec<DeviceId>,
    group_ids: Vec<DeviceId>,
    gripper: Option<GripperDevice>,
    index: HashMap<String, Slot>,
}

impl JointSet {
    /// Validate the joint list and resolve every joint's role.
    pub fn from_config(joints: &[JointConfig]) -> Result<Self, ConfigError> {
        validate_joints(joints)?;

        let mut set = Self {
            physical: Vec::new(),
            virtuals: Vec::new(),
            ids: Vec::new(),
            group_ids: Vec::new(),
            gripper: None,
            index: HashMap::with_capacity(joints.len()),
        };

        for config in joints {
            let role = config.role()?;
            let slot = match role {
                JointRole::Virtual => {
                    set.virtuals.push(Joint::new(&config.name, role));
                    Slot::Virtual(set.virtuals.len() - 1)
                }
                JointRole::Physical { id } => {
                    set.ids.push(id);
                    set.group_ids.push(id);
                    set.physical.push(Joint::new(&config.name, role));
                    Slot::Physical(set.physical.len() - 1)
                }
                JointRole::Gripper { id, current_limit } => {
                    set.ids.push(id);
                    set.gripper = Some(GripperDevice { id, current_limit });
                    set.physical.push(Joint::new(&config.name, role));
                    Slot::Physical(set.physical.len() - 1)
                }
            };
            set.index.insert(config.name.clone(), slot);
        }

        Ok(set)
    }

    /// Device-backed joints, paired with [`Self::ids`].
    pub fn physical(&self) -> &[Joint] {
        &self.physical
    }

    /// Mutable device-backed joints.
    pub fn physical_mut(&mut self) -> &mut [Joint] {
        &mut self.physical
    }

    /// Virtual joints.
    pub fn virtuals(&self) -> &[Joint] {
        &self.virtuals
    }

    /// Mutable virtual joints.
    pub fn virtuals_mut(&mut self) -> &mut [Joint] {
        &mut self.virtuals
    }

    /// Device ids of every device-backed joint (gripper included).
    pub fn ids(&self) -> &[DeviceId] {
        &self.ids
    }

    /// Device ids of the main group (gripper excluded).
    pub fn group_ids(&self) -> &[DeviceId] {
        &self.group_ids
    }

    /// The gripper device, if configured.
    pub fn gripper(&self) -> Option<GripperDevice> {
        self.gripper
    }

    /// Total joint count.
    pub fn len(&self) -> usize {
        self.physical.len() + self.virtuals.len()
    }

    /// True if no joints are configured.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every joint, device-backed first.
    pub fn iter(&self) -> impl Iterator<Item = &Joint> {
        self.physical.iter().chain(self.virtuals.iter())
    }

    /// Joint by name.
    pub fn get(&self, name: &str) -> Option<&Joint> {
        match self.index.get(name)? {
            Slot::Physical(i) => self.physical.get(*i),
            Slot::Virtual(i) => self.virtuals.get(*i),
        }
    }

    /// Mutable joint by name.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Joint> {
        match self.index.get(name)? {
            Slot::Physical(i) => self.physical.get_mut(*i),
            Slot::Virtual(i) => self.virtuals.get_mut(*i),
        }
    }

    /// Hold every joint at its current position.
    pub fn reset_command(&mut self) {
        self.physical
            .iter_mut()
            .chain(self.virtuals.iter_mut())
            .for_each(Joint::reset_command);
    }

    /// Copy command into state for every virtual joint.
    pub fn loop_back_virtual(&mut self) {
        for joint in &mut self.virtuals {
            joint.state = joint.command;
        }
    }

    /// Zero the state of joints whose position is still unknown.
    ///
    /// Virtual joints always; device-backed joints only when `include_physical`.
    pub fn seed_unknown_states(&mut self, include_physical: bool) {
        let physical = self.physical.iter_mut().filter(|_| include_physical);
        for joint in physical.chain(self.virtuals.iter_mut()) {
            if joint.state.position.is_nan() {
                joint.state = JointValues::ZERO;
            }
        }
    }

    /// Exported state interfaces: position, velocity, effort per joint.
    pub fn state_interfaces(&self) -> Vec<InterfaceDescriptor> {
        self.describe(&[
            InterfaceKind::Position,
            InterfaceKind::Velocity,
            InterfaceKind::Effort,
        ])
    }

    /// Exported command interfaces: position, velocity per joint.
    pub fn command_interfaces(&self) -> Vec<InterfaceDescriptor> {
        self.describe(&[InterfaceKind::Position, InterfaceKind::Velocity])
    }

    fn describe(&self, kinds: &[InterfaceKind]) -> Vec<InterfaceDescriptor> {
        self.iter()
            .flat_map(|joint| {
                kinds.iter().map(move |&kind| InterfaceDescriptor {
                    joint: joint.name.clone(),
                    kind,
                })
            })
            .collect()
    }
}

/// Physical quantity of an exported interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InterfaceKind {
    /// Position [rad].
    Position,
    /// Velocity [rad/s].
    Velocity,
    /// Effort [A].
    Effort,
}

impl InterfaceKind {
    /// Interface type name.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Position => "position",
            Self::Velocity => "velocity",
            Self::Effort => "effort",
        }
    }
}

/// One exported state or command interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InterfaceDescriptor {
    /// Owning joint.
    pub joint: String,
    /// Quantity.
    pub kind: InterfaceKind,
}

impl fmt::Display for InterfaceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.joint, self.kind.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gripper(id: DeviceId, limit: f64) -> JointConfig {
        JointConfig {
            current_limit: Some(limit),
            ..JointConfig::physical("gripper", id)
        }
    }

    fn arm() -> JointSet {
        JointSet::from_config(&[
            JointConfig::physical("joint1", 1),
            JointConfig::virtual_joint("yaw"),
            JointConfig::physical("joint2", 2),
            gripper(5, 0.25),
        ])
        .unwrap()
    }

    #[test]
    fn partitions_by_role() {
        let set = arm();
        assert_eq!(set.len(), 4);
        assert_eq!(set.ids(), &[1, 2, 5]);
        assert_eq!(set.group_ids(), &[1, 2]);
        assert_eq!(
            set.gripper(),
            Some(GripperDevice {
                id: 5,
                current_limit: 0.25
            })
        );
        assert_eq!(set.virtuals().len(), 1);

        let names: Vec<&str> = set.iter().map(|j| j.name.as_str()).collect();
        assert_eq!(names, vec!["joint1", "joint2", "gripper", "yaw"]);
    }

    #[test]
    fn starts_unknown() {
        let set = arm();
        assert!(set.iter().all(|j| j.state.position.is_nan()));
        assert!(set.iter().all(|j| j.command.velocity.is_nan()));
    }

    #[test]
    fn lookup_by_name() {
        let mut set = arm();
        assert_eq!(set.get("joint2").and_then(Joint::device_id), Some(2));
        assert_eq!(set.get("yaw").and_then(Joint::device_id), None);
        assert!(set.get("missing").is_none());

        set.get_mut("yaw").unwrap().command = JointValues::at(0.4);
        assert_eq!(set.virtuals()[0].command.position, 0.4);
    }

    #[test]
    fn reset_command_holds_position() {
        let mut set = arm();
        for joint in set.physical_mut() {
            joint.state = JointValues {
                position: 0.3,
                velocity: 1.0,
                effort: 0.1,
            };
            joint.command = JointValues {
                position: 1.0,
                velocity: 2.0,
                effort: 0.5,
            };
        }
        set.reset_command();
        for joint in set.physical() {
            assert_eq!(joint.command, JointValues::at(0.3));
        }
        // Virtual joint state is still unknown; its command follows.
        assert!(set.virtuals()[0].command.position.is_nan());
        assert_eq!(set.virtuals()[0].command.velocity, 0.0);
    }

    #[test]
    fn loop_back_copies_all_fields() {
        let mut set = arm();
        let cmd = JointValues {
            position: 0.1,
            velocity: 0.2,
            effort: 0.3,
        };
        set.virtuals_mut()[0].command = cmd;
        set.loop_back_virtual();
        assert_eq!(set.virtuals()[0].state, cmd);
        assert!(set.physical()[0].state.position.is_nan());
    }

    #[test]
    fn seed_unknown_states() {
        let mut set = arm();
        set.seed_unknown_states(false);
        assert_eq!(set.virtuals()[0].state, JointValues::ZERO);
        assert!(set.physical()[0].state.position.is_nan());

        set.physical_mut()[1].state = JointValues::at(0.7);
        set.seed_unknown_states(true);
        assert_eq!(set.physical()[0].state, JointValues::ZERO);
        assert_eq!(set.physical()[1].state.position, 0.7);
    }

    #[test]
    fn interfaces() {
        let set = JointSet::from_config(&[
            JointConfig::virtual_joint("yaw"),
            JointConfig::physical("joint1", 1),
        ])
        .unwrap();

        let state: Vec<String> = set.state_interfaces().iter().map(|i| i.to_string()).collect();
        assert_eq!(
            state,
            vec![
                "joint1/position",
                "joint1/velocity",
                "joint1/effort",
                "yaw/position",
                "yaw/velocity",
                "yaw/effort",
            ]
        );
        assert_eq!(set.command_interfaces().len(), 4);
    }

    #[test]
    fn rejects_invalid_config() {
        let result = JointSet::from_config(&[
            JointConfig::physical("joint1", 1),
            JointConfig::physical("joint1", 2),
        ]);
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }
}

//! One simulated servo: control-table memory plus ideal-servo physics.

use servo_common::bus::consts::*;
use servo_common::bus::control_table::{
    ModeSelect, ModelInfo, decode_le, encode_le, mode_from_operating_value, operating_mode_value,
};
use servo_common::bus::driver::BusError;
use servo_common::bus::types::{ControlItem, ControlMode, DeviceId};

/// Items that live in EEPROM and are locked while torque is enabled.
const EEPROM_ITEMS: [&str; 3] = [OPERATING_MODE_ITEM, CW_ANGLE_LIMIT_ITEM, CCW_ANGLE_LIMIT_ITEM];

/// Simulated device.
#[derive(Debug, Clone)]
pub(crate) struct SimServo {
    id: DeviceId,
    model: &'static ModelInfo,
    memory: Vec<u8>,
    /// Present position [rad], kept unrounded between ticks.
    position: f64,
}

impl SimServo {
    /// Power-on state: torque off, position mode, resting at the centre tick.
    pub(crate) fn new(id: DeviceId, model: &'static ModelInfo) -> Self {
        let mut servo = Self {
            id,
            model,
            memory: vec![0; model.table_end() as usize],
            position: 0.0,
        };
        servo.write_named(MODEL_NUMBER_ITEM, model.number as i32);
        servo.write_named("ID", id as i32);
        match model.mode_select {
            ModeSelect::OperatingMode => {
                servo.write_named(
                    OPERATING_MODE_ITEM,
                    operating_mode_value(ControlMode::Position).unwrap_or(3) as i32,
                );
            }
            ModeSelect::AngleLimits => {
                servo.write_named(CCW_ANGLE_LIMIT_ITEM, model.scale.max_position);
            }
        }
        servo.place(0.0);
        servo
    }

    pub(crate) fn model(&self) -> &'static ModelInfo {
        self.model
    }

    pub(crate) fn item(&self, name: &str) -> Option<ControlItem> {
        self.model.item(name)
    }

    /// Raw bytes of `span`, if it lies inside the control table.
    pub(crate) fn bytes(&self, span: ControlItem) -> Option<&[u8]> {
        self.memory
            .get(span.address as usize..span.end() as usize)
    }

    pub(crate) fn read(&self, item: ControlItem) -> Option<i32> {
        self.bytes(item).map(decode_le)
    }

    pub(crate) fn write(&mut self, item: ControlItem, value: i32) -> Result<(), BusError> {
        let slot = self
            .memory
            .get_mut(item.address as usize..item.end() as usize)
            .ok_or_else(|| {
                BusError::Register(format!(
                    "id {}: span @{}+{} outside control table",
                    self.id, item.address, item.length
                ))
            })?;
        encode_le(value, slot);
        Ok(())
    }

    pub(crate) fn read_named(&self, name: &str) -> Option<i32> {
        self.item(name).and_then(|item| self.read(item))
    }

    fn write_named(&mut self, name: &str, value: i32) -> bool {
        match self.item(name) {
            Some(item) => self.write(item, value).is_ok(),
            None => false,
        }
    }

    /// Write a named register, enforcing the EEPROM lock.
    pub(crate) fn write_item(&mut self, name: &str, value: i32) -> Result<(), BusError> {
        let item = self
            .item(name)
            .ok_or_else(|| BusError::Register(format!("id {}: no item '{}'", self.id, name)))?;
        if EEPROM_ITEMS.contains(&name) && self.torque_enabled() {
            return Err(self.access_error(name));
        }
        self.write(item, value)
    }

    pub(crate) fn torque_enabled(&self) -> bool {
        self.read_named(TORQUE_ENABLE_ITEM).unwrap_or(0) != 0
    }

    pub(crate) fn set_torque(&mut self, enabled: bool) {
        self.write_named(TORQUE_ENABLE_ITEM, enabled as i32);
    }

    /// Mode as encoded in the control table.
    pub(crate) fn mode(&self) -> ControlMode {
        match self.model.mode_select {
            ModeSelect::OperatingMode => {
                let value = self.read_named(OPERATING_MODE_ITEM).unwrap_or(0);
                mode_from_operating_value(value as u8)
            }
            ModeSelect::AngleLimits => {
                let cw = self.read_named(CW_ANGLE_LIMIT_ITEM).unwrap_or(0);
                let ccw = self.read_named(CCW_ANGLE_LIMIT_ITEM).unwrap_or(0);
                if cw == 0 && ccw == 0 {
                    ControlMode::Velocity
                } else {
                    ControlMode::Position
                }
            }
        }
    }

    pub(crate) fn set_mode(&mut self, mode: ControlMode) -> Result<(), BusError> {
        if self.torque_enabled() {
            return Err(self.access_error("operating mode"));
        }
        match self.model.mode_select {
            ModeSelect::OperatingMode => {
                let value = operating_mode_value(mode).ok_or_else(|| self.unsupported(mode))?;
                self.write_item(OPERATING_MODE_ITEM, value as i32)
            }
            ModeSelect::AngleLimits => match mode {
                ControlMode::Velocity => {
                    self.write_item(CW_ANGLE_LIMIT_ITEM, 0)?;
                    self.write_item(CCW_ANGLE_LIMIT_ITEM, 0)
                }
                ControlMode::Position => {
                    self.write_item(CW_ANGLE_LIMIT_ITEM, self.model.scale.min_position)?;
                    self.write_item(CCW_ANGLE_LIMIT_ITEM, self.model.scale.max_position)
                }
                other => Err(self.unsupported(other)),
            },
        }
    }

    /// Teleport to `radian`, holding it as the goal.
    pub(crate) fn place(&mut self, radian: f64) {
        self.position = radian;
        let ticks = self.model.radian_to_value(radian);
        self.write_named(GOAL_POSITION_ITEM, ticks);
        self.write_named(PRESENT_POSITION_ITEM, ticks);
    }

    /// Advance the ideal servo by `dt` seconds.
    ///
    /// Position modes reach the goal within one tick; velocity mode
    /// integrates the goal velocity. Torque off freezes the servo.
    pub(crate) fn step(&mut self, dt: f64) {
        let goal_velocity = self
            .read_named(GOAL_VELOCITY_ITEM)
            .or_else(|| self.read_named(MOVING_SPEED_ITEM))
            .unwrap_or(0);

        let present_velocity = if !self.torque_enabled() {
            0
        } else {
            match self.mode() {
                ControlMode::Position | ControlMode::CurrentBasedPosition => {
                    let goal = self.read_named(GOAL_POSITION_ITEM).unwrap_or(0);
                    self.position = self.model.value_to_radian(goal);
                    0
                }
                ControlMode::Velocity => {
                    let scale = &self.model.scale;
                    let lo = self.model.value_to_radian(scale.min_position);
                    let hi = self.model.value_to_radian(scale.max_position);
                    let velocity = self.model.value_to_velocity(goal_velocity);
                    self.position = (self.position + velocity * dt).clamp(lo, hi);
                    goal_velocity
                }
                ControlMode::Unset => 0,
            }
        };

        let ticks = self.model.radian_to_value(self.position);
        self.write_named(PRESENT_POSITION_ITEM, ticks);
        if !self.write_named(PRESENT_VELOCITY_ITEM, present_velocity) {
            self.write_named(PRESENT_SPEED_ITEM, present_velocity);
        }
        if !self.write_named(PRESENT_CURRENT_ITEM, 0) {
            self.write_named(PRESENT_LOAD_ITEM, 0);
        }
    }

    fn access_error(&self, what: &str) -> BusError {
        BusError::Device(format!(
            "id {}: access error, {} locked while torque is enabled",
            self.id, what
        ))
    }

    fn unsupported(&self, mode: ControlMode) -> BusError {
        BusError::Unsupported(format!(
            "id {} ({}): {} mode",
            self.id, self.model.name, mode
        ))
    }
}

//! Device register catalog.
//!
//! Control tables and unit conversions for the supported servo families:
//! - X-series (Protocol 2.0): XM430, XH430, XM540 report `Present_Current`;
//!   XL430 reports `Present_Load` and has no `Goal_Current`.
//! - MX-28 (Protocol 1.0): legacy `Moving_Speed` / `Present_Speed` /
//!   `Present_Load` items, mode selected through the angle limits.
//!
//! Conversions are per model, which is why the bus contract exposes them
//! per device id.

use crate::bus::consts::*;
use crate::bus::types::{ControlItem, ControlMode, ModelNumber};
use std::f64::consts::TAU;

/// How a model selects its operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeSelect {
    /// Dedicated `Operating_Mode` register (EEPROM, torque must be off).
    OperatingMode,
    /// Angle limits: both zero selects wheel (velocity) mode.
    AngleLimits,
}

/// Encoding of signed velocity/effort registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignEncoding {
    /// Plain two's complement.
    TwosComplement,
    /// Magnitude in the low 10 bits, direction in bit 10.
    SignMagnitude,
}

const SIGN_MAGNITUDE_DIRECTION_BIT: i32 = 0x400;
const SIGN_MAGNITUDE_MAX: i32 = 0x3FF;

/// Raw ↔ physical scale factors of one model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitScale {
    /// Tick corresponding to 0 rad.
    pub zero_position: i32,
    /// Lowest tick accepted in position mode.
    pub min_position: i32,
    /// Highest tick accepted in position mode.
    pub max_position: i32,
    /// Ticks per full turn.
    pub ticks_per_revolution: f64,
    /// Velocity resolution [rpm per unit].
    pub velocity_unit_rpm: f64,
    /// Effort resolution: amperes per unit on current-sensing models,
    /// fraction of rated load per unit on load-sensing models.
    pub effort_unit: f64,
    /// Encoding of velocity and effort registers.
    pub sign: SignEncoding,
}

/// Static description of one servo model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelInfo {
    /// Model number reported on ping.
    pub number: ModelNumber,
    /// Human-readable model name.
    pub name: &'static str,
    /// Protocol version spoken by the model.
    pub protocol: u8,
    /// Control table.
    pub items: &'static [ControlItem],
    /// Operating mode selection strategy.
    pub mode_select: ModeSelect,
    /// Unit conversion factors.
    pub scale: UnitScale,
}

// ─── Control tables ─────────────────────────────────────────────────

const X_SERIES_CURRENT_TABLE: &[ControlItem] = &[
    ControlItem::new(MODEL_NUMBER_ITEM, 0, 2),
    ControlItem::new("Firmware_Version", 6, 1),
    ControlItem::new("ID", 7, 1),
    ControlItem::new("Baud_Rate", 8, 1),
    ControlItem::new(OPERATING_MODE_ITEM, 11, 1),
    ControlItem::new("Current_Limit", 38, 2),
    ControlItem::new("Velocity_Limit", 44, 4),
    ControlItem::new("Max_Position_Limit", 48, 4),
    ControlItem::new("Min_Position_Limit", 52, 4),
    ControlItem::new(TORQUE_ENABLE_ITEM, 64, 1),
    ControlItem::new("LED", 65, 1),
    ControlItem::new("Hardware_Error_Status", 70, 1),
    ControlItem::new("Goal_PWM", 100, 2),
    ControlItem::new(GOAL_CURRENT_ITEM, 102, 2),
    ControlItem::new(GOAL_VELOCITY_ITEM, 104, 4),
    ControlItem::new("Profile_Acceleration", 108, 4),
    ControlItem::new("Profile_Velocity", 112, 4),
    ControlItem::new(GOAL_POSITION_ITEM, 116, 4),
    ControlItem::new("Moving", 122, 1),
    ControlItem::new("Present_PWM", 124, 2),
    ControlItem::new(PRESENT_CURRENT_ITEM, 126, 2),
    ControlItem::new(PRESENT_VELOCITY_ITEM, 128, 4),
    ControlItem::new(PRESENT_POSITION_ITEM, 132, 4),
    ControlItem::new("Present_Input_Voltage", 144, 2),
    ControlItem::new("Present_Temperature", 146, 1),
];

const X_SERIES_LOAD_TABLE: &[ControlItem] = &[
    ControlItem::new(MODEL_NUMBER_ITEM, 0, 2),
    ControlItem::new("Firmware_Version", 6, 1),
    ControlItem::new("ID", 7, 1),
    ControlItem::new("Baud_Rate", 8, 1),
    ControlItem::new(OPERATING_MODE_ITEM, 11, 1),
    ControlItem::new("Velocity_Limit", 44, 4),
    ControlItem::new("Max_Position_Limit", 48, 4),
    ControlItem::new("Min_Position_Limit", 52, 4),
    ControlItem::new(TORQUE_ENABLE_ITEM, 64, 1),
    ControlItem::new("LED", 65, 1),
    ControlItem::new("Hardware_Error_Status", 70, 1),
    ControlItem::new("Goal_PWM", 100, 2),
    ControlItem::new(GOAL_VELOCITY_ITEM, 104, 4),
    ControlItem::new("Profile_Acceleration", 108, 4),
    ControlItem::new("Profile_Velocity", 112, 4),
    ControlItem::new(GOAL_POSITION_ITEM, 116, 4),
    ControlItem::new("Moving", 122, 1),
    ControlItem::new("Present_PWM", 124, 2),
    ControlItem::new(PRESENT_LOAD_ITEM, 126, 2),
    ControlItem::new(PRESENT_VELOCITY_ITEM, 128, 4),
    ControlItem::new(PRESENT_POSITION_ITEM, 132, 4),
    ControlItem::new("Present_Input_Voltage", 144, 2),
    ControlItem::new("Present_Temperature", 146, 1),
];

const MX_PROTOCOL1_TABLE: &[ControlItem] = &[
    ControlItem::new(MODEL_NUMBER_ITEM, 0, 2),
    ControlItem::new("Firmware_Version", 2, 1),
    ControlItem::new("ID", 3, 1),
    ControlItem::new("Baud_Rate", 4, 1),
    ControlItem::new(CW_ANGLE_LIMIT_ITEM, 6, 2),
    ControlItem::new(CCW_ANGLE_LIMIT_ITEM, 8, 2),
    ControlItem::new(TORQUE_ENABLE_ITEM, 24, 1),
    ControlItem::new("LED", 25, 1),
    ControlItem::new(GOAL_POSITION_ITEM, 30, 2),
    ControlItem::new(MOVING_SPEED_ITEM, 32, 2),
    ControlItem::new("Torque_Limit", 34, 2),
    ControlItem::new(PRESENT_POSITION_ITEM, 36, 2),
    ControlItem::new(PRESENT_SPEED_ITEM, 38, 2),
    ControlItem::new(PRESENT_LOAD_ITEM, 40, 2),
    ControlItem::new("Present_Voltage", 42, 1),
    ControlItem::new("Present_Temperature", 43, 1),
    ControlItem::new("Moving", 46, 1),
];

// ─── Models ─────────────────────────────────────────────────────────

const fn x_series_scale(current_unit_ma: f64) -> UnitScale {
    UnitScale {
        zero_position: 2048,
        min_position: 0,
        max_position: 4095,
        ticks_per_revolution: 4096.0,
        velocity_unit_rpm: 0.229,
        effort_unit: current_unit_ma / 1000.0,
        sign: SignEncoding::TwosComplement,
    }
}

const fn x_series(number: ModelNumber, name: &'static str, current_unit_ma: f64) -> ModelInfo {
    ModelInfo {
        number,
        name,
        protocol: 2,
        items: X_SERIES_CURRENT_TABLE,
        mode_select: ModeSelect::OperatingMode,
        scale: x_series_scale(current_unit_ma),
    }
}

/// XM430-W350.
pub const XM430_W350: ModelInfo = x_series(1020, "XM430-W350", 2.69);
/// XM430-W210.
pub const XM430_W210: ModelInfo = x_series(1030, "XM430-W210", 2.69);
/// XH430-W350.
pub const XH430_W350: ModelInfo = x_series(1010, "XH430-W350", 1.34);
/// XH430-W210.
pub const XH430_W210: ModelInfo = x_series(1000, "XH430-W210", 1.34);
/// XM540-W270.
pub const XM540_W270: ModelInfo = x_series(1120, "XM540-W270", 2.69);

/// XL430-W250 (load-sensing, no goal current).
pub const XL430_W250: ModelInfo = ModelInfo {
    number: 1060,
    name: "XL430-W250",
    protocol: 2,
    items: X_SERIES_LOAD_TABLE,
    mode_select: ModeSelect::OperatingMode,
    // 0.1 % of rated load per unit.
    scale: x_series_scale(1.0),
};

/// MX-28 running Protocol 1.0 firmware.
pub const MX_28: ModelInfo = ModelInfo {
    number: 29,
    name: "MX-28",
    protocol: 1,
    items: MX_PROTOCOL1_TABLE,
    mode_select: ModeSelect::AngleLimits,
    scale: UnitScale {
        zero_position: 2048,
        min_position: 0,
        max_position: 4095,
        ticks_per_revolution: 4096.0,
        velocity_unit_rpm: 0.114,
        effort_unit: 0.001,
        sign: SignEncoding::SignMagnitude,
    },
};

/// Model assumed when a device's model is not known yet.
pub const DEFAULT_MODEL: &ModelInfo = &XM430_W350;

static MODELS: [&ModelInfo; 7] = [
    &XM430_W350,
    &XM430_W210,
    &XH430_W350,
    &XH430_W210,
    &XM540_W270,
    &XL430_W250,
    &MX_28,
];

/// Look up a model by the number it reports on ping.
pub fn lookup_model(number: ModelNumber) -> Option<&'static ModelInfo> {
    MODELS.iter().copied().find(|m| m.number == number)
}

/// `Operating_Mode` register value for a control mode.
pub const fn operating_mode_value(mode: ControlMode) -> Option<u8> {
    match mode {
        ControlMode::Velocity => Some(1),
        ControlMode::Position => Some(3),
        ControlMode::CurrentBasedPosition => Some(5),
        ControlMode::Unset => None,
    }
}

/// Control mode for an `Operating_Mode` register value.
pub const fn mode_from_operating_value(value: u8) -> ControlMode {
    match value {
        1 => ControlMode::Velocity,
        3 => ControlMode::Position,
        5 => ControlMode::CurrentBasedPosition,
        _ => ControlMode::Unset,
    }
}

impl ModelInfo {
    /// Resolve a control-table item by name.
    pub fn item(&self, name: &str) -> Option<ControlItem> {
        self.items.iter().copied().find(|i| i.name == name)
    }

    /// First address past the last item of the table.
    pub fn table_end(&self) -> u16 {
        self.items.iter().map(ControlItem::end).max().unwrap_or(0)
    }

    /// Radians → position ticks, clamped to the position-mode range.
    pub fn radian_to_value(&self, radian: f64) -> i32 {
        let s = &self.scale;
        let ticks = s.zero_position as f64 + radian * s.ticks_per_revolution / TAU;
        (ticks.round() as i32).clamp(s.min_position, s.max_position)
    }

    /// Position ticks → radians.
    pub fn value_to_radian(&self, value: i32) -> f64 {
        let s = &self.scale;
        (value - s.zero_position) as f64 * TAU / s.ticks_per_revolution
    }

    /// rad/s → velocity units.
    pub fn velocity_to_value(&self, velocity: f64) -> i32 {
        let rpm = velocity * 60.0 / TAU;
        let units = (rpm / self.scale.velocity_unit_rpm).round() as i32;
        self.encode_signed(units)
    }

    /// Velocity units → rad/s.
    pub fn value_to_velocity(&self, value: i32) -> f64 {
        let units = self.decode_signed(value);
        units as f64 * self.scale.velocity_unit_rpm * TAU / 60.0
    }

    /// Amperes → current units.
    pub fn current_to_value(&self, current: f64) -> i32 {
        let units = (current / self.scale.effort_unit).round() as i32;
        self.encode_signed(units)
    }

    /// Current (or load) units → amperes (or load fraction).
    pub fn value_to_current(&self, value: i32) -> f64 {
        self.decode_signed(value) as f64 * self.scale.effort_unit
    }

    fn encode_signed(&self, units: i32) -> i32 {
        match self.scale.sign {
            SignEncoding::TwosComplement => units,
            SignEncoding::SignMagnitude if units < 0 => {
                units.saturating_neg().min(SIGN_MAGNITUDE_MAX) | SIGN_MAGNITUDE_DIRECTION_BIT
            }
            SignEncoding::SignMagnitude => units.min(SIGN_MAGNITUDE_MAX),
        }
    }

    fn decode_signed(&self, value: i32) -> i32 {
        match self.scale.sign {
            SignEncoding::TwosComplement => value,
            SignEncoding::SignMagnitude if value & SIGN_MAGNITUDE_DIRECTION_BIT != 0 => {
                -(value & SIGN_MAGNITUDE_MAX)
            }
            SignEncoding::SignMagnitude => value & SIGN_MAGNITUDE_MAX,
        }
    }
}

// ─── Register encoding ──────────────────────────────────────────────

/// Decode a little-endian register value.
///
/// 2- and 4-byte values are sign-extended; single bytes are unsigned.
pub fn decode_le(bytes: &[u8]) -> i32 {
    match bytes.len() {
        1 => bytes[0] as i32,
        2 => i16::from_le_bytes([bytes[0], bytes[1]]) as i32,
        4 => i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
        _ => 0,
    }
}

/// Encode `value` little-endian into `out` (whose length selects the width).
pub fn encode_le(value: i32, out: &mut [u8]) {
    let bytes = value.to_le_bytes();
    let n = out.len().min(4);
    out[..n].copy_from_slice(&bytes[..n]);
}

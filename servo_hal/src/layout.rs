//! Register layout resolved at bring-up.
//!
//! Items are looked up on the first device-backed id; every device on one
//! bus is assumed to share that control table. Legacy devices expose
//! velocity and current under older names, tried as fallbacks.

use crate::error::HardwareError;
use servo_common::bus::consts::*;
use servo_common::bus::driver::{ActuatorBus, BusError};
use servo_common::bus::types::{ControlItem, DeviceId, HandlerId};
use tracing::{debug, info};

/// Name given to the combined present-value read span.
pub const PRESENT_SPAN_NAME: &str = "Present_Span";

/// Cached register items and the handlers registered for them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusLayout {
    /// Goal position register.
    pub goal_position: ControlItem,
    /// Goal velocity register (or `Moving_Speed`).
    pub goal_velocity: ControlItem,
    /// Present position register.
    pub present_position: ControlItem,
    /// Present velocity register (or `Present_Speed`).
    pub present_velocity: ControlItem,
    /// Present current register (or `Present_Load`).
    pub present_current: ControlItem,
    /// Span covering the three present items.
    pub present_span: ControlItem,
    /// Batched write handler for goal positions.
    pub goal_position_handler: HandlerId,
    /// Batched write handler for goal velocities.
    pub goal_velocity_handler: HandlerId,
    /// Batched read handler for the present span.
    pub present_handler: HandlerId,
}

impl BusLayout {
    /// Resolve all items on `id` and register the batched handlers.
    pub fn resolve<B: ActuatorBus + ?Sized>(
        bus: &mut B,
        id: DeviceId,
    ) -> Result<Self, HardwareError> {
        let goal_position = resolve_item(bus, id, &[GOAL_POSITION_ITEM])?;
        let goal_velocity = resolve_item(bus, id, &[GOAL_VELOCITY_ITEM, MOVING_SPEED_ITEM])?;
        let present_position = resolve_item(bus, id, &[PRESENT_POSITION_ITEM])?;
        let present_velocity =
            resolve_item(bus, id, &[PRESENT_VELOCITY_ITEM, PRESENT_SPEED_ITEM])?;
        let present_current = resolve_item(bus, id, &[PRESENT_CURRENT_ITEM, PRESENT_LOAD_ITEM])?;

        let present_span = span_of(&[present_position, present_velocity, present_current]);

        let register_failed = |what: &str, e: BusError| {
            HardwareError::HandlerRegistration(format!("{what}: {e}"))
        };
        let goal_position_handler = bus
            .register_batched_write(goal_position)
            .map_err(|e| register_failed(goal_position.name, e))?;
        let goal_velocity_handler = bus
            .register_batched_write(goal_velocity)
            .map_err(|e| register_failed(goal_velocity.name, e))?;
        let present_handler = bus
            .register_batched_read(present_span)
            .map_err(|e| register_failed(PRESENT_SPAN_NAME, e))?;

        info!(
            "Registered handlers: {} @{}+{}, {} @{}+{}, present span @{}+{}",
            goal_position.name,
            goal_position.address,
            goal_position.length,
            goal_velocity.name,
            goal_velocity.address,
            goal_velocity.length,
            present_span.address,
            present_span.length
        );

        Ok(Self {
            goal_position,
            goal_velocity,
            present_position,
            present_velocity,
            present_current,
            present_span,
            goal_position_handler,
            goal_velocity_handler,
            present_handler,
        })
    }
}

/// First name the device knows, in order of preference.
fn resolve_item<B: ActuatorBus + ?Sized>(
    bus: &B,
    id: DeviceId,
    names: &[&str],
) -> Result<ControlItem, HardwareError> {
    for name in names {
        if let Some(item) = bus.resolve_register(id, name) {
            debug!("id {}: {} @{}+{}", id, item.name, item.address, item.length);
            return Ok(item);
        }
    }
    Err(HardwareError::MissingRegister(format!(
        "{} on id {}",
        names.join(" / "),
        id
    )))
}

/// Smallest span covering every item.
fn span_of(items: &[ControlItem]) -> ControlItem {
    let start = items.iter().map(|i| i.address).min().unwrap_or(0);
    let end = items.iter().map(ControlItem::end).max().unwrap_or(start);
    ControlItem::new(PRESENT_SPAN_NAME, start, end - start)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::simulation::{SimOp, SimulatedBus};
    use servo_common::bus::control_table::{MX_28, ModelInfo, XL430_W250, XM430_W350};

    fn bus_with(model: &'static ModelInfo) -> SimulatedBus {
        let mut bus = SimulatedBus::new().with_servo(1, model);
        bus.init("sim", 57_600).unwrap();
        bus
    }

    #[test]
    fn x_series_layout() {
        let mut bus = bus_with(&XM430_W350);
        let layout = BusLayout::resolve(&mut bus, 1).unwrap();
        assert_eq!(layout.goal_velocity.name, GOAL_VELOCITY_ITEM);
        assert_eq!(layout.present_current.name, PRESENT_CURRENT_ITEM);
        assert_eq!(layout.present_span.address, 126);
        assert_eq!(layout.present_span.length, 10);
        assert!(layout.present_span.contains(&layout.present_position));
        assert_ne!(layout.goal_position_handler, layout.goal_velocity_handler);
    }

    #[test]
    fn load_sensing_fallback() {
        let mut bus = bus_with(&XL430_W250);
        let layout = BusLayout::resolve(&mut bus, 1).unwrap();
        assert_eq!(layout.present_current.name, PRESENT_LOAD_ITEM);
        assert_eq!(layout.present_velocity.name, PRESENT_VELOCITY_ITEM);
    }

    #[test]
    fn legacy_fallbacks() {
        let mut bus = bus_with(&MX_28);
        let layout = BusLayout::resolve(&mut bus, 1).unwrap();
        assert_eq!(layout.goal_velocity.name, MOVING_SPEED_ITEM);
        assert_eq!(layout.present_velocity.name, PRESENT_SPEED_ITEM);
        assert_eq!(layout.present_current.name, PRESENT_LOAD_ITEM);
        // Present_Position 36..38, Present_Speed 38..40, Present_Load 40..42.
        assert_eq!(layout.present_span, ControlItem::new(PRESENT_SPAN_NAME, 36, 6));
    }

    #[test]
    fn unknown_device_is_missing_register() {
        let mut bus = bus_with(&XM430_W350);
        let result = BusLayout::resolve(&mut bus, 9);
        assert!(matches!(result, Err(HardwareError::MissingRegister(_))));
    }

    #[test]
    fn handler_registration_failure() {
        let mut bus = bus_with(&XM430_W350);
        bus.fail(SimOp::RegisterHandler, None);
        let result = BusLayout::resolve(&mut bus, 1);
        assert!(matches!(result, Err(HardwareError::HandlerRegistration(_))));
    }
}

//! Driver that accepts every call and touches nothing.
//!
//! Used for bring-up of the control stack on machines without a bus. Reads
//! report zero, registers resolve against the default model.

use servo_common::bus::control_table::DEFAULT_MODEL;
use servo_common::bus::driver::{ActuatorBus, BusError};
use servo_common::bus::types::{ControlItem, DeviceId, HandlerId, ModelNumber};
use tracing::debug;

/// No-op bus.
#[derive(Debug, Default)]
pub struct DummyBus {
    next_handler: usize,
}

impl DummyBus {
    /// Create a dummy bus.
    pub fn new() -> Self {
        Self::default()
    }
}

/// Factory function to create a dummy bus instance.
pub fn create_driver() -> Box<dyn ActuatorBus> {
    Box::new(DummyBus::new())
}

impl ActuatorBus for DummyBus {
    fn name(&self) -> &'static str {
        "dummy"
    }

    fn init(&mut self, port: &str, baud_rate: u32) -> Result<(), BusError> {
        debug!("dummy bus: init {} @ {}", port, baud_rate);
        Ok(())
    }

    fn ping(&mut self, _id: DeviceId) -> Result<ModelNumber, BusError> {
        Ok(DEFAULT_MODEL.number)
    }

    fn torque_on(&mut self, _id: DeviceId) -> Result<(), BusError> {
        Ok(())
    }

    fn torque_off(&mut self, _id: DeviceId) -> Result<(), BusError> {
        Ok(())
    }

    fn set_position_mode(&mut self, _id: DeviceId) -> Result<(), BusError> {
        Ok(())
    }

    fn set_velocity_mode(&mut self, _id: DeviceId) -> Result<(), BusError> {
        Ok(())
    }

    fn set_current_based_position_mode(&mut self, _id: DeviceId) -> Result<(), BusError> {
        Ok(())
    }

    fn resolve_register(&self, _id: DeviceId, item: &str) -> Option<ControlItem> {
        DEFAULT_MODEL.item(item)
    }

    fn register_batched_write(&mut self, _span: ControlItem) -> Result<HandlerId, BusError> {
        self.next_handler += 1;
        Ok(HandlerId(self.next_handler - 1))
    }

    fn register_batched_read(&mut self, span: ControlItem) -> Result<HandlerId, BusError> {
        self.register_batched_write(span)
    }

    fn batched_write(
        &mut self,
        _handler: HandlerId,
        _ids: &[DeviceId],
        _values: &[i32],
    ) -> Result<(), BusError> {
        Ok(())
    }

    fn batched_read(&mut self, _handler: HandlerId, _ids: &[DeviceId]) -> Result<(), BusError> {
        Ok(())
    }

    fn get_batched_value(
        &self,
        _handler: HandlerId,
        _ids: &[DeviceId],
        _item: ControlItem,
        out: &mut [i32],
    ) -> Result<(), BusError> {
        out.fill(0);
        Ok(())
    }

    fn write_item(&mut self, _id: DeviceId, _item: &str, _value: i32) -> Result<(), BusError> {
        Ok(())
    }

    fn radian_to_value(&self, _id: DeviceId, radian: f64) -> i32 {
        DEFAULT_MODEL.radian_to_value(radian)
    }

    fn value_to_radian(&self, _id: DeviceId, value: i32) -> f64 {
        DEFAULT_MODEL.value_to_radian(value)
    }

    fn velocity_to_value(&self, _id: DeviceId, velocity: f64) -> i32 {
        DEFAULT_MODEL.velocity_to_value(velocity)
    }

    fn value_to_velocity(&self, _id: DeviceId, value: i32) -> f64 {
        DEFAULT_MODEL.value_to_velocity(value)
    }

    fn current_to_value(&self, _id: DeviceId, current: f64) -> i32 {
        DEFAULT_MODEL.current_to_value(current)
    }

    fn value_to_current(&self, _id: DeviceId, value: i32) -> f64 {
        DEFAULT_MODEL.value_to_current(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_everything() {
        let mut bus = DummyBus::new();
        bus.init("none", 0).unwrap();
        assert_eq!(bus.ping(200).unwrap(), DEFAULT_MODEL.number);
        bus.torque_on(1).unwrap();
        bus.set_velocity_mode(1).unwrap();
        bus.write_item(1, "Nonexistent", 5).unwrap();
    }

    #[test]
    fn handlers_are_distinct_and_reads_zero() {
        let mut bus = DummyBus::new();
        let span = ControlItem::new("span", 126, 10);
        let a = bus.register_batched_read(span).unwrap();
        let b = bus.register_batched_write(span).unwrap();
        assert_ne!(a, b);

        let mut out = [7; 3];
        bus.get_batched_value(a, &[1, 2, 3], span, &mut out).unwrap();
        assert_eq!(out, [0, 0, 0]);
    }
}

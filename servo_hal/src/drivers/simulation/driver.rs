//! Simulation bus implementation.
//!
//! The `SimulatedBus` implements the `ActuatorBus` trait over an in-memory
//! set of servos, for development and testing without physical hardware.
//! Every successful call is journaled and any operation can be made to
//! fail on demand.

use super::journal::{BusEvent, Failure, SimOp};
use super::servo::SimServo;
use servo_common::bus::consts::TORQUE_ENABLE_ITEM;
use servo_common::bus::control_table::{DEFAULT_MODEL, ModelInfo, decode_le};
use servo_common::bus::driver::{ActuatorBus, BusDiagnostics, BusError};
use servo_common::bus::types::{ControlItem, ControlMode, DeviceId, HandlerId, ModelNumber};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tracing::{debug, info, trace};

/// Simulated time that passes on every batched read.
const DEFAULT_TICK: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Read,
    Write,
}

struct Handler {
    span: ControlItem,
    direction: Direction,
    /// Span bytes from the last batched read, per device.
    snapshot: HashMap<DeviceId, Vec<u8>>,
}

/// Simulation bus implementing the `ActuatorBus` trait.
pub struct SimulatedBus {
    servos: BTreeMap<DeviceId, SimServo>,
    /// Model given to unknown ids on ping; `None` makes them absent.
    provision: Option<&'static ModelInfo>,
    initialized: bool,
    handlers: Vec<Handler>,
    journal: Vec<BusEvent>,
    failures: Vec<Failure>,
    /// Items whose batched extraction fails.
    item_failures: Vec<String>,
    tick: Duration,
    diagnostics: BusDiagnostics,
}

impl SimulatedBus {
    /// Empty bus; add devices with [`with_servo`](Self::with_servo).
    pub fn new() -> Self {
        Self {
            servos: BTreeMap::new(),
            provision: None,
            initialized: false,
            handlers: Vec::new(),
            journal: Vec::new(),
            failures: Vec::new(),
            item_failures: Vec::new(),
            tick: DEFAULT_TICK,
            diagnostics: BusDiagnostics::default(),
        }
    }

    /// Bus on which every pinged id answers as `model`.
    pub fn auto_provisioning(model: &'static ModelInfo) -> Self {
        Self {
            provision: Some(model),
            ..Self::new()
        }
    }

    /// Add a servo at `id`.
    pub fn with_servo(mut self, id: DeviceId, model: &'static ModelInfo) -> Self {
        self.add_servo(id, model);
        self
    }

    /// Set the simulated time per batched read.
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Add (or replace) a servo at `id`.
    pub fn add_servo(&mut self, id: DeviceId, model: &'static ModelInfo) {
        self.servos.insert(id, SimServo::new(id, model));
    }

    /// Ids of all simulated servos.
    pub fn servo_ids(&self) -> Vec<DeviceId> {
        self.servos.keys().copied().collect()
    }

    /// Whether the transport is open.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Successful calls so far, oldest first.
    pub fn journal(&self) -> &[BusEvent] {
        &self.journal
    }

    /// Forget recorded calls.
    pub fn clear_journal(&mut self) {
        self.journal.clear();
    }

    /// Number of journaled events matching `pred`.
    pub fn count(&self, pred: impl Fn(&BusEvent) -> bool) -> usize {
        self.journal.iter().filter(|e| pred(e)).count()
    }

    /// Make `op` fail for `id` (or every device when `None`) until cleared.
    pub fn fail(&mut self, op: SimOp, id: Option<DeviceId>) {
        self.failures.push(Failure { op, id });
    }

    /// Make `get_batched_value` fail for the item named `name` only.
    pub fn fail_item(&mut self, name: &str) {
        self.item_failures.push(name.to_string());
    }

    /// Remove all injected failures.
    pub fn clear_failures(&mut self) {
        self.failures.clear();
        self.item_failures.clear();
    }

    /// Raw register value of a servo.
    pub fn register(&self, id: DeviceId, name: &str) -> Option<i32> {
        self.servos.get(&id).and_then(|s| s.read_named(name))
    }

    /// Control mode a servo's registers currently encode.
    pub fn operating_mode(&self, id: DeviceId) -> ControlMode {
        self.servos
            .get(&id)
            .map(SimServo::mode)
            .unwrap_or(ControlMode::Unset)
    }

    /// Whether a servo has torque enabled.
    pub fn torque_enabled(&self, id: DeviceId) -> bool {
        self.servos.get(&id).is_some_and(SimServo::torque_enabled)
    }

    /// Move a servo to `radian` and hold it there.
    pub fn place(&mut self, id: DeviceId, radian: f64) {
        if let Some(servo) = self.servos.get_mut(&id) {
            servo.place(radian);
        }
    }

    fn check(&mut self, op: SimOp, ids: &[DeviceId]) -> Result<(), BusError> {
        if op != SimOp::Init && !self.initialized {
            self.diagnostics.errors += 1;
            return Err(BusError::Transport("port not open".to_string()));
        }
        if self.failures.iter().any(|f| f.matches(op, ids)) {
            self.diagnostics.errors += 1;
            return Err(BusError::Communication(format!(
                "injected {op:?} failure (ids {ids:?})"
            )));
        }
        self.diagnostics.tx_packets += 1;
        Ok(())
    }

    fn record(&mut self, event: BusEvent) {
        trace!("sim: {:?}", event);
        self.diagnostics.rx_packets += 1;
        self.journal.push(event);
    }

    fn servo_mut(&mut self, id: DeviceId) -> Result<&mut SimServo, BusError> {
        match self.servos.get_mut(&id) {
            Some(servo) => Ok(servo),
            None => {
                self.diagnostics.errors += 1;
                Err(no_status(id))
            }
        }
    }

    fn handler(&self, handler: HandlerId, direction: Direction) -> Result<&Handler, BusError> {
        self.handlers
            .get(handler.0)
            .filter(|h| h.direction == direction)
            .ok_or_else(|| BusError::Handler(format!("no {direction:?} handler {handler}")))
    }

    fn model_of(&self, id: DeviceId) -> &'static ModelInfo {
        self.servos.get(&id).map(SimServo::model).unwrap_or(DEFAULT_MODEL)
    }

    fn set_mode(&mut self, id: DeviceId, mode: ControlMode) -> Result<(), BusError> {
        self.check(SimOp::SetMode, &[id])?;
        self.servo_mut(id)?.set_mode(mode)?;
        self.record(BusEvent::SetMode { id, mode });
        Ok(())
    }

    fn set_torque(&mut self, id: DeviceId, enabled: bool) -> Result<(), BusError> {
        let op = if enabled { SimOp::TorqueOn } else { SimOp::TorqueOff };
        self.check(op, &[id])?;
        self.servo_mut(id)?.set_torque(enabled);
        self.record(if enabled {
            BusEvent::TorqueOn { id }
        } else {
            BusEvent::TorqueOff { id }
        });
        Ok(())
    }

    fn register_handler(
        &mut self,
        span: ControlItem,
        direction: Direction,
    ) -> Result<HandlerId, BusError> {
        if self.failures.iter().any(|f| f.matches(SimOp::RegisterHandler, &[])) {
            return Err(BusError::Handler("injected RegisterHandler failure".to_string()));
        }
        let id = HandlerId(self.handlers.len());
        self.handlers.push(Handler {
            span,
            direction,
            snapshot: HashMap::new(),
        });
        debug!(
            "sim: {:?} handler {} for {} @{}+{}",
            direction, id, span.name, span.address, span.length
        );
        Ok(id)
    }
}

impl Default for SimulatedBus {
    fn default() -> Self {
        Self::new()
    }
}

fn no_status(id: DeviceId) -> BusError {
    BusError::Communication(format!("no status packet from id {id}"))
}

impl ActuatorBus for SimulatedBus {
    fn name(&self) -> &'static str {
        "simulation"
    }

    fn init(&mut self, port: &str, baud_rate: u32) -> Result<(), BusError> {
        self.check(SimOp::Init, &[])?;
        self.initialized = true;
        info!(
            "Simulated bus on {} @ {} baud ({} servos)",
            port,
            baud_rate,
            self.servos.len()
        );
        self.record(BusEvent::Init {
            port: port.to_string(),
            baud_rate,
        });
        Ok(())
    }

    fn ping(&mut self, id: DeviceId) -> Result<ModelNumber, BusError> {
        self.check(SimOp::Ping, &[id])?;
        if !self.servos.contains_key(&id) {
            if let Some(model) = self.provision {
                debug!("sim: provisioning {} at id {}", model.name, id);
                self.add_servo(id, model);
            }
        }
        let number = self.servo_mut(id)?.model().number;
        self.record(BusEvent::Ping { id });
        Ok(number)
    }

    fn torque_on(&mut self, id: DeviceId) -> Result<(), BusError> {
        self.set_torque(id, true)
    }

    fn torque_off(&mut self, id: DeviceId) -> Result<(), BusError> {
        self.set_torque(id, false)
    }

    fn set_position_mode(&mut self, id: DeviceId) -> Result<(), BusError> {
        self.set_mode(id, ControlMode::Position)
    }

    fn set_velocity_mode(&mut self, id: DeviceId) -> Result<(), BusError> {
        self.set_mode(id, ControlMode::Velocity)
    }

    fn set_current_based_position_mode(&mut self, id: DeviceId) -> Result<(), BusError> {
        self.set_mode(id, ControlMode::CurrentBasedPosition)
    }

    fn resolve_register(&self, id: DeviceId, item: &str) -> Option<ControlItem> {
        self.servos.get(&id).and_then(|s| s.item(item))
    }

    fn register_batched_write(&mut self, span: ControlItem) -> Result<HandlerId, BusError> {
        self.register_handler(span, Direction::Write)
    }

    fn register_batched_read(&mut self, span: ControlItem) -> Result<HandlerId, BusError> {
        self.register_handler(span, Direction::Read)
    }

    fn batched_write(
        &mut self,
        handler: HandlerId,
        ids: &[DeviceId],
        values: &[i32],
    ) -> Result<(), BusError> {
        self.check(SimOp::BatchedWrite, ids)?;
        let span = self.handler(handler, Direction::Write)?.span;
        if ids.len() != values.len() {
            return Err(BusError::Handler(format!(
                "{} ids but {} values",
                ids.len(),
                values.len()
            )));
        }
        if let Some(missing) = ids.iter().find(|id| !self.servos.contains_key(id)) {
            return Err(no_status(*missing));
        }
        for (&id, &value) in ids.iter().zip(values) {
            self.servo_mut(id)?.write(span, value)?;
        }
        self.record(BusEvent::BatchedWrite {
            handler,
            ids: ids.to_vec(),
            values: values.to_vec(),
        });
        Ok(())
    }

    fn batched_read(&mut self, handler: HandlerId, ids: &[DeviceId]) -> Result<(), BusError> {
        self.check(SimOp::BatchedRead, ids)?;
        let span = self.handler(handler, Direction::Read)?.span;
        let dt = self.tick.as_secs_f64();

        let mut snapshot = HashMap::with_capacity(ids.len());
        for &id in ids {
            let servo = self.servo_mut(id)?;
            servo.step(dt);
            let bytes = servo.bytes(span).ok_or_else(|| {
                BusError::Register(format!(
                    "id {id}: span @{}+{} outside control table",
                    span.address, span.length
                ))
            })?;
            snapshot.insert(id, bytes.to_vec());
        }
        if let Some(h) = self.handlers.get_mut(handler.0) {
            h.snapshot = snapshot;
        }
        self.record(BusEvent::BatchedRead {
            handler,
            ids: ids.to_vec(),
        });
        Ok(())
    }

    fn get_batched_value(
        &self,
        handler: HandlerId,
        ids: &[DeviceId],
        item: ControlItem,
        out: &mut [i32],
    ) -> Result<(), BusError> {
        if self
            .failures
            .iter()
            .any(|f| f.matches(SimOp::GetBatchedValue, ids))
        {
            return Err(BusError::Communication(
                "injected GetBatchedValue failure".to_string(),
            ));
        }
        if self.item_failures.iter().any(|name| name == item.name) {
            return Err(BusError::Communication(format!(
                "injected {} extraction failure",
                item.name
            )));
        }
        let h = self.handler(handler, Direction::Read)?;
        if !h.span.contains(&item) {
            return Err(BusError::Register(format!(
                "{} @{}+{} outside span {}",
                item.name, item.address, item.length, handler
            )));
        }
        if out.len() < ids.len() {
            return Err(BusError::Handler(format!(
                "output holds {} values, {} ids requested",
                out.len(),
                ids.len()
            )));
        }
        let offset = (item.address - h.span.address) as usize;
        let len = item.length as usize;
        for (slot, id) in out.iter_mut().zip(ids) {
            let bytes = h
                .snapshot
                .get(id)
                .ok_or_else(|| BusError::Communication(format!("no data for id {id}")))?;
            *slot = decode_le(&bytes[offset..offset + len]);
        }
        Ok(())
    }

    fn write_item(&mut self, id: DeviceId, item: &str, value: i32) -> Result<(), BusError> {
        self.check(SimOp::WriteItem, &[id])?;
        let servo = self.servo_mut(id)?;
        if item == TORQUE_ENABLE_ITEM {
            servo.set_torque(value != 0);
        } else {
            servo.write_item(item, value)?;
        }
        self.record(BusEvent::WriteItem {
            id,
            item: item.to_string(),
            value,
        });
        Ok(())
    }

    fn radian_to_value(&self, id: DeviceId, radian: f64) -> i32 {
        self.model_of(id).radian_to_value(radian)
    }

    fn value_to_radian(&self, id: DeviceId, value: i32) -> f64 {
        self.model_of(id).value_to_radian(value)
    }

    fn velocity_to_value(&self, id: DeviceId, velocity: f64) -> i32 {
        self.model_of(id).velocity_to_value(velocity)
    }

    fn value_to_velocity(&self, id: DeviceId, value: i32) -> f64 {
        self.model_of(id).value_to_velocity(value)
    }

    fn current_to_value(&self, id: DeviceId, current: f64) -> i32 {
        self.model_of(id).current_to_value(current)
    }

    fn value_to_current(&self, id: DeviceId, value: i32) -> f64 {
        self.model_of(id).value_to_current(value)
    }

    fn shutdown(&mut self) -> Result<(), BusError> {
        self.initialized = false;
        info!("Simulated bus closed");
        Ok(())
    }

    fn diagnostics(&self) -> Option<BusDiagnostics> {
        let modes: serde_json::Map<String, serde_json::Value> = self
            .servos
            .iter()
            .map(|(id, s)| (id.to_string(), s.mode().to_string().into()))
            .collect();
        Some(BusDiagnostics {
            custom: Some(serde_json::json!({ "modes": modes }).to_string()),
            ..self.diagnostics.clone()
        })
    }
}

//! Protocol 2.0 bus implementation.

use super::packet::{self, HEADER, MAX_PACKET_LEN, PREFIX_LEN, PacketBuf, Status};
use super::port::Port;
use servo_common::bus::consts::*;
use servo_common::bus::control_table::{
    DEFAULT_MODEL, ModeSelect, ModelInfo, decode_le, encode_le, lookup_model,
    operating_mode_value,
};
use servo_common::bus::driver::{ActuatorBus, BusDiagnostics, BusError};
use servo_common::bus::types::{ControlItem, ControlMode, DeviceId, HandlerId, ModelNumber};
use servo_common::consts::DEFAULT_TIMEOUT_MS;
use serialport::SerialPort;
use std::collections::HashMap;
use std::io::{self, Read};
use std::time::Duration;
use tracing::{debug, info, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Read,
    Write,
}

struct Handler {
    span: ControlItem,
    direction: Direction,
    /// Span bytes from the last sync read, per device.
    data: HashMap<DeviceId, Vec<u8>>,
}

/// Dynamixel Protocol 2.0 bus over a byte transport.
pub struct Protocol2Bus<P: Port = Box<dyn SerialPort>> {
    port: Option<P>,
    timeout: Duration,
    /// Models discovered at ping.
    models: HashMap<DeviceId, &'static ModelInfo>,
    handlers: Vec<Handler>,
    diagnostics: BusDiagnostics,
}

impl Protocol2Bus {
    /// Driver that opens a serial port on `init`.
    pub fn new() -> Self {
        Self::detached()
    }
}

impl Default for Protocol2Bus {
    fn default() -> Self {
        Self::new()
    }
}

/// Factory function to create a Protocol 2.0 serial bus instance.
pub fn create_driver() -> Box<dyn ActuatorBus> {
    Box::new(Protocol2Bus::new())
}

impl<P: Port> Protocol2Bus<P> {
    fn detached() -> Self {
        Self {
            port: None,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            models: HashMap::new(),
            handlers: Vec::new(),
            diagnostics: BusDiagnostics::default(),
        }
    }

    /// Driver over an already open transport; `init` keeps it.
    pub fn with_port(port: P) -> Self {
        Self {
            port: Some(port),
            ..Self::detached()
        }
    }

    /// The attached transport.
    pub fn port(&self) -> Option<&P> {
        self.port.as_ref()
    }

    /// The attached transport, mutably.
    pub fn port_mut(&mut self) -> Option<&mut P> {
        self.port.as_mut()
    }

    /// Model cached for `id` at ping.
    pub fn model(&self, id: DeviceId) -> Option<&'static ModelInfo> {
        self.models.get(&id).copied()
    }

    fn open_port(&mut self) -> Result<&mut P, BusError> {
        self.port
            .as_mut()
            .ok_or_else(|| BusError::Transport("port not open".to_string()))
    }

    /// Count the outcome of one transaction.
    fn tally<T>(&mut self, result: Result<T, BusError>) -> Result<T, BusError> {
        if result.is_err() {
            self.diagnostics.errors += 1;
        }
        result
    }

    fn send(&mut self, packet: &[u8]) -> Result<(), BusError> {
        let port = self.open_port()?;
        port.clear_input().map_err(comm_error)?;
        port.write_all(packet).map_err(comm_error)?;
        port.flush().map_err(comm_error)?;
        trace!("tx {:02X?}", packet);
        self.diagnostics.tx_packets += 1;
        Ok(())
    }

    fn receive(&mut self, expected: DeviceId) -> Result<Status, BusError> {
        let port = self.open_port()?;
        let frame = read_frame(port).map_err(|e| match e.kind() {
            io::ErrorKind::TimedOut => no_status(expected),
            _ => comm_error(e),
        })?;
        trace!("rx {:02X?}", frame.as_slice());
        let status = packet::parse_status(&frame)?;
        if status.id != expected {
            return Err(BusError::Communication(format!(
                "status from id {} while waiting for id {}",
                status.id, expected
            )));
        }
        self.diagnostics.rx_packets += 1;
        status.check()?;
        Ok(status)
    }

    /// Send `packet` and wait for the status of `id`.
    fn transact(&mut self, packet: &[u8], id: DeviceId) -> Result<Status, BusError> {
        let result = self.send(packet).and_then(|()| self.receive(id));
        self.tally(result)
    }

    fn model_of(&self, id: DeviceId) -> &'static ModelInfo {
        self.model(id).unwrap_or(DEFAULT_MODEL)
    }

    fn known_model(&self, id: DeviceId) -> Result<&'static ModelInfo, BusError> {
        self.model(id)
            .ok_or_else(|| BusError::Communication(format!("id {id} has not been pinged")))
    }

    fn write_register(&mut self, id: DeviceId, item: ControlItem, value: i32) -> Result<(), BusError> {
        let mut data = [0u8; 4];
        let bytes = data
            .get_mut(..item.length as usize)
            .ok_or_else(|| BusError::Register(format!("{}: length {}", item.name, item.length)))?;
        encode_le(value, bytes);
        let packet = packet::write(id, item.address, bytes)?;
        self.transact(&packet, id).map(|_| ())
    }

    fn set_mode(&mut self, id: DeviceId, mode: ControlMode) -> Result<(), BusError> {
        let model = self.known_model(id)?;
        let unsupported = || BusError::Unsupported(format!("id {id} ({}): {mode} mode", model.name));
        match model.mode_select {
            ModeSelect::OperatingMode => {
                let value = operating_mode_value(mode).ok_or_else(unsupported)?;
                self.write_item(id, OPERATING_MODE_ITEM, value as i32)
            }
            ModeSelect::AngleLimits => match mode {
                ControlMode::Velocity => {
                    self.write_item(id, CW_ANGLE_LIMIT_ITEM, 0)?;
                    self.write_item(id, CCW_ANGLE_LIMIT_ITEM, 0)
                }
                ControlMode::Position => {
                    self.write_item(id, CW_ANGLE_LIMIT_ITEM, model.scale.min_position)?;
                    self.write_item(id, CCW_ANGLE_LIMIT_ITEM, model.scale.max_position)
                }
                _ => Err(unsupported()),
            },
        }
    }

    fn handler(&self, handler: HandlerId, direction: Direction) -> Result<&Handler, BusError> {
        self.handlers
            .get(handler.0)
            .filter(|h| h.direction == direction)
            .ok_or_else(|| BusError::Handler(format!("no {direction:?} handler {handler}")))
    }

    fn register_handler(&mut self, span: ControlItem, direction: Direction) -> HandlerId {
        let id = HandlerId(self.handlers.len());
        self.handlers.push(Handler {
            span,
            direction,
            data: HashMap::new(),
        });
        debug!(
            "{:?} handler {} for {} @{}+{}",
            direction, id, span.name, span.address, span.length
        );
        id
    }

    fn sync_read(&mut self, handler: HandlerId, ids: &[DeviceId]) -> Result<(), BusError> {
        let span = self.handler(handler, Direction::Read)?.span;
        let packet = packet::sync_read(span.address, span.length, ids)?;
        self.send(&packet)?;

        let mut data = HashMap::with_capacity(ids.len());
        for &id in ids {
            let status = self.receive(id)?;
            if status.params.len() != span.length as usize {
                return Err(BusError::Communication(format!(
                    "id {}: {} bytes for a {}-byte span",
                    id,
                    status.params.len(),
                    span.length
                )));
            }
            data.insert(id, status.params.to_vec());
        }
        if let Some(h) = self.handlers.get_mut(handler.0) {
            h.data = data;
        }
        Ok(())
    }

    fn sync_write(
        &mut self,
        handler: HandlerId,
        ids: &[DeviceId],
        values: &[i32],
    ) -> Result<(), BusError> {
        let span = self.handler(handler, Direction::Write)?.span;
        if ids.len() != values.len() {
            return Err(BusError::Handler(format!(
                "{} ids but {} values",
                ids.len(),
                values.len()
            )));
        }
        let width = span.length as usize;
        let mut data = PacketBuf::new();
        for &value in values {
            let mut record = [0u8; 4];
            let bytes = record.get_mut(..width).ok_or_else(|| {
                BusError::Register(format!("{}: length {}", span.name, span.length))
            })?;
            encode_le(value, bytes);
            data.extend_from_slice(bytes).map_err(|_| {
                BusError::Communication(format!("packet exceeds {MAX_PACKET_LEN} bytes"))
            })?;
        }
        let packet = packet::sync_write(span.address, span.length, ids, &data)?;
        // No status follows a broadcast.
        self.send(&packet)
    }
}

fn comm_error(e: io::Error) -> BusError {
    BusError::Communication(e.to_string())
}

fn no_status(id: DeviceId) -> BusError {
    BusError::Communication(format!("no status packet from id {id}"))
}

/// Read one frame, discarding bytes until a header appears.
fn read_frame<R: Read + ?Sized>(port: &mut R) -> io::Result<PacketBuf> {
    let mut window = [0u8; 4];
    let mut byte = [0u8; 1];
    let mut skipped = 0usize;
    loop {
        port.read_exact(&mut byte)?;
        window.rotate_left(1);
        window[3] = byte[0];
        if window == HEADER {
            break;
        }
        skipped += 1;
        if skipped > MAX_PACKET_LEN {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "no packet header"));
        }
    }

    let mut prefix = [0u8; 3];
    port.read_exact(&mut prefix)?;
    let len = u16::from_le_bytes([prefix[1], prefix[2]]) as usize;
    if PREFIX_LEN + len > MAX_PACKET_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("status length {len} too large"),
        ));
    }

    let mut frame = PacketBuf::new();
    let mut body = [0u8; MAX_PACKET_LEN];
    port.read_exact(&mut body[..len])?;
    for part in [&HEADER[..], &prefix[..], &body[..len]] {
        frame
            .extend_from_slice(part)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "frame overflow"))?;
    }
    Ok(frame)
}

impl<P: Port> ActuatorBus for Protocol2Bus<P> {
    fn name(&self) -> &'static str {
        "protocol2"
    }

    fn init(&mut self, port: &str, baud_rate: u32) -> Result<(), BusError> {
        if self.port.is_some() {
            debug!("Transport already attached, skipping open of {}", port);
            return Ok(());
        }
        let opened = P::open(port, baud_rate, self.timeout)
            .map_err(|e| BusError::Transport(format!("{port} @ {baud_rate}: {e}")))?;
        self.port = Some(opened);
        info!("Opened {} @ {} baud", port, baud_rate);
        Ok(())
    }

    fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
        if let Some(port) = self.port.as_mut() {
            if let Err(e) = port.set_timeout(timeout) {
                warn!("Failed to apply timeout {:?}: {}", timeout, e);
            }
        }
    }

    fn ping(&mut self, id: DeviceId) -> Result<ModelNumber, BusError> {
        let packet = packet::ping(id)?;
        let status = self.transact(&packet, id)?;
        let number = match status.params.as_slice() {
            [lo, hi, ..] => u16::from_le_bytes([*lo, *hi]),
            _ => {
                return Err(BusError::Communication(format!(
                    "id {id}: ping status carries no model number"
                )));
            }
        };
        let model = lookup_model(number)
            .ok_or_else(|| BusError::Unsupported(format!("id {id}: unknown model {number}")))?;
        if model.protocol != 2 {
            return Err(BusError::Unsupported(format!(
                "id {id}: {} speaks protocol {}",
                model.name, model.protocol
            )));
        }
        debug!("id {}: {} (model {})", id, model.name, number);
        self.models.insert(id, model);
        Ok(number)
    }

    fn torque_on(&mut self, id: DeviceId) -> Result<(), BusError> {
        self.write_item(id, TORQUE_ENABLE_ITEM, 1)
    }

    fn torque_off(&mut self, id: DeviceId) -> Result<(), BusError> {
        self.write_item(id, TORQUE_ENABLE_ITEM, 0)
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
        self.model(id).and_then(|m| m.item(item))
    }

    fn register_batched_write(&mut self, span: ControlItem) -> Result<HandlerId, BusError> {
        Ok(self.register_handler(span, Direction::Write))
    }

    fn register_batched_read(&mut self, span: ControlItem) -> Result<HandlerId, BusError> {
        Ok(self.register_handler(span, Direction::Read))
    }

    fn batched_write(
        &mut self,
        handler: HandlerId,
        ids: &[DeviceId],
        values: &[i32],
    ) -> Result<(), BusError> {
        let result = self.sync_write(handler, ids, values);
        self.tally(result)
    }

    fn batched_read(&mut self, handler: HandlerId, ids: &[DeviceId]) -> Result<(), BusError> {
        let result = self.sync_read(handler, ids);
        self.tally(result)
    }

    fn get_batched_value(
        &self,
        handler: HandlerId,
        ids: &[DeviceId],
        item: ControlItem,
        out: &mut [i32],
    ) -> Result<(), BusError> {
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
        let range = offset..offset + item.length as usize;
        for (slot, id) in out.iter_mut().zip(ids) {
            let bytes = h
                .data
                .get(id)
                .and_then(|d| d.get(range.clone()))
                .ok_or_else(|| BusError::Communication(format!("no data for id {id}")))?;
            *slot = decode_le(bytes);
        }
        Ok(())
    }

    fn write_item(&mut self, id: DeviceId, item: &str, value: i32) -> Result<(), BusError> {
        let register = self
            .known_model(id)?
            .item(item)
            .ok_or_else(|| BusError::Register(format!("id {id}: no item '{item}'")))?;
        self.write_register(id, register, value)
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
        if let Some(port) = self.port.take() {
            info!(
                "Closed {}",
                port.label().unwrap_or_else(|| "transport".to_string())
            );
        }
        Ok(())
    }

    fn diagnostics(&self) -> Option<BusDiagnostics> {
        let models: serde_json::Map<String, serde_json::Value> = self
            .models
            .iter()
            .map(|(id, m)| (id.to_string(), m.name.into()))
            .collect();
        let custom = serde_json::json!({
            "port": self.port.as_ref().and_then(|p| p.label()),
            "models": models,
        });
        Some(BusDiagnostics {
            custom: Some(custom.to_string()),
            ..self.diagnostics.clone()
        })
    }
}

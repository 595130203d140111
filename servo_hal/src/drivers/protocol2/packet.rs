//! Protocol 2.0 packet framing.
//!
//! ```text
//! FF FF FD 00 | ID | LEN_L LEN_H | INST | PARAM... | CRC_L CRC_H
//! ```
//!
//! `LEN` counts the instruction, the (stuffed) parameters and the CRC.
//! Any `FF FF FD` inside the instruction/parameter region is followed by an
//! extra `FD` on the wire.

use crc_any::CRCu16;
use servo_common::bus::driver::BusError;
use servo_common::bus::types::DeviceId;
use tracing::warn;

/// Packet header.
pub const HEADER: [u8; 4] = [0xFF, 0xFF, 0xFD, 0x00];

/// Largest packet the driver sends or accepts.
pub const MAX_PACKET_LEN: usize = 1024;

/// Fixed-capacity packet buffer.
pub type PacketBuf = heapless::Vec<u8, MAX_PACKET_LEN>;

/// Header + id + length field.
pub const PREFIX_LEN: usize = 7;

/// Ping.
pub const INST_PING: u8 = 0x01;
/// Read.
pub const INST_READ: u8 = 0x02;
/// Write.
pub const INST_WRITE: u8 = 0x03;
/// Status (reply).
pub const INST_STATUS: u8 = 0x55;
/// Sync read.
pub const INST_SYNC_READ: u8 = 0x82;
/// Sync write.
pub const INST_SYNC_WRITE: u8 = 0x83;

/// Id addressing every device.
pub const BROADCAST: DeviceId = 0xFE;

/// Alert bit of the status error byte; informational only.
const ERROR_ALERT: u8 = 0x80;

/// CRC-16 (poly 0x8005, init 0, unreflected).
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc = CRCu16::create_crc(0x8005, 16, 0, 0, false);
    crc.digest(data);
    crc.get_crc()
}

fn overflow() -> BusError {
    BusError::Communication(format!("packet exceeds {MAX_PACKET_LEN} bytes"))
}

/// Append `data` to `out`, inserting `FD` after every `FF FF FD`.
fn stuff_into(data: &[u8], out: &mut PacketBuf) -> Result<(), BusError> {
    for (i, &b) in data.iter().enumerate() {
        out.push(b).map_err(|_| overflow())?;
        if i >= 2 && data[i - 2..=i] == [0xFF, 0xFF, 0xFD] {
            out.push(0xFD).map_err(|_| overflow())?;
        }
    }
    Ok(())
}

/// Inverse of [`stuff_into`].
fn unstuff(data: &[u8]) -> Result<PacketBuf, BusError> {
    let mut out = PacketBuf::new();
    let mut skip = false;
    for &b in data {
        if skip {
            skip = false;
            if b == 0xFD {
                continue;
            }
        }
        out.push(b).map_err(|_| overflow())?;
        if out.ends_with(&[0xFF, 0xFF, 0xFD]) {
            skip = true;
        }
    }
    Ok(out)
}

/// Frame an instruction packet.
pub fn build(id: DeviceId, inst: u8, params: &[u8]) -> Result<PacketBuf, BusError> {
    let mut packet = PacketBuf::new();
    packet.extend_from_slice(&HEADER).map_err(|_| overflow())?;
    // Id and length placeholder.
    packet.extend_from_slice(&[id, 0, 0]).map_err(|_| overflow())?;
    packet.push(inst).map_err(|_| overflow())?;
    stuff_into(params, &mut packet)?;

    let len = (packet.len() - PREFIX_LEN + 2) as u16;
    packet[5..7].copy_from_slice(&len.to_le_bytes());
    let crc = crc16(&packet);
    packet.extend_from_slice(&crc.to_le_bytes()).map_err(|_| overflow())?;
    Ok(packet)
}

/// PING one device.
pub fn ping(id: DeviceId) -> Result<PacketBuf, BusError> {
    build(id, INST_PING, &[])
}

/// READ `length` bytes at `address`.
pub fn read(id: DeviceId, address: u16, length: u16) -> Result<PacketBuf, BusError> {
    let [a0, a1] = address.to_le_bytes();
    let [l0, l1] = length.to_le_bytes();
    build(id, INST_READ, &[a0, a1, l0, l1])
}

/// WRITE `data` at `address`.
pub fn write(id: DeviceId, address: u16, data: &[u8]) -> Result<PacketBuf, BusError> {
    let mut params = PacketBuf::new();
    params
        .extend_from_slice(&address.to_le_bytes())
        .map_err(|_| overflow())?;
    params.extend_from_slice(data).map_err(|_| overflow())?;
    build(id, INST_WRITE, &params)
}

/// SYNC_READ the same span from several devices.
pub fn sync_read(address: u16, length: u16, ids: &[DeviceId]) -> Result<PacketBuf, BusError> {
    let mut params = PacketBuf::new();
    params
        .extend_from_slice(&address.to_le_bytes())
        .map_err(|_| overflow())?;
    params
        .extend_from_slice(&length.to_le_bytes())
        .map_err(|_| overflow())?;
    params.extend_from_slice(ids).map_err(|_| overflow())?;
    build(BROADCAST, INST_SYNC_READ, &params)
}

/// SYNC_WRITE one `length`-byte record per device; `data` holds the records
/// back to back in id order.
pub fn sync_write(
    address: u16,
    length: u16,
    ids: &[DeviceId],
    data: &[u8],
) -> Result<PacketBuf, BusError> {
    let chunk = length as usize;
    if data.len() != ids.len() * chunk {
        return Err(BusError::Handler(format!(
            "{} data bytes for {} ids of {} bytes",
            data.len(),
            ids.len(),
            chunk
        )));
    }
    let mut params = PacketBuf::new();
    params
        .extend_from_slice(&address.to_le_bytes())
        .map_err(|_| overflow())?;
    params
        .extend_from_slice(&length.to_le_bytes())
        .map_err(|_| overflow())?;
    for (&id, record) in ids.iter().zip(data.chunks(chunk.max(1))) {
        params.push(id).map_err(|_| overflow())?;
        params.extend_from_slice(record).map_err(|_| overflow())?;
    }
    build(BROADCAST, INST_SYNC_WRITE, &params)
}

/// Decoded status packet.
#[derive(Debug, Clone, PartialEq)]
pub struct Status {
    /// Responding device.
    pub id: DeviceId,
    /// Error byte.
    pub error: u8,
    /// Unstuffed parameters.
    pub params: PacketBuf,
}

impl Status {
    /// Map the error byte onto a `BusError`; the alert bit only warns.
    pub fn check(&self) -> Result<(), BusError> {
        if self.error & ERROR_ALERT != 0 {
            warn!("id {}: hardware alert flagged in status", self.id);
        }
        let reason = match self.error & !ERROR_ALERT {
            0 => return Ok(()),
            1 => "result fail",
            2 => "instruction error",
            3 => "crc error",
            4 => "data range error",
            5 => "data length error",
            6 => "data limit error",
            7 => "access error",
            _ => "unknown error",
        };
        Err(BusError::Device(format!(
            "id {}: {} (0x{:02X})",
            self.id, reason, self.error
        )))
    }
}

/// Validate and decode a complete status frame.
pub fn parse_status(frame: &[u8]) -> Result<Status, BusError> {
    let bad = |what: &str| BusError::Communication(format!("malformed status: {what}"));

    if frame.len() < PREFIX_LEN + 4 || frame[..4] != HEADER {
        return Err(bad("short frame or bad header"));
    }
    let len = u16::from_le_bytes([frame[5], frame[6]]) as usize;
    if frame.len() != PREFIX_LEN + len {
        return Err(bad("length mismatch"));
    }
    let (body, crc) = frame.split_at(frame.len() - 2);
    let expected = u16::from_le_bytes([crc[0], crc[1]]);
    let actual = crc16(body);
    if expected != actual {
        return Err(BusError::Communication(format!(
            "crc mismatch: got 0x{expected:04X}, computed 0x{actual:04X}"
        )));
    }
    if body[PREFIX_LEN] != INST_STATUS {
        return Err(bad("not a status packet"));
    }
    let payload = unstuff(&body[PREFIX_LEN + 1..])?;
    let (&error, params) = payload.split_first().ok_or_else(|| bad("missing error byte"))?;
    let params = PacketBuf::from_slice(params).map_err(|_| overflow())?;
    Ok(Status {
        id: frame[4],
        error,
        params,
    })
}

/// Frame a status packet; what a device would send back.
#[cfg(test)]
pub(crate) fn status(id: DeviceId, error: u8, params: &[u8]) -> PacketBuf {
    let mut payload = PacketBuf::new();
    payload.push(error).unwrap();
    payload.extend_from_slice(params).unwrap();
    build(id, INST_STATUS, &payload).unwrap()
}

//! Record of bus traffic and injectable failures.

use servo_common::bus::types::{ControlMode, DeviceId, HandlerId};

/// One successful bus call, as seen by the simulated devices.
#[derive(Debug, Clone, PartialEq)]
pub enum BusEvent {
    /// Transport opened.
    Init {
        /// Port name passed to `init`.
        port: String,
        /// Baud rate passed to `init`.
        baud_rate: u32,
    },
    /// Device pinged.
    Ping {
        /// Device id.
        id: DeviceId,
    },
    /// Torque enabled.
    TorqueOn {
        /// Device id.
        id: DeviceId,
    },
    /// Torque disabled.
    TorqueOff {
        /// Device id.
        id: DeviceId,
    },
    /// Control mode selected.
    SetMode {
        /// Device id.
        id: DeviceId,
        /// Selected mode.
        mode: ControlMode,
    },
    /// Single register written.
    WriteItem {
        /// Device id.
        id: DeviceId,
        /// Register name.
        item: String,
        /// Raw value.
        value: i32,
    },
    /// Batched write issued.
    BatchedWrite {
        /// Write handler.
        handler: HandlerId,
        /// Target devices.
        ids: Vec<DeviceId>,
        /// Raw values, one per id.
        values: Vec<i32>,
    },
    /// Batched read issued.
    BatchedRead {
        /// Read handler.
        handler: HandlerId,
        /// Polled devices.
        ids: Vec<DeviceId>,
    },
}

impl BusEvent {
    /// Device id for single-device events.
    pub fn id(&self) -> Option<DeviceId> {
        match self {
            BusEvent::Ping { id }
            | BusEvent::TorqueOn { id }
            | BusEvent::TorqueOff { id }
            | BusEvent::SetMode { id, .. }
            | BusEvent::WriteItem { id, .. } => Some(*id),
            _ => None,
        }
    }
}

/// Bus operation that a test can make fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimOp {
    /// `init`
    Init,
    /// `ping`
    Ping,
    /// `torque_on`
    TorqueOn,
    /// `torque_off`
    TorqueOff,
    /// Any `set_*_mode`
    SetMode,
    /// `write_item`
    WriteItem,
    /// `register_batched_read` / `register_batched_write`
    RegisterHandler,
    /// `batched_write`
    BatchedWrite,
    /// `batched_read`
    BatchedRead,
    /// `get_batched_value`
    GetBatchedValue,
}

/// Injected failure; `id: None` matches every device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Failure {
    pub(crate) op: SimOp,
    pub(crate) id: Option<DeviceId>,
}

impl Failure {
    pub(crate) fn matches(&self, op: SimOp, ids: &[DeviceId]) -> bool {
        self.op == op
            && match self.id {
                None => true,
                Some(id) => ids.contains(&id),
            }
    }
}

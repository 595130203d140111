//! Dynamixel Protocol 2.0 driver.
//!
//! Speaks the packet protocol over a serial port: one transaction per
//! single-device call, `SYNC_WRITE` for batched writes (no reply) and
//! `SYNC_READ` for batched reads (one status per device, in id order).
//! Device models are discovered at ping and drive register resolution and
//! unit conversion from then on.

mod driver;
pub mod packet;
mod port;

pub use driver::{Protocol2Bus, create_driver};
pub use port::Port;

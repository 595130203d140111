//! Byte transport under the Protocol 2.0 driver.

use serialport::{ClearBuffer, SerialPort};
use std::io::{self, Read, Write};
use std::time::Duration;

/// Half-duplex byte stream to the servo bus.
///
/// Reads must return [`io::ErrorKind::TimedOut`] once the timeout elapses
/// without data.
pub trait Port: Read + Write + Send {
    /// Open the transport at `path`.
    fn open(path: &str, baud_rate: u32, timeout: Duration) -> io::Result<Self>
    where
        Self: Sized;

    /// Drop any unread input.
    fn clear_input(&mut self) -> io::Result<()>;

    /// Change the read timeout.
    fn set_timeout(&mut self, timeout: Duration) -> io::Result<()>;

    /// Name of the underlying device, if any.
    fn label(&self) -> Option<String> {
        None
    }
}

impl Port for Box<dyn SerialPort> {
    fn open(path: &str, baud_rate: u32, timeout: Duration) -> io::Result<Self> {
        serialport::new(path, baud_rate)
            .timeout(timeout)
            .open()
            .map_err(io::Error::from)
    }

    fn clear_input(&mut self) -> io::Result<()> {
        SerialPort::clear(self.as_ref(), ClearBuffer::Input).map_err(io::Error::from)
    }

    fn set_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        SerialPort::set_timeout(self.as_mut(), timeout).map_err(io::Error::from)
    }

    fn label(&self) -> Option<String> {
        SerialPort::name(self.as_ref())
    }
}

//! Serial bus access
//!
//! The bus is a single half-duplex RS-485 style line shared by every node.
//! At most one exchange may be in flight; every operation that touches the
//! bus therefore takes it by `&mut` or by value.
//!
//! - [`Bus`] trait for the byte-level operations the protocol needs
//! - [`SerialBus`] for a real port via `serialport`
//! - [`MockBus`] for testing
//!
pub mod mock_bus;
pub mod serial;

use std::time::Duration;
use thiserror::Error;

pub use mock_bus::MockBus;
pub use serial::{list_ports, PortInfo, SerialBus, DEFAULT_BAUD_RATE};

/// Channel-level failure; fatal for the operation that hit it
#[derive(Debug, Error)]
pub enum BusError {
    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),
    #[error("bus I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("bus channel is closed")]
    Closed,
}

/// Result type for bus operations
pub type Result<T> = std::result::Result<T, BusError>;

/// Byte-level access to the shared bus
pub trait Bus: Send {
    /// Discards anything waiting in the receive buffer.
    fn clear_input(&mut self) -> Result<()>;

    fn write_all(&mut self, bytes: &[u8]) -> Result<()>;

    fn flush(&mut self) -> Result<()>;

    /// Waits up to the current timeout for one byte. `None` means nothing arrived.
    fn read_byte(&mut self) -> Result<Option<u8>>;

    fn set_timeout(&mut self, timeout: Duration) -> Result<()>;

    fn timeout(&self) -> Duration;
}

/// Runs `f` with the bus timeout temporarily set to `timeout`.
pub fn with_timeout<B, T, F>(bus: &mut B, timeout: Duration, f: F) -> Result<T>
where
    B: Bus + ?Sized,
    F: FnOnce(&mut B) -> Result<T>,
{
    let previous = bus.timeout();
    if previous != timeout {
        bus.set_timeout(timeout)?;
    }
    let result = f(bus);
    if previous != timeout {
        bus.set_timeout(previous)?;
    }
    result
}

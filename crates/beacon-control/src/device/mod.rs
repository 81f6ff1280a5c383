//! USB-serial DMX bridge access
//!
//! The session never talks to the OS directly. It goes through two seams:
//! - [`DeviceLocator`] enumerates bridges and opens one by serial number
//! - [`DmxLink`] is an open bridge handle
//!
//! [`serial::SerialLocator`] implements both on top of the host's serial
//! ports, [`mock::MockLocator`] is a scriptable stand-in for tests.

pub mod mock;
pub mod serial;
pub mod session;
pub mod transmitter;

pub use serialport::{DataBits, FlowControl, Parity, StopBits};

pub use mock::MockLocator;
pub use serial::SerialLocator;
pub use session::{ConnectionEvent, DeviceSession, SessionSettings, SessionState, SessionStatus};

use std::time::Duration;

use crate::Result;

/// Baud rate the bridge is configured with after opening
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// A bridge visible to the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// USB serial number, the identifier the session targets
    pub serial_number: String,
    /// OS-level port path (e.g. `/dev/ttyUSB0`, `COM3`)
    pub port_name: String,
    /// USB product string, when the OS reports one
    pub description: Option<String>,
}

/// Which bridge buffer to purge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Purge {
    Transmit,
    Receive,
}

/// Line settings applied to a freshly opened bridge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkSettings {
    pub baud_rate: u32,
    pub data_bits: DataBits,
    pub stop_bits: StopBits,
    pub parity: Parity,
    pub flow_control: FlowControl,
}

impl Default for LinkSettings {
    fn default() -> Self {
        // DMX512 framing: 8 data bits, 2 stop bits, no parity
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            data_bits: DataBits::Eight,
            stop_bits: StopBits::Two,
            parity: Parity::None,
            flow_control: FlowControl::None,
        }
    }
}

/// Enumerates and opens DMX bridges
pub trait DeviceLocator: Send + Sync {
    /// List the bridges currently attached to the host
    fn enumerate(&self) -> Result<Vec<DeviceInfo>>;

    /// Open a bridge returned by [`DeviceLocator::enumerate`]
    fn open(&self, device: &DeviceInfo) -> Result<Box<dyn DmxLink>>;
}

/// An open bridge handle
pub trait DmxLink: Send {
    fn reset(&mut self) -> Result<()>;

    fn set_baud_rate(&mut self, baud_rate: u32) -> Result<()>;

    fn set_data_characteristics(
        &mut self,
        data_bits: DataBits,
        stop_bits: StopBits,
        parity: Parity,
    ) -> Result<()>;

    fn set_flow_control(&mut self, flow_control: FlowControl) -> Result<()>;

    fn purge(&mut self, buffer: Purge) -> Result<()>;

    /// Write `bytes` completely or fail
    fn send(&mut self, bytes: &[u8]) -> Result<()>;

    /// Flush and release the handle
    fn close(&mut self) -> Result<()>;
}

/// Write timeout used when opening real ports
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_millis(250);

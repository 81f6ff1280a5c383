//! Bridges exposed as USB serial ports
//!
//! FTDI-based DMX interfaces show up as virtual COM ports. Only ports that
//! report a USB serial number are considered, since that number is what the
//! session targets across reconnects.

use serialport::{ClearBuffer, SerialPort, SerialPortType};
use std::io::Write;
use std::time::Duration;
use tracing::{debug, info};

use super::{
    DataBits, DeviceInfo, DeviceLocator, DmxLink, FlowControl, Parity, Purge, StopBits,
    DEFAULT_BAUD_RATE, DEFAULT_WRITE_TIMEOUT,
};
use crate::{error::ControlError, Result};

/// Locator backed by `serialport::available_ports`
#[derive(Debug, Clone)]
pub struct SerialLocator {
    write_timeout: Duration,
}

impl SerialLocator {
    pub fn new() -> Self {
        Self {
            write_timeout: DEFAULT_WRITE_TIMEOUT,
        }
    }

    /// Bound on a single frame write before it counts as failed
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }
}

impl Default for SerialLocator {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceLocator for SerialLocator {
    fn enumerate(&self) -> Result<Vec<DeviceInfo>> {
        let ports = serialport::available_ports()
            .map_err(|e| ControlError::EnumerationError(e.to_string()))?;

        let devices: Vec<DeviceInfo> = ports
            .into_iter()
            .filter_map(|port| match port.port_type {
                SerialPortType::UsbPort(usb) => usb.serial_number.map(|serial| DeviceInfo {
                    serial_number: serial,
                    port_name: port.port_name,
                    description: usb.product,
                }),
                _ => None,
            })
            .collect();

        debug!("Enumerated {} USB serial bridge(s)", devices.len());
        Ok(devices)
    }

    fn open(&self, device: &DeviceInfo) -> Result<Box<dyn DmxLink>> {
        let port = serialport::new(&device.port_name, DEFAULT_BAUD_RATE)
            .timeout(self.write_timeout)
            .open()
            .map_err(|e| ControlError::DeviceOpenError {
                serial: device.serial_number.clone(),
                reason: e.to_string(),
            })?;

        info!(
            "Opened bridge {} on {}",
            device.serial_number, device.port_name
        );

        Ok(Box::new(SerialLink { port }))
    }
}

/// An open serial bridge
pub struct SerialLink {
    port: Box<dyn SerialPort>,
}

impl DmxLink for SerialLink {
    fn reset(&mut self) -> Result<()> {
        self.port.clear(ClearBuffer::All)?;
        self.port.clear_break()?;
        Ok(())
    }

    fn set_baud_rate(&mut self, baud_rate: u32) -> Result<()> {
        self.port.set_baud_rate(baud_rate)?;
        Ok(())
    }

    fn set_data_characteristics(
        &mut self,
        data_bits: DataBits,
        stop_bits: StopBits,
        parity: Parity,
    ) -> Result<()> {
        self.port.set_data_bits(data_bits)?;
        self.port.set_stop_bits(stop_bits)?;
        self.port.set_parity(parity)?;
        Ok(())
    }

    fn set_flow_control(&mut self, flow_control: FlowControl) -> Result<()> {
        self.port.set_flow_control(flow_control)?;
        Ok(())
    }

    fn purge(&mut self, buffer: Purge) -> Result<()> {
        let buffer = match buffer {
            Purge::Transmit => ClearBuffer::Output,
            Purge::Receive => ClearBuffer::Input,
        };
        self.port.clear(buffer)?;
        Ok(())
    }

    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        self.port
            .write_all(bytes)
            .map_err(|e| ControlError::DeviceWriteError(e.to_string()))
    }

    fn close(&mut self) -> Result<()> {
        self.port
            .flush()
            .map_err(|e| ControlError::DeviceCloseError(e.to_string()))
    }
}

//! In-memory bridge for tests
//!
//! `MockLocator` is cheap to clone; every clone and every link it opens
//! share one state, so a test can keep a handle, plug and unplug devices,
//! inject failures and inspect the frames written by the session.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

use super::{DataBits, DeviceInfo, DeviceLocator, DmxLink, FlowControl, Parity, Purge, StopBits};
use crate::{error::ControlError, Result};

/// Writes kept for inspection; older ones are dropped
const WRITE_HISTORY: usize = 64;

#[derive(Default)]
struct MockState {
    devices: Vec<DeviceInfo>,
    fail_enumeration: bool,
    fail_open: bool,
    fail_init_step: Option<&'static str>,
    failing_writes: usize,
    fail_close: bool,
    enumerations: usize,
    opens: usize,
    open_links: usize,
    init_steps: Vec<&'static str>,
    writes: VecDeque<Vec<u8>>,
    write_count: usize,
}

/// Scriptable [`DeviceLocator`]
#[derive(Clone, Default)]
pub struct MockLocator {
    state: Arc<Mutex<MockState>>,
}

impl MockLocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Locator with one plugged-in bridge per serial number
    pub fn with_devices(serials: &[&str]) -> Self {
        let locator = Self::new();
        for serial in serials {
            locator.plug(serial);
        }
        locator
    }

    /// Attach a bridge
    pub fn plug(&self, serial: &str) {
        let mut state = self.state.lock();
        let port_name = format!("/dev/ttyMOCK{}", state.devices.len());
        state.devices.push(DeviceInfo {
            serial_number: serial.to_string(),
            port_name,
            description: Some("Mock DMX bridge".to_string()),
        });
    }

    /// Detach a bridge; writes through links opened on it start failing
    pub fn unplug(&self, serial: &str) {
        self.state.lock().devices.retain(|d| d.serial_number != serial);
    }

    pub fn set_fail_enumeration(&self, fail: bool) {
        self.state.lock().fail_enumeration = fail;
    }

    pub fn set_fail_open(&self, fail: bool) {
        self.state.lock().fail_open = fail;
    }

    /// Make the named link init step fail (`"reset"`, `"purge rx"`, ...)
    pub fn set_fail_init_step(&self, step: Option<&'static str>) {
        self.state.lock().fail_init_step = step;
    }

    /// Fail the next `count` frame writes
    pub fn fail_next_writes(&self, count: usize) {
        self.state.lock().failing_writes = count;
    }

    pub fn set_fail_close(&self, fail: bool) {
        self.state.lock().fail_close = fail;
    }

    /// Number of enumeration calls so far
    pub fn enumerations(&self) -> usize {
        self.state.lock().enumerations
    }

    /// Number of successful opens so far
    pub fn opens(&self) -> usize {
        self.state.lock().opens
    }

    /// Links currently open and not yet dropped
    pub fn open_links(&self) -> usize {
        self.state.lock().open_links
    }

    /// Init steps recorded across all links, in call order
    pub fn init_steps(&self) -> Vec<&'static str> {
        self.state.lock().init_steps.clone()
    }

    /// Total successful writes
    pub fn write_count(&self) -> usize {
        self.state.lock().write_count
    }

    /// Most recent successful write
    pub fn last_write(&self) -> Option<Vec<u8>> {
        self.state.lock().writes.back().cloned()
    }

    pub fn clear_writes(&self) {
        let mut state = self.state.lock();
        state.writes.clear();
        state.write_count = 0;
    }
}

impl DeviceLocator for MockLocator {
    fn enumerate(&self) -> Result<Vec<DeviceInfo>> {
        let mut state = self.state.lock();
        state.enumerations += 1;
        if state.fail_enumeration {
            return Err(ControlError::EnumerationError(
                "Unable to get the number of devices".to_string(),
            ));
        }
        Ok(state.devices.clone())
    }

    fn open(&self, device: &DeviceInfo) -> Result<Box<dyn DmxLink>> {
        let mut state = self.state.lock();
        if state.fail_open {
            return Err(ControlError::DeviceOpenError {
                serial: device.serial_number.clone(),
                reason: "mock open failure".to_string(),
            });
        }
        state.opens += 1;
        state.open_links += 1;

        Ok(Box::new(MockLink {
            serial: device.serial_number.clone(),
            state: self.state.clone(),
        }))
    }
}

struct MockLink {
    serial: String,
    state: Arc<Mutex<MockState>>,
}

impl MockLink {
    fn step(&self, name: &'static str) -> Result<()> {
        let mut state = self.state.lock();
        state.init_steps.push(name);
        if state.fail_init_step == Some(name) {
            return Err(ControlError::IoError(std::io::Error::other(format!(
                "mock {} failure",
                name
            ))));
        }
        Ok(())
    }
}

impl DmxLink for MockLink {
    fn reset(&mut self) -> Result<()> {
        self.step("reset")
    }

    fn set_baud_rate(&mut self, _baud_rate: u32) -> Result<()> {
        self.step("baud rate")
    }

    fn set_data_characteristics(
        &mut self,
        _data_bits: DataBits,
        _stop_bits: StopBits,
        _parity: Parity,
    ) -> Result<()> {
        self.step("data characteristics")
    }

    fn set_flow_control(&mut self, _flow_control: FlowControl) -> Result<()> {
        self.step("flow control")
    }

    fn purge(&mut self, buffer: Purge) -> Result<()> {
        match buffer {
            Purge::Transmit => self.step("purge tx"),
            Purge::Receive => self.step("purge rx"),
        }
    }

    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        let mut state = self.state.lock();

        let plugged = state.devices.iter().any(|d| d.serial_number == self.serial);
        if !plugged {
            return Err(ControlError::DeviceWriteError("device unplugged".to_string()));
        }
        if state.failing_writes > 0 {
            state.failing_writes -= 1;
            return Err(ControlError::DeviceWriteError("mock write failure".to_string()));
        }

        if state.writes.len() == WRITE_HISTORY {
            state.writes.pop_front();
        }
        state.writes.push_back(bytes.to_vec());
        state.write_count += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.state.lock().fail_close {
            return Err(ControlError::DeviceCloseError(
                "Unable to close the device".to_string(),
            ));
        }
        Ok(())
    }
}

impl Drop for MockLink {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        state.open_links = state.open_links.saturating_sub(1);
    }
}

//! Frame transmitter
//!
//! Sends the universe to the bridge on a fixed cadence while the session is
//! connected and idles otherwise. A failed write drops the frame and the
//! handle; discovery reopens the bridge, nothing is retried here.

use crossbeam_channel::Receiver;
use std::sync::Arc;
use tracing::{info, trace};

use super::session::SessionShared;
use super::DmxLink;
use crate::dmx::{encode_dmx_frame, Universe};
use crate::worker::wait_tick;
use crate::Result;

/// Encode the current universe and write it as one frame
pub fn write_frame(link: &mut dyn DmxLink, universe: &Universe) -> Result<()> {
    let frame = encode_dmx_frame(&universe.snapshot());
    link.send(&frame)
}

/// Send one frame if a handle is open. `Ok(false)` when there was none.
fn transmit_once(shared: &SessionShared) -> Result<bool> {
    let mut guard = shared.link().lock();
    let Some(link) = guard.as_mut() else {
        return Ok(false);
    };

    if let Err(e) = write_frame(link.as_mut(), shared.universe()) {
        guard.take();
        return Err(e);
    }
    Ok(true)
}

pub(crate) fn transmit_loop(shared: Arc<SessionShared>, shutdown: Receiver<()>) {
    info!("Transmit thread started");
    let interval = shared.settings().transmit_interval;
    let mut frames: u64 = 0;

    loop {
        if shared.is_connected() {
            match transmit_once(&shared) {
                Ok(true) => {
                    frames += 1;
                    trace!("Sent DMX frame {}", frames);
                }
                Ok(false) => {}
                Err(e) => shared.link_lost(&e),
            }
        }

        if !wait_tick(&shutdown, interval) {
            break;
        }
    }

    info!("Transmit thread stopped after {} frames", frames);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{DeviceInfo, DeviceLocator, MockLocator};
    use crate::dmx::FRAME_LEN;

    #[test]
    fn test_write_frame_bytes() {
        let locator = MockLocator::with_devices(&["EN0001"]);
        let device = DeviceInfo {
            serial_number: "EN0001".to_string(),
            port_name: "/dev/ttyMOCK0".to_string(),
            description: None,
        };
        let mut link = locator.open(&device).unwrap();

        let universe = Universe::new();
        universe.set_channel(1, 200).unwrap();
        write_frame(link.as_mut(), &universe).unwrap();

        let frame = locator.last_write().unwrap();
        assert_eq!(frame.len(), FRAME_LEN);
        assert_eq!(&frame[..4], &[0x7E, 0x06, 0x01, 0x02]);
        assert_eq!(frame[5], 200);
        assert_eq!(*frame.last().unwrap(), 0xE7);
    }

    #[test]
    fn test_write_frame_error_propagates() {
        let locator = MockLocator::with_devices(&["EN0001"]);
        let device = locator.enumerate().unwrap().remove(0);
        let mut link = locator.open(&device).unwrap();

        locator.fail_next_writes(1);
        assert!(write_frame(link.as_mut(), &Universe::new()).is_err());
        assert_eq!(locator.write_count(), 0);

        assert!(write_frame(link.as_mut(), &Universe::new()).is_ok());
        assert_eq!(locator.write_count(), 1);
    }
}

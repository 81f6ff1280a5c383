//! Shared DMX universe buffer
//!
//! Slot 0 carries the DMX start code and is never addressable; slots 1-512
//! are the channels. The buffer sits behind a `RwLock` so the animator can
//! write while the transmitter thread snapshots whole frames.

use parking_lot::RwLock;
use std::sync::Arc;

use crate::{error::ControlError, Result};

/// Number of bytes in a universe, including the start-code slot
pub const UNIVERSE_SIZE: usize = 513;

/// Highest addressable DMX channel
pub const MAX_ADDRESS: usize = 512;

/// Handle to a 513-slot DMX universe.
///
/// Clones share the same slots; nobody ever swaps the buffer out, they only
/// write individual channels.
#[derive(Clone)]
pub struct Universe {
    slots: Arc<RwLock<[u8; UNIVERSE_SIZE]>>,
}

impl Universe {
    /// Create a blacked-out universe
    pub fn new() -> Self {
        Self {
            slots: Arc::new(RwLock::new([0u8; UNIVERSE_SIZE])),
        }
    }

    /// Total slot count, start code included
    pub fn len(&self) -> usize {
        UNIVERSE_SIZE
    }

    /// A universe is never empty, it always carries 513 slots
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Set a single channel.
    ///
    /// `address` must be within 1-512 and `value` within 0-255, otherwise
    /// the buffer is left untouched.
    pub fn set_channel(&self, address: usize, value: i32) -> Result<()> {
        check_address(address)?;
        let value = u8::try_from(value).map_err(|_| {
            ControlError::OutOfRange(format!("Value must be within [0-255], got {}", value))
        })?;

        self.slots.write()[address] = value;
        Ok(())
    }

    /// Read back a single channel
    pub fn channel(&self, address: usize) -> Result<u8> {
        check_address(address)?;
        Ok(self.slots.read()[address])
    }

    /// Write an RGB triple to `start`, `start + 1` and `start + 2`.
    ///
    /// Not transactional: if the triple runs past channel 512 the leading
    /// writes stay applied and the first failing write is returned.
    pub fn set_color_u8(&self, start: usize, red: i32, green: i32, blue: i32) -> Result<()> {
        self.set_channel(start, red)?;
        self.set_channel(start + 1, green)?;
        self.set_channel(start + 2, blue)
    }

    /// Write a normalized RGB triple, see [`unit_to_dmx`] for the mapping
    pub fn set_color(&self, start: usize, red: f32, green: f32, blue: f32) -> Result<()> {
        self.set_color_u8(
            start,
            unit_to_dmx(red),
            unit_to_dmx(green),
            unit_to_dmx(blue),
        )
    }

    /// Copy of the whole universe, start code included
    pub fn snapshot(&self) -> [u8; UNIVERSE_SIZE] {
        *self.slots.read()
    }

    /// Blackout
    pub fn clear(&self) {
        *self.slots.write() = [0u8; UNIVERSE_SIZE];
    }
}

impl Default for Universe {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Universe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let slots = self.slots.read();
        let active = slots[1..].iter().filter(|v| **v != 0).count();
        f.debug_struct("Universe")
            .field("active_channels", &active)
            .finish()
    }
}

/// Map a normalized float to a channel byte.
///
/// Floors rather than rounds: `0.5` becomes 127. Negative input gives 0 and
/// anything at or above ~1.0 saturates at 255.
pub fn unit_to_dmx(value: f32) -> i32 {
    let converted = (f64::from(value) * 255.0).floor();
    if converted.is_nan() || converted < 0.0 {
        0
    } else if converted > 255.0 {
        255
    } else {
        converted as i32
    }
}

fn check_address(address: usize) -> Result<()> {
    if (1..=MAX_ADDRESS).contains(&address) {
        Ok(())
    } else {
        Err(ControlError::OutOfRange(format!(
            "Address must be within [1-512], got {}",
            address
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_channel_bounds() {
        let universe = Universe::new();

        for address in [1, 2, 256, 511, 512] {
            universe.set_channel(address, 200).unwrap();
            assert_eq!(universe.channel(address).unwrap(), 200);
        }

        for value in [0, 1, 128, 255] {
            universe.set_channel(7, value).unwrap();
            assert_eq!(universe.channel(7).unwrap() as i32, value);
        }
    }

    #[test]
    fn test_set_channel_rejects_out_of_range() {
        let universe = Universe::new();
        universe.set_channel(10, 42).unwrap();
        let before = universe.snapshot();

        assert!(matches!(
            universe.set_channel(0, 1),
            Err(ControlError::OutOfRange(_))
        ));
        assert!(matches!(
            universe.set_channel(513, 1),
            Err(ControlError::OutOfRange(_))
        ));
        assert!(matches!(
            universe.set_channel(10, 256),
            Err(ControlError::OutOfRange(_))
        ));
        assert!(matches!(
            universe.set_channel(10, -1),
            Err(ControlError::OutOfRange(_))
        ));

        assert_eq!(universe.snapshot(), before);
        assert_eq!(universe.snapshot()[0], 0);
    }

    #[test]
    fn test_unit_to_dmx_floors() {
        assert_eq!(unit_to_dmx(-0.5), 0);
        assert_eq!(unit_to_dmx(0.0), 0);
        assert_eq!(unit_to_dmx(0.5), 127);
        assert_eq!(unit_to_dmx(0.999), 254);
        assert_eq!(unit_to_dmx(1.0), 255);
        assert_eq!(unit_to_dmx(1.2), 255);
        assert_eq!(unit_to_dmx(1.5), 255);
        assert_eq!(unit_to_dmx(f32::NAN), 0);
    }

    #[test]
    fn test_set_color_float() {
        let universe = Universe::new();
        universe.set_color(1, -0.5, 0.5, 1.5).unwrap();

        let slots = universe.snapshot();
        assert_eq!(&slots[1..4], &[0, 127, 255]);
    }

    #[test]
    fn test_set_color_partial_write_past_end() {
        let universe = Universe::new();

        let result = universe.set_color_u8(511, 10, 20, 30);
        assert!(matches!(result, Err(ControlError::OutOfRange(_))));

        assert_eq!(universe.channel(511).unwrap(), 10);
        assert_eq!(universe.channel(512).unwrap(), 20);
    }

    #[test]
    fn test_set_color_u8_validates_each_value() {
        let universe = Universe::new();

        let result = universe.set_color_u8(1, 255, 300, 0);
        assert!(result.is_err());
        assert_eq!(universe.channel(1).unwrap(), 255);
        assert_eq!(universe.channel(2).unwrap(), 0);
    }

    #[test]
    fn test_clones_share_slots() {
        let universe = Universe::new();
        let other = universe.clone();

        other.set_channel(3, 99).unwrap();
        assert_eq!(universe.channel(3).unwrap(), 99);

        universe.clear();
        assert_eq!(other.channel(3).unwrap(), 0);
    }
}

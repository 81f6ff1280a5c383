//! DMX512 output
//!
//! ## Universe
//!
//! A universe is 512 addressable channels preceded by a start-code slot, so
//! the buffer is 513 bytes long. Channel addresses are 1-indexed.
//!
//! ## USB bridge framing
//!
//! The bridge receives the universe wrapped in a small envelope:
//! - `0x7E` start marker
//! - a label byte (6 = send DMX data)
//! - little-endian payload length
//! - the payload, then `0xE7`
//!
//! ## Example Usage
//!
//! ```rust
//! use beacon_control::dmx::{encode_dmx_frame, Universe};
//!
//! # fn main() -> beacon_control::Result<()> {
//! let universe = Universe::new();
//!
//! // Full red on the fixture patched at channel 1
//! universe.set_color(1, 1.0, 0.0, 0.0)?;
//!
//! let frame = encode_dmx_frame(&universe.snapshot());
//! assert_eq!(frame[5], 255);
//! # Ok(())
//! # }
//! ```

pub mod frame;
pub mod universe;

pub use frame::{encode_dmx_frame, FRAME_LEN, LABEL_SEND_DMX};
pub use universe::{unit_to_dmx, Universe, MAX_ADDRESS, UNIVERSE_SIZE};

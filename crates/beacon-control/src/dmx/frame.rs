//! USB bridge wire protocol
//!
//! Every frame is `[0x7E] [label] [len_lo] [len_hi] [payload] [0xE7]`. The
//! beacon only ever sends label 6 ("send DMX data") with the full 513-byte
//! universe as payload.

use super::universe::UNIVERSE_SIZE;

/// Frame start marker
pub const START_OF_MESSAGE: u8 = 0x7E;

/// Frame end marker
pub const END_OF_MESSAGE: u8 = 0xE7;

/// Label for "send DMX data"
pub const LABEL_SEND_DMX: u8 = 6;

/// Header bytes preceding the payload
pub const HEADER_LEN: usize = 4;

/// Size of a complete DMX frame on the wire
pub const FRAME_LEN: usize = HEADER_LEN + UNIVERSE_SIZE + 1;

/// Build the 4-byte header for a payload of `payload_len` bytes
pub fn header(label: u8, payload_len: u16) -> [u8; HEADER_LEN] {
    let [len_lo, len_hi] = payload_len.to_le_bytes();
    [START_OF_MESSAGE, label, len_lo, len_hi]
}

/// Encode a full "send DMX data" frame for a universe snapshot
pub fn encode_dmx_frame(universe: &[u8; UNIVERSE_SIZE]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(FRAME_LEN);
    frame.extend_from_slice(&header(LABEL_SEND_DMX, UNIVERSE_SIZE as u16));
    frame.extend_from_slice(universe);
    frame.push(END_OF_MESSAGE);
    frame
}

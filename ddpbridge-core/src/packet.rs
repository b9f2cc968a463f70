//! DDP packet parsing and building
//!
//! Header layout (10 bytes, multi-byte fields big-endian):
//!
//! | Byte | Field          |
//! |------|----------------|
//! | 0    | flags          |
//! | 1    | sequence (low nibble) |
//! | 2    | data type      |
//! | 3    | destination ID |
//! | 4-7  | data offset    |
//! | 8-9  | data length    |
//!
//! The payload follows immediately.

use crate::constants::{
    PacketFlags, BYTES_PER_PIXEL, DDP_HEADER_SIZE, DDP_ID_DEFAULT, DDP_SEQUENCE_MASK,
    DDP_TYPE_RGB,
};
use crate::error::ParseError;
use bytes::{BufMut, Bytes, BytesMut};
use std::fmt::Write as _;

/// Parsed view of a DDP datagram
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelUpdatePacket {
    /// Flags byte
    pub flags: PacketFlags,

    /// Sequence number (0..15)
    pub sequence: u8,

    /// Data type byte
    pub data_type: u8,

    /// Destination ID
    pub destination_id: u8,

    /// Byte offset into the device pixel buffer
    pub offset: u32,

    /// Declared payload length
    pub length: u16,

    /// Payload, exactly `length` bytes
    pub pixel_data: Bytes,
}

impl PixelUpdatePacket {
    /// Whether the push flag is set
    pub fn push(&self) -> bool {
        self.flags.push()
    }

    /// One-line description of the header fields
    pub fn summary(&self) -> String {
        format!(
            "flags=0x{:02X}, seq={}, type=0x{:02X}, dest={}, offset={}, len={}",
            self.flags.as_u8(),
            self.sequence,
            self.data_type,
            self.destination_id,
            self.offset,
            self.length
        )
    }
}

/// Parse a datagram into a packet view
///
/// Trailing bytes beyond the declared length are ignored.
pub fn parse(datagram: &[u8]) -> Result<PixelUpdatePacket, ParseError> {
    if datagram.len() < DDP_HEADER_SIZE {
        return Err(ParseError::TooShort {
            expected: DDP_HEADER_SIZE,
            actual: datagram.len(),
        });
    }

    let offset = u32::from_be_bytes([datagram[4], datagram[5], datagram[6], datagram[7]]);
    let length = u16::from_be_bytes([datagram[8], datagram[9]]);

    let available = datagram.len() - DDP_HEADER_SIZE;
    if length as usize > available {
        return Err(ParseError::LengthMismatch {
            declared: length as usize,
            available,
        });
    }

    let end = DDP_HEADER_SIZE + length as usize;

    Ok(PixelUpdatePacket {
        flags: PacketFlags::new(datagram[0]),
        sequence: datagram[1] & DDP_SEQUENCE_MASK,
        data_type: datagram[2],
        destination_id: datagram[3],
        offset,
        length,
        pixel_data: Bytes::copy_from_slice(&datagram[DDP_HEADER_SIZE..end]),
    })
}

/// Check whether a packet replaces the whole frame of `led_count` RGB pixels
pub fn is_full_frame_update(packet: &PixelUpdatePacket, led_count: usize) -> bool {
    packet.data_type == DDP_TYPE_RGB
        && packet.offset == 0
        && packet.length as usize == led_count * BYTES_PER_PIXEL
}

/// Build an RGB packet addressed to the default destination at offset 0
///
/// The sequence is masked to its 4-bit range. `pixel_data` must fit the
/// 16-bit length field.
pub fn build(sequence: u8, pixel_data: &[u8], push: bool) -> Bytes {
    debug_assert!(pixel_data.len() <= u16::MAX as usize);

    let mut buf = BytesMut::with_capacity(DDP_HEADER_SIZE + pixel_data.len());

    buf.put_u8(PacketFlags::v1(push).as_u8());
    buf.put_u8(sequence & DDP_SEQUENCE_MASK);
    buf.put_u8(DDP_TYPE_RGB);
    buf.put_u8(DDP_ID_DEFAULT);
    buf.put_u32(0);
    buf.put_u16(pixel_data.len() as u16);
    buf.put_slice(pixel_data);

    buf.freeze()
}

/// Hands out wrapping 4-bit sequence numbers
#[derive(Debug, Clone, Default)]
pub struct SequenceCounter {
    next: u8,
}

impl SequenceCounter {
    /// Start at sequence 0
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the current sequence number and advance
    pub fn next_sequence(&mut self) -> u8 {
        let seq = self.next;
        self.next = (self.next + 1) & DDP_SEQUENCE_MASK;
        seq
    }
}

/// Hex dump of the first `max` bytes, space separated
pub fn hex_preview(data: &[u8], max: usize) -> String {
    let mut out = String::with_capacity(max.min(data.len()) * 3);
    for (i, byte) in data.iter().take(max).enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(out, "{:02X}", byte);
    }
    out
}

//! RealDash CAN wire codec.
//!
//! # Frame Format
//!
//! ```text
//!  0      1      2      3      4             8                 8+N
//! +------+------+------+------+-------------+-------------------+---------+
//! | tag  | 0x33 | 0x22 | len  | id (u32 LE) | payload (N bytes) | trailer |
//! +------+------+------+------+-------------+-------------------+---------+
//!
//! tag 0x44: len == 0x11, N = 8, trailer = 1 byte 8-bit sum
//! tag 0x66: len in 0x0F..=0x1F, N = (len - 15) * 4, trailer = 4 byte CRC32 LE
//! ```
//!
//! Both trailers cover every byte from the tag through the last payload byte.
//! Only the variable (`0x66`) form is written to streams; the fixed form is
//! accepted on input.

mod decoder;
mod stream;

pub use decoder::FrameDecoder;
pub use stream::CodecStream;

use crate::core::{Crc32, Frame, Sum8, MAX_PAYLOAD_SIZE};
use crate::error::{Error, Result};

/// Bytes 1 and 2 of every frame.
pub const HEADER_MARKER: [u8; 2] = [0x33, 0x22];

/// Header length: tag, marker, length byte.
pub const HEADER_SIZE: usize = 4;

/// Identifier length on the wire.
pub const ID_SIZE: usize = 4;

/// Length byte of a fixed frame.
pub const FIXED_LENGTH_BYTE: u8 = 0x11;

/// Payload length of a fixed frame.
pub const FIXED_PAYLOAD_SIZE: usize = 8;

/// Smallest accepted length byte of a variable frame (empty payload).
pub const MIN_VARIABLE_LENGTH_BYTE: u8 = 0x0F;

/// Largest accepted length byte of a variable frame (64 byte payload).
pub const MAX_VARIABLE_LENGTH_BYTE: u8 = 0x1F;

/// The two supported frame variants, keyed by their tag byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameKind {
    /// 8-byte payload with an 8-bit sum trailer.
    Fixed = 0x44,

    /// 0 to 64 byte payload with a CRC32 trailer.
    Variable = 0x66,
}

impl FrameKind {
    /// Converts a tag byte to a FrameKind.
    pub const fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0x44 => Some(Self::Fixed),
            0x66 => Some(Self::Variable),
            _ => None,
        }
    }

    pub const fn tag(self) -> u8 {
        self as u8
    }

    /// Trailer length in bytes.
    pub const fn trailer_size(self) -> usize {
        match self {
            Self::Fixed => 1,
            Self::Variable => 4,
        }
    }

    /// Decodes a length byte into a payload length, or `None` if the byte is
    /// out of range for this kind.
    pub const fn payload_size(self, length_byte: u8) -> Option<usize> {
        match self {
            Self::Fixed if length_byte == FIXED_LENGTH_BYTE => Some(FIXED_PAYLOAD_SIZE),
            Self::Fixed => None,
            Self::Variable
                if length_byte >= MIN_VARIABLE_LENGTH_BYTE
                    && length_byte <= MAX_VARIABLE_LENGTH_BYTE =>
            {
                Some((length_byte as usize - 15) * 4)
            }
            Self::Variable => None,
        }
    }
}

/// Returns the length byte for a variable frame payload.
fn variable_length_byte(len: usize) -> Result<u8> {
    if len > MAX_PAYLOAD_SIZE {
        return Err(Error::UnsupportedFrame("payload longer than 64 bytes"));
    }
    if len % 4 != 0 {
        return Err(Error::UnsupportedFrame("payload length is not a multiple of 4"));
    }
    Ok((len / 4 + 15) as u8)
}

fn wire_id(frame: &Frame) -> Result<[u8; ID_SIZE]> {
    u32::try_from(frame.id)
        .map(u32::to_le_bytes)
        .map_err(|_| Error::UnsupportedFrame("identifier wider than 32 bits"))
}

/// Encodes a frame in the fixed (`0x44`) form.
pub fn encode_fixed(frame: &Frame) -> Result<Vec<u8>> {
    if frame.data.len() != FIXED_PAYLOAD_SIZE {
        return Err(Error::UnsupportedFrame("fixed frames carry exactly 8 bytes"));
    }
    let id = wire_id(frame)?;

    let mut buf = Vec::with_capacity(HEADER_SIZE + ID_SIZE + FIXED_PAYLOAD_SIZE + 1);
    buf.push(FrameKind::Fixed.tag());
    buf.extend_from_slice(&HEADER_MARKER);
    buf.push(FIXED_LENGTH_BYTE);
    buf.extend_from_slice(&id);
    buf.extend_from_slice(&frame.data);
    buf.push(Sum8::compute(&buf));
    Ok(buf)
}

/// Encodes a frame in the variable (`0x66`) form.
pub fn encode_variable(frame: &Frame) -> Result<Vec<u8>> {
    let length_byte = variable_length_byte(frame.data.len())?;
    let id = wire_id(frame)?;

    let mut buf = Vec::with_capacity(HEADER_SIZE + ID_SIZE + frame.data.len() + 4);
    buf.push(FrameKind::Variable.tag());
    buf.extend_from_slice(&HEADER_MARKER);
    buf.push(length_byte);
    buf.extend_from_slice(&id);
    buf.extend_from_slice(&frame.data);
    let crc = Crc32::compute(&buf);
    buf.extend_from_slice(&crc.to_le_bytes());
    Ok(buf)
}

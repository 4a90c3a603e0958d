//! Core data structures.
//!
//! This module contains the leaf building blocks:
//! - Frame: one CAN message
//! - Checksum: the 8-bit sum and CRC32 used by the wire trailers

mod frame;
mod checksum;

pub use frame::{Frame, MAX_PAYLOAD_SIZE};
pub use checksum::{Crc32, Sum8};

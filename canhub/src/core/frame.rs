//! The canonical in-memory CAN frame.

use core::fmt;
use core::str::FromStr;

use crate::error::Error;

/// Maximum payload length any wire variant can carry.
pub const MAX_PAYLOAD_SIZE: usize = 64;

/// One CAN message: an identifier and its payload bytes.
///
/// Frames are plain values. Equality compares the identifier and the
/// exact payload bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Frame {
    /// CAN identifier. Extended identifiers use at most 29 bits.
    pub id: u64,

    /// Payload bytes in network order.
    pub data: Vec<u8>,
}

impl Frame {
    /// Creates a frame from an identifier and payload.
    pub fn new(id: u64, data: impl Into<Vec<u8>>) -> Self {
        Self {
            id,
            data: data.into(),
        }
    }

    /// Returns the payload length in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the frame carries no payload.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Formats as `<id as 4 LE bytes><payload>` in hex, the layout frames have
/// on the wire after the header.
impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in (self.id as u32).to_le_bytes() {
            write!(f, "{:02x}", byte)?;
        }
        for byte in &self.data {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

/// Parses `<id>#<payload>`: a hexadecimal identifier and a hex payload,
/// as in `6000#0000000000000000`. The payload may be empty.
impl FromStr for Frame {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (id, data) = s
            .split_once('#')
            .ok_or_else(|| Error::InvalidFrame(format!("missing '#' in {:?}", s)))?;
        let id = u64::from_str_radix(id.trim_start_matches("0x"), 16)
            .map_err(|e| Error::InvalidFrame(format!("bad identifier {:?}: {}", id, e)))?;
        let data = hex::decode(data)
            .map_err(|e| Error::InvalidFrame(format!("bad payload {:?}: {}", data, e)))?;
        if data.len() > MAX_PAYLOAD_SIZE {
            return Err(Error::InvalidFrame(format!(
                "payload of {} bytes exceeds {}",
                data.len(),
                MAX_PAYLOAD_SIZE
            )));
        }
        Ok(Self::new(id, data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_equality() {
        let a = Frame::new(0x5200, vec![1, 2, 3, 4]);
        let b = Frame::new(0x5200, vec![1, 2, 3, 4]);
        let c = Frame::new(0x5200, vec![1, 2, 3, 5]);
        let d = Frame::new(0x5400, vec![1, 2, 3, 4]);

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
    }

    #[test]
    fn test_frame_display() {
        let frame = Frame::new(0x5800, hex::decode("f4080eef392c1b4c").unwrap());
        assert_eq!(frame.to_string(), "00580000f4080eef392c1b4c");
    }

    #[test]
    fn test_empty_frame() {
        let frame = Frame::new(0x10, Vec::new());
        assert!(frame.is_empty());
        assert_eq!(frame.len(), 0);
    }

    #[test]
    fn test_parse_frame() {
        let frame: Frame = "6000#0000000000000000".parse().unwrap();
        assert_eq!(frame, Frame::new(0x6000, vec![0u8; 8]));

        let frame: Frame = "0x5800#f4080eef".parse().unwrap();
        assert_eq!(frame, Frame::new(0x5800, vec![0xf4, 0x08, 0x0e, 0xef]));

        let frame: Frame = "10#".parse().unwrap();
        assert!(frame.is_empty());
    }

    #[test]
    fn test_parse_frame_errors() {
        assert!(matches!("6000".parse::<Frame>(), Err(Error::InvalidFrame(_))));
        assert!(matches!("zz#00".parse::<Frame>(), Err(Error::InvalidFrame(_))));
        assert!(matches!("1#0".parse::<Frame>(), Err(Error::InvalidFrame(_))));
        let long = format!("1#{}", "00".repeat(65));
        assert!(matches!(long.parse::<Frame>(), Err(Error::InvalidFrame(_))));
    }
}

//! Incremental frame decoder.

use super::{FrameKind, HEADER_MARKER, HEADER_SIZE, ID_SIZE};
use crate::core::{Crc32, Frame, Sum8};
use crate::error::ParseError;

/// Byte-at-a-time decoder for RealDash frames.
///
/// State is keyed on the number of bytes seen since the start of the
/// current candidate frame. Any header mismatch, bad length or checksum
/// mismatch drops the candidate and scanning resumes. Consecutive bytes that
/// cannot start a frame after such an error belong to the same corrupt
/// region and are skipped without reporting another error.
#[derive(Debug, Clone, Default)]
pub struct FrameDecoder {
    /// Bytes consumed since the start of the candidate frame.
    count: usize,

    kind: Option<FrameKind>,

    id: u32,

    /// Declared payload length.
    len: usize,

    payload: Vec<u8>,

    trailer: [u8; 4],

    trailer_len: usize,

    sum: Sum8,

    crc: Crc32,

    /// Set after an error until the next tag byte is seen.
    resyncing: bool,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one byte.
    ///
    /// Returns `Ok(Some(frame))` when the byte completes a valid frame,
    /// `Ok(None)` when more bytes are needed, and `Err` when the candidate
    /// frame was discarded.
    pub fn push(&mut self, byte: u8) -> Result<Option<Frame>, ParseError> {
        self.count += 1;
        let Some(kind) = self.kind else {
            return self.start(byte);
        };

        match self.count {
            2 | 3 => {
                if byte != HEADER_MARKER[self.count - 2] {
                    let index = self.count - 1;
                    return Err(self.restart(byte, ParseError::InvalidHeader { index, byte }));
                }
                self.update_checksum(kind, byte);
            }
            4 => match kind.payload_size(byte) {
                Some(len) => {
                    self.len = len;
                    self.payload.reserve(len);
                    self.update_checksum(kind, byte);
                }
                None => {
                    let tag = kind.tag();
                    return Err(self.restart(byte, ParseError::InvalidLength { tag, byte }));
                }
            },
            n if n <= HEADER_SIZE + ID_SIZE => {
                self.id |= (byte as u32) << (8 * (n - HEADER_SIZE - 1));
                self.update_checksum(kind, byte);
            }
            n if n <= HEADER_SIZE + ID_SIZE + self.len => {
                self.payload.push(byte);
                self.update_checksum(kind, byte);
            }
            _ => {
                self.trailer[self.trailer_len] = byte;
                self.trailer_len += 1;
                if self.trailer_len == kind.trailer_size() {
                    return self.finish(kind);
                }
            }
        }
        Ok(None)
    }

    /// Drops any partially decoded frame.
    pub fn reset(&mut self) {
        self.count = 0;
        self.kind = None;
        self.id = 0;
        self.len = 0;
        self.payload = Vec::new();
        self.trailer = [0; 4];
        self.trailer_len = 0;
        self.sum.reset();
        self.crc.reset();
    }

    fn start(&mut self, byte: u8) -> Result<Option<Frame>, ParseError> {
        match FrameKind::from_tag(byte) {
            Some(kind) => {
                self.count = 1;
                self.kind = Some(kind);
                self.resyncing = false;
                self.update_checksum(kind, byte);
                Ok(None)
            }
            None => {
                self.reset();
                if std::mem::replace(&mut self.resyncing, true) {
                    Ok(None)
                } else {
                    Err(ParseError::UnsupportedType(byte))
                }
            }
        }
    }

    /// Discards the candidate after a header error and rescans `byte`, which
    /// may itself open the next frame.
    fn restart(&mut self, byte: u8, err: ParseError) -> ParseError {
        self.reset();
        self.resyncing = true;
        // resyncing is set, so a non-tag byte is skipped silently
        let _ = self.start(byte);
        err
    }

    fn update_checksum(&mut self, kind: FrameKind, byte: u8) {
        match kind {
            FrameKind::Fixed => self.sum.update_byte(byte),
            FrameKind::Variable => self.crc.update_byte(byte),
        }
    }

    fn finish(&mut self, kind: FrameKind) -> Result<Option<Frame>, ParseError> {
        let (received, computed) = match kind {
            FrameKind::Fixed => (self.trailer[0] as u32, self.sum.value() as u32),
            FrameKind::Variable => (u32::from_le_bytes(self.trailer), self.crc.value()),
        };
        if received != computed {
            self.reset();
            self.resyncing = true;
            return Err(ParseError::ChecksumMismatch { received, computed });
        }

        let frame = Frame::new(self.id as u64, std::mem::take(&mut self.payload));
        self.reset();
        Ok(Some(frame))
    }
}

//! Error types for streams, the wire codec and configuration.
//!
//! [`ParseError`] is a recoverable wire-format problem after which the
//! decoder resynchronizes, while [`Error`] covers everything a stream or
//! configuration call can fail with.

use thiserror::Error;

/// A recoverable wire-format error.
///
/// The decoder discards its partial frame and resumes scanning after
/// returning one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ParseError {
    /// First byte of a candidate frame is not a known type tag.
    #[error("unsupported frame type, byte[0]={0:#04x}")]
    UnsupportedType(u8),

    /// A fixed header byte did not match.
    #[error("invalid frame header, byte[{index}]={byte:#04x}")]
    InvalidHeader { index: usize, byte: u8 },

    /// The length byte is out of range for the frame type.
    #[error("invalid frame header, frame type {tag:#04x} has incorrect length {byte:#04x}")]
    InvalidLength { tag: u8, byte: u8 },

    /// The trailer does not match the computed checksum.
    #[error("frame checksum invalid, {received:#x} != {computed:#x}")]
    ChecksumMismatch { received: u32, computed: u32 },
}

impl ParseError {
    /// Returns true for errors detected before checksum validation.
    pub fn is_structural(&self) -> bool {
        !matches!(self, ParseError::ChecksumMismatch { .. })
    }
}

#[derive(Debug, Error)]
pub enum Error {
    /// The stream (or the byte source under it) is closed.
    #[error("stream is closed")]
    Closed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// A frame that the wire format cannot carry.
    #[error("unsupported frame: {0}")]
    UnsupportedFrame(&'static str),

    /// Text that does not describe a frame.
    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    #[error("unknown protocol: {0}")]
    UnknownProtocol(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Returns true if the error means the stream will never deliver again.
    pub fn is_closed(&self) -> bool {
        matches!(self, Error::Closed)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

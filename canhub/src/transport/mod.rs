//! Concrete streams.
//!
//! - [`IoByteStream`]: a byte stream over any tokio reader/writer pair,
//!   with constructors for TCP and Unix sockets.
//! - [`ChannelFrameStream`]: an in-process frame stream whose other end is
//!   a [`ChannelFrameHandle`] held by application code.

mod channel;
mod io_stream;

pub use channel::{ChannelFrameHandle, ChannelFrameStream, channel_stream};
pub use io_stream::{IoByteStream, TcpByteStream, UnixByteStream};

//! # canhub - A CAN Frame Relay Hub
//!
//! canhub connects CAN frame sources and sinks (serial adapters, TCP
//! dashboards, synthetic generators) and relays every frame from one of
//! them to all the others:
//!
//! - **Frame bus**: one dispatcher task fans frames out to every member
//! - **RealDash codec**: fixed (`0x44`) and variable (`0x66`) wire frames
//!   with a resynchronising decoder
//! - **Checksums**: 8-bit sum and IEEE CRC32
//! - **Pluggable transports**: anything implementing the byte or frame
//!   stream traits can join the bus
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                       FrameBus                           │
//! │   dispatcher ── member table ── per-member pumps         │
//! ├─────────────────────────────────────────────────────────┤
//! │                     Frame streams                        │
//! │  ┌─────────────┐ ┌─────────────┐ ┌─────────────────┐    │
//! │  │ CodecStream │ │  Heartbeat  │ │  ChannelStream  │    │
//! │  └─────────────┘ └─────────────┘ └─────────────────┘    │
//! ├─────────────────────────────────────────────────────────┤
//! │                     Byte streams                         │
//! │  ┌─────────────────────────────────────────────────┐    │
//! │  │        IoByteStream (TCP, Unix, any tokio IO)    │    │
//! │  └─────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use canhub::{BusConfig, FrameBus, IoByteStream, ProtocolRegistry, REALDASH};
//!
//! let bus = FrameBus::new(BusConfig::default());
//! let registry = ProtocolRegistry::with_defaults();
//!
//! let (socket, _) = listener.accept().await?;
//! bus.add(registry.wrap(REALDASH, Arc::new(IoByteStream::tcp(socket)))?);
//!
//! // ...
//! bus.close().await;
//! ```

#![deny(unsafe_code)]

pub mod bus;
pub mod codec;
pub mod config;
pub mod core;
pub mod device;
pub mod error;
pub mod heartbeat;
pub mod io;
pub mod protocol;
pub mod transport;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use bus::{BusStats, FrameBus};
pub use codec::{CodecStream, FrameDecoder, FrameKind};
pub use config::{BusConfig, HeartbeatConfig};
pub use crate::core::{Crc32, Frame, MAX_PAYLOAD_SIZE, Sum8};
pub use device::{DeviceConfig, DeviceConfigStore, DeviceId, DeviceKind};
pub use error::{Error, ParseError, Result};
pub use heartbeat::HeartbeatStream;
pub use io::{ByteReader, ByteStream, ByteWriter, Closer, FrameReader, FrameStream, FrameWriter};
pub use protocol::{FrameProtocol, ProtocolRegistry, REALDASH, RealDashProtocol};
pub use transport::{ChannelFrameHandle, ChannelFrameStream, IoByteStream, channel_stream};

/// Default capacity of bus queues, in frames.
pub const DEFAULT_QUEUE_CAPACITY: usize = 32;

/// Default heartbeat frame identifier.
pub const DEFAULT_HEARTBEAT_ID: u64 = 0x6000;

/// Default heartbeat period in milliseconds
pub const DEFAULT_HEARTBEAT_PERIOD_MS: u64 = 1000;

/// Default TCP port of the hub server.
pub const DEFAULT_TCP_PORT: u16 = 57321;

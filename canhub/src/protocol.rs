//! Named frame protocols and the registry that looks them up.
//!
//! A protocol turns a byte stream into a frame stream. Device configuration
//! refers to protocols by name, so whatever wires transports to the bus
//! holds a [`ProtocolRegistry`] and resolves names through it.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::codec::CodecStream;
use crate::error::{Error, Result};
use crate::io::{ByteStream, FrameStream};

/// Name under which the RealDash codec is registered.
pub const REALDASH: &str = "RealDash";

/// A line protocol that frames a byte stream.
pub trait FrameProtocol: Send + Sync {
    /// Short unique name.
    fn name(&self) -> &str;

    /// Human readable description.
    fn description(&self) -> &str;

    /// Wraps a byte stream in this protocol's frame stream.
    fn wrap(&self, stream: Arc<dyn ByteStream>) -> Arc<dyn FrameStream>;
}

/// The RealDash CAN protocol (fixed `0x44` and variable `0x66` frames).
#[derive(Debug, Default, Clone, Copy)]
pub struct RealDashProtocol;

impl FrameProtocol for RealDashProtocol {
    fn name(&self) -> &str {
        REALDASH
    }

    fn description(&self) -> &str {
        "Communicate with the RealDash software dashboard."
    }

    fn wrap(&self, stream: Arc<dyn ByteStream>) -> Arc<dyn FrameStream> {
        Arc::new(CodecStream::new(stream))
    }
}

/// Protocols keyed by name, iterated in name order.
#[derive(Default, Clone)]
pub struct ProtocolRegistry {
    protocols: BTreeMap<String, Arc<dyn FrameProtocol>>,
}

impl ProtocolRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with every built-in protocol.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(RealDashProtocol);
        registry
    }

    /// Registers a protocol, replacing any protocol with the same name.
    pub fn register<P: FrameProtocol + 'static>(&mut self, protocol: P) {
        self.protocols
            .insert(protocol.name().to_string(), Arc::new(protocol));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn FrameProtocol>> {
        self.protocols.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.protocols.contains_key(name)
    }

    /// Registered protocol names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.protocols.keys().map(String::as_str)
    }

    /// Wraps `stream` with the named protocol.
    pub fn wrap(&self, name: &str, stream: Arc<dyn ByteStream>) -> Result<Arc<dyn FrameStream>> {
        self.get(name)
            .map(|protocol| protocol.wrap(stream))
            .ok_or_else(|| Error::UnknownProtocol(name.to_string()))
    }
}

use std::time::Duration;

use crate::core::Frame;
use crate::{DEFAULT_HEARTBEAT_ID, DEFAULT_HEARTBEAT_PERIOD_MS, DEFAULT_QUEUE_CAPACITY};

/// Frame bus tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusConfig {
    /// Capacity of each member's outbound queue. Fan-out waits when a
    /// member's queue is full.
    pub outbound_capacity: usize,
    /// Capacity of the queue shared by all inbound pumps.
    pub inbound_capacity: usize,
}

impl BusConfig {
    pub fn new() -> Self {
        Self {
            outbound_capacity: DEFAULT_QUEUE_CAPACITY,
            inbound_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }

    pub fn with_outbound_capacity(mut self, capacity: usize) -> Self {
        self.outbound_capacity = capacity.max(1);
        self
    }

    pub fn with_inbound_capacity(mut self, capacity: usize) -> Self {
        self.inbound_capacity = capacity.max(1);
        self
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Heartbeat source settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeartbeatConfig {
    pub frame: Frame,
    pub period: Duration,
}

impl HeartbeatConfig {
    pub fn new() -> Self {
        Self {
            frame: Frame::new(DEFAULT_HEARTBEAT_ID, vec![0u8; 8]),
            period: Duration::from_millis(DEFAULT_HEARTBEAT_PERIOD_MS),
        }
    }

    pub fn with_frame(mut self, frame: Frame) -> Self {
        self.frame = frame;
        self
    }

    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self::new()
    }
}

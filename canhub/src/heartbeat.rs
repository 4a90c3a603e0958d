//! A synthetic frame source that keeps the bus visibly alive.

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::HeartbeatConfig;
use crate::core::Frame;
use crate::error::Result;
use crate::io::{Closer, FrameReader, FrameWriter};

/// Emits a fixed frame at most once per period and ignores writes.
///
/// A read returns the frame if at least one period has passed since the
/// last frame it returned (or since creation). Otherwise the read waits out
/// the rest of the period, or until the stream is closed, and returns
/// `None`; the next read then finds the period elapsed.
pub struct HeartbeatStream {
    config: HeartbeatConfig,
    last_sent: Mutex<Instant>,
    closed: CancellationToken,
}

impl HeartbeatStream {
    pub fn new(config: HeartbeatConfig) -> Self {
        Self {
            config,
            last_sent: Mutex::new(Instant::now()),
            closed: CancellationToken::new(),
        }
    }

    /// The frame this stream emits.
    pub fn frame(&self) -> &Frame {
        &self.config.frame
    }
}

#[async_trait]
impl Closer for HeartbeatStream {
    async fn close(&self) -> Result<()> {
        self.closed.cancel();
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }
}

#[async_trait]
impl FrameReader for HeartbeatStream {
    async fn read(&self) -> Result<Option<Frame>> {
        if self.is_closed() {
            return Ok(None);
        }

        let deadline = {
            let mut last_sent = self.last_sent.lock();
            let now = Instant::now();
            if now.duration_since(*last_sent) >= self.config.period {
                *last_sent = now;
                return Ok(Some(self.config.frame.clone()));
            }
            *last_sent + self.config.period
        };

        tokio::select! {
            _ = tokio::time::sleep_until(deadline) => {}
            _ = self.closed.cancelled() => {}
        }
        Ok(None)
    }
}

#[async_trait]
impl FrameWriter for HeartbeatStream {
    async fn write(&self, _frame: &Frame) -> Result<()> {
        Ok(())
    }
}

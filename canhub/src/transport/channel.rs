use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;

use crate::core::Frame;
use crate::error::{Error, Result};
use crate::io::{Closer, FrameReader, FrameWriter};

/// Creates a connected frame stream and handle.
///
/// Frames sent on the handle are read from the stream; frames written to
/// the stream are received on the handle. Each direction buffers up to
/// `capacity` frames, after which the sender waits. Closing either side,
/// or dropping the handle, closes both.
pub fn channel_stream(capacity: usize) -> (ChannelFrameStream, ChannelFrameHandle) {
    let capacity = capacity.max(1);
    let (to_stream, from_handle) = mpsc::channel(capacity);
    let (to_handle, from_stream) = mpsc::channel(capacity);
    let closed = CancellationToken::new();

    let stream = ChannelFrameStream {
        incoming: Mutex::new(from_handle),
        outgoing: to_handle,
        closed: closed.clone(),
    };
    let handle = ChannelFrameHandle {
        tx: to_stream,
        rx: from_stream,
        closed,
    };
    (stream, handle)
}

/// The stream side of [`channel_stream`]; add it to a bus.
pub struct ChannelFrameStream {
    incoming: Mutex<mpsc::Receiver<Frame>>,
    outgoing: mpsc::Sender<Frame>,
    closed: CancellationToken,
}

#[async_trait]
impl Closer for ChannelFrameStream {
    async fn close(&self) -> Result<()> {
        self.closed.cancel();
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }
}

#[async_trait]
impl FrameReader for ChannelFrameStream {
    async fn read(&self) -> Result<Option<Frame>> {
        if self.is_closed() {
            return Err(Error::Closed);
        }
        let mut incoming = self.incoming.lock().await;
        tokio::select! {
            _ = self.closed.cancelled() => Err(Error::Closed),
            frame = incoming.recv() => match frame {
                Some(frame) => Ok(Some(frame)),
                None => {
                    self.closed.cancel();
                    Err(Error::Closed)
                }
            },
        }
    }
}

#[async_trait]
impl FrameWriter for ChannelFrameStream {
    async fn write(&self, frame: &Frame) -> Result<()> {
        if self.is_closed() {
            return Err(Error::Closed);
        }
        tokio::select! {
            _ = self.closed.cancelled() => Err(Error::Closed),
            sent = self.outgoing.send(frame.clone()) => sent.map_err(|_| {
                self.closed.cancel();
                Error::Closed
            }),
        }
    }
}

/// The application side of [`channel_stream`].
pub struct ChannelFrameHandle {
    tx: mpsc::Sender<Frame>,
    rx: mpsc::Receiver<Frame>,
    closed: CancellationToken,
}

impl ChannelFrameHandle {
    /// Sends a frame to be read from the stream. Waits while the stream's
    /// buffer is full.
    pub async fn send(&self, frame: Frame) -> Result<()> {
        if self.is_closed() {
            return Err(Error::Closed);
        }
        tokio::select! {
            _ = self.closed.cancelled() => Err(Error::Closed),
            sent = self.tx.send(frame) => sent.map_err(|_| Error::Closed),
        }
    }

    /// Receives the next frame written to the stream.
    ///
    /// Frames already buffered are still returned after close; `None`
    /// means closed and drained.
    pub async fn recv(&mut self) -> Option<Frame> {
        if let Ok(frame) = self.rx.try_recv() {
            return Some(frame);
        }
        tokio::select! {
            biased;
            frame = self.rx.recv() => frame,
            _ = self.closed.cancelled() => self.rx.try_recv().ok(),
        }
    }

    pub fn try_recv(&mut self) -> Option<Frame> {
        self.rx.try_recv().ok()
    }

    pub fn close(&self) {
        self.closed.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }
}

impl Drop for ChannelFrameHandle {
    fn drop(&mut self) {
        self.closed.cancel();
    }
}

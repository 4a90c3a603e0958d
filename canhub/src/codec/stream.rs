//! Frame stream over a byte stream, using the RealDash codec.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use log::{debug, trace, warn};
use tokio::sync::Mutex;

use super::{encode_variable, FrameDecoder};
use crate::core::Frame;
use crate::error::{Error, Result};
use crate::io::{ByteReaderIter, ByteStream, Closer, FrameReader, FrameWriter};

/// Decoder state owned by the read side.
struct ReadState<S: ?Sized> {
    bytes: ByteReaderIter<S>,
    decoder: FrameDecoder,
}

/// Reads and writes RealDash frames on a byte stream.
///
/// Reads decode both frame variants; writes always use the variable form.
/// Closing the frame stream closes the byte stream under it.
pub struct CodecStream<S: ?Sized> {
    inner: Arc<S>,
    read_state: Mutex<ReadState<S>>,
    parse_errors: AtomicU64,
}

impl<S: ByteStream + ?Sized> CodecStream<S> {
    pub fn new(inner: Arc<S>) -> Self {
        Self {
            read_state: Mutex::new(ReadState {
                bytes: ByteReaderIter::new(inner.clone()),
                decoder: FrameDecoder::new(),
            }),
            inner,
            parse_errors: AtomicU64::new(0),
        }
    }

    /// Number of recoverable parse errors seen so far.
    pub fn parse_errors(&self) -> u64 {
        self.parse_errors.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl<S: ByteStream + ?Sized> Closer for CodecStream<S> {
    async fn close(&self) -> Result<()> {
        self.inner.close().await
    }

    fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}

#[async_trait]
impl<S: ByteStream + ?Sized> FrameReader for CodecStream<S> {
    /// Reads until a valid frame is decoded.
    ///
    /// Parse errors are logged and counted, never returned. Returns
    /// [`Error::Closed`] once the byte stream is closed.
    async fn read(&self) -> Result<Option<Frame>> {
        let mut state = self.read_state.lock().await;
        let ReadState { bytes, decoder } = &mut *state;
        while let Some(byte) = bytes.next_byte().await {
            match decoder.push(byte) {
                Ok(Some(frame)) => {
                    trace!("decoded frame {}", frame);
                    return Ok(Some(frame));
                }
                Ok(None) => {}
                Err(e) if e.is_structural() => {
                    self.parse_errors.fetch_add(1, Ordering::Relaxed);
                    debug!("{}", e);
                }
                Err(e) => {
                    self.parse_errors.fetch_add(1, Ordering::Relaxed);
                    warn!("{}", e);
                }
            }
        }
        Err(Error::Closed)
    }
}

#[async_trait]
impl<S: ByteStream + ?Sized> FrameWriter for CodecStream<S> {
    async fn write(&self, frame: &Frame) -> Result<()> {
        let bytes = match encode_variable(frame) {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!("discarding frame {:#x}: {}", frame.id, e);
                return Ok(());
            }
        };
        self.inner.write_all(&bytes).await
    }
}

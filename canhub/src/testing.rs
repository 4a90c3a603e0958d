//! Scripted streams for unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::core::Frame;
use crate::error::{Error, Result};
use crate::io::{
    ByteReader, ByteWriter, Closer, DEFAULT_READ_BUFFER_SIZE, FrameReader, FrameWriter,
};

/// Decrements `counter` if it is above zero. Returns true if it was.
fn take_one(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

fn injected_error() -> Error {
    Error::Io(std::io::Error::other("injected failure"))
}

/// A byte stream that replays fixed chunks and records writes.
///
/// Once every chunk has been read the stream closes itself, the way a
/// socket reports EOF.
pub(crate) struct FakeByteStream {
    chunks: Mutex<VecDeque<Vec<u8>>>,
    read_chunk: usize,
    read_buffer_size: usize,
    write_limit: usize,
    read_errors: AtomicUsize,
    stalled_writes: AtomicUsize,
    written: Mutex<Vec<u8>>,
    write_calls: AtomicUsize,
    closed: AtomicBool,
}

impl FakeByteStream {
    pub(crate) fn new(chunks: Vec<Vec<u8>>) -> Self {
        Self {
            chunks: Mutex::new(chunks.into()),
            read_chunk: usize::MAX,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            write_limit: 0,
            read_errors: AtomicUsize::new(0),
            stalled_writes: AtomicUsize::new(0),
            written: Mutex::new(Vec::new()),
            write_calls: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        }
    }

    /// Caps the bytes returned by one read.
    pub(crate) fn with_read_chunk(mut self, n: usize) -> Self {
        self.read_chunk = n;
        self
    }

    pub(crate) fn with_read_buffer_size(mut self, n: usize) -> Self {
        self.read_buffer_size = n;
        self
    }

    /// Caps the bytes accepted by one write. 0 means unlimited.
    pub(crate) fn with_write_limit(mut self, n: usize) -> Self {
        self.write_limit = n;
        self
    }

    /// Fails the next `n` reads with an I/O error.
    pub(crate) fn with_read_errors(self, n: usize) -> Self {
        self.read_errors.store(n, Ordering::SeqCst);
        self
    }

    /// Makes the next `n` writes accept nothing.
    pub(crate) fn with_stalled_writes(self, n: usize) -> Self {
        self.stalled_writes.store(n, Ordering::SeqCst);
        self
    }

    pub(crate) fn written(&self) -> Vec<u8> {
        self.written.lock().clone()
    }

    pub(crate) fn write_calls(&self) -> usize {
        self.write_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Closer for FakeByteStream {
    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ByteReader for FakeByteStream {
    fn read_buffer_size(&self) -> usize {
        self.read_buffer_size
    }

    async fn read(&self, buf: &mut [u8]) -> Result<usize> {
        if self.is_closed() {
            return Err(Error::Closed);
        }
        if take_one(&self.read_errors) {
            return Err(injected_error());
        }
        let mut chunks = self.chunks.lock();
        let Some(mut chunk) = chunks.pop_front() else {
            self.closed.store(true, Ordering::SeqCst);
            return Ok(0);
        };
        let n = chunk.len().min(buf.len()).min(self.read_chunk);
        buf[..n].copy_from_slice(&chunk[..n]);
        if n < chunk.len() {
            chunks.push_front(chunk.split_off(n));
        }
        Ok(n)
    }
}

#[async_trait]
impl ByteWriter for FakeByteStream {
    async fn write(&self, buf: &[u8]) -> Result<usize> {
        if self.is_closed() {
            return Err(Error::Closed);
        }
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        if take_one(&self.stalled_writes) {
            return Ok(0);
        }
        let n = match self.write_limit {
            0 => buf.len(),
            limit => buf.len().min(limit),
        };
        self.written.lock().extend_from_slice(&buf[..n]);
        Ok(n)
    }
}

/// Wraps a frame stream and fails a set number of reads and writes.
pub(crate) struct FlakyFrameStream<S> {
    inner: S,
    read_errors: AtomicUsize,
    write_errors: AtomicUsize,
}

impl<S> FlakyFrameStream<S> {
    pub(crate) fn new(inner: S, read_errors: usize, write_errors: usize) -> Self {
        Self {
            inner,
            read_errors: AtomicUsize::new(read_errors),
            write_errors: AtomicUsize::new(write_errors),
        }
    }
}

#[async_trait]
impl<S: Closer> Closer for FlakyFrameStream<S> {
    async fn close(&self) -> Result<()> {
        self.inner.close().await
    }

    fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}

#[async_trait]
impl<S: FrameReader> FrameReader for FlakyFrameStream<S> {
    async fn read(&self) -> Result<Option<Frame>> {
        if take_one(&self.read_errors) {
            return Err(injected_error());
        }
        self.inner.read().await
    }
}

#[async_trait]
impl<S: FrameWriter> FrameWriter for FlakyFrameStream<S> {
    async fn write(&self, frame: &Frame) -> Result<()> {
        if take_one(&self.write_errors) {
            return Err(injected_error());
        }
        self.inner.write(frame).await
    }
}

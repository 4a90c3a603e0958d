//! Stream capability contracts.
//!
//! The bus and the codec depend only on these traits, never on a concrete
//! transport. Every method takes `&self`: a bus member is read by one task
//! and written by another at the same time, so implementations keep their
//! own interior state.
//!
//! ```text
//!  ByteReader ─┐                       FrameReader ─┐
//!              ├─ ByteStream ──codec──▶             ├─ FrameStream ──▶ FrameBus
//!  ByteWriter ─┘                       FrameWriter ─┘
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use log::warn;

use crate::core::Frame;
use crate::error::{Error, Result};

/// Read buffer size used when a reader does not advertise its own.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 4096;

/// Something that can be closed and asked whether it is.
#[async_trait]
pub trait Closer: Send + Sync {
    /// Closes the object.
    ///
    /// Idempotent: calling this more than once is not an error. An error is
    /// returned only if the object is still open after the call.
    async fn close(&self) -> Result<()>;

    /// Returns true once the object is closed.
    fn is_closed(&self) -> bool;
}

/// Reads raw bytes from a transport.
#[async_trait]
pub trait ByteReader: Closer {
    /// The ideal read buffer size in bytes. Callers are free to ignore it.
    fn read_buffer_size(&self) -> usize {
        DEFAULT_READ_BUFFER_SIZE
    }

    /// Reads bytes into `buf` and returns how many were read.
    ///
    /// A timeout is not an error: nothing is read and 0 is returned.
    async fn read(&self, buf: &mut [u8]) -> Result<usize>;
}

/// Writes raw bytes to a transport.
#[async_trait]
pub trait ByteWriter: Closer {
    /// Writes bytes from `buf` and returns how many were written.
    ///
    /// Partial writes are legal; the caller retries with the remainder.
    async fn write(&self, buf: &[u8]) -> Result<usize>;

    /// Writes all bytes, retrying partial writes until done.
    async fn write_all(&self, mut buf: &[u8]) -> Result<()> {
        while !buf.is_empty() {
            if self.is_closed() {
                return Err(Error::Closed);
            }
            let n = self.write(buf).await?.min(buf.len());
            if n == 0 {
                tokio::task::yield_now().await;
            }
            buf = &buf[n..];
        }
        Ok(())
    }
}

/// A bidirectional byte stream.
pub trait ByteStream: ByteReader + ByteWriter {}

impl<T: ByteReader + ByteWriter + ?Sized> ByteStream for T {}

/// Reads frames, typically by decoding an underlying [`ByteReader`].
#[async_trait]
pub trait FrameReader: Closer {
    /// Reads the next frame.
    ///
    /// `Ok(None)` means no frame is available right now. Errors may be
    /// retried as long as [`Closer::is_closed`] returns false.
    async fn read(&self) -> Result<Option<Frame>>;
}

/// Writes frames, typically by encoding onto an underlying [`ByteWriter`].
#[async_trait]
pub trait FrameWriter: Closer {
    /// Writes a frame. Frames the stream cannot carry are discarded without
    /// an error.
    async fn write(&self, frame: &Frame) -> Result<()>;
}

/// A bidirectional frame stream; the unit of membership on a bus.
pub trait FrameStream: FrameReader + FrameWriter {}

impl<T: FrameReader + FrameWriter + ?Sized> FrameStream for T {}

/// Yields the bytes of a [`ByteReader`] one at a time.
///
/// Reads are buffered into a window of the reader's advertised size and the
/// reader is only asked again once the window is exhausted. Iteration ends
/// exactly when the reader reports closed; bytes already buffered are still
/// handed out first.
pub struct ByteReaderIter<R: ?Sized> {
    reader: Arc<R>,
    buf: Vec<u8>,
    pos: usize,
    len: usize,
}

impl<R: ByteReader + ?Sized> ByteReaderIter<R> {
    pub fn new(reader: Arc<R>) -> Self {
        let size = reader.read_buffer_size().max(1);
        Self {
            reader,
            buf: vec![0u8; size],
            pos: 0,
            len: 0,
        }
    }

    /// Returns the next byte, or `None` once the reader is closed.
    pub async fn next_byte(&mut self) -> Option<u8> {
        if self.pos >= self.len && !self.fetch().await {
            return None;
        }
        let byte = self.buf[self.pos];
        self.pos += 1;
        Some(byte)
    }

    /// Refills the window. Returns false when the reader is closed.
    async fn fetch(&mut self) -> bool {
        while self.pos >= self.len {
            if self.reader.is_closed() {
                return false;
            }
            self.pos = 0;
            self.len = 0;
            match self.reader.read(&mut self.buf).await {
                Ok(n) => self.len = n.min(self.buf.len()),
                Err(Error::Closed) => return false,
                Err(e) => {
                    warn!("reader error, will retry: {}", e);
                    tokio::task::yield_now().await;
                }
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeByteStream;

    #[tokio::test]
    async fn test_read_until_closed() {
        let expect = hex::decode("f4080eef392c1b4c").unwrap();
        let reader = Arc::new(FakeByteStream::new(vec![expect.clone()]).with_read_chunk(2));
        let mut iter = ByteReaderIter::new(reader.clone());

        let mut actual = Vec::new();
        while let Some(byte) = iter.next_byte().await {
            actual.push(byte);
        }
        assert_eq!(actual, expect);
        assert!(reader.is_closed());
    }

    #[tokio::test]
    async fn test_small_read_buffer() {
        let reader = Arc::new(
            FakeByteStream::new(vec![vec![1, 2, 3], vec![4, 5]]).with_read_buffer_size(1),
        );
        let mut iter = ByteReaderIter::new(reader);

        let mut actual = Vec::new();
        while let Some(byte) = iter.next_byte().await {
            actual.push(byte);
        }
        assert_eq!(actual, vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn test_closed_reader_yields_nothing() {
        let reader = Arc::new(FakeByteStream::new(vec![vec![1, 2, 3]]));
        reader.close().await.unwrap();
        let mut iter = ByteReaderIter::new(reader);
        assert_eq!(iter.next_byte().await, None);
    }

    #[tokio::test]
    async fn test_write_all_retries_partial_writes() {
        let writer = FakeByteStream::new(Vec::new()).with_write_limit(3);
        writer.write_all(b"0123456789").await.unwrap();
        assert_eq!(writer.written(), b"0123456789");
        assert_eq!(writer.write_calls(), 4);
    }

    #[tokio::test]
    async fn test_read_errors_are_retried() {
        let reader = Arc::new(
            FakeByteStream::new(vec![vec![1, 2], vec![3]]).with_read_errors(3),
        );
        let mut iter = ByteReaderIter::new(reader.clone());

        let mut actual = Vec::new();
        while let Some(byte) = iter.next_byte().await {
            actual.push(byte);
        }
        assert_eq!(actual, vec![1, 2, 3]);
        assert!(reader.is_closed());
    }

    #[tokio::test]
    async fn test_write_all_survives_empty_writes() {
        let writer = FakeByteStream::new(Vec::new()).with_stalled_writes(3);
        writer.write_all(b"abc").await.unwrap();
        assert_eq!(writer.written(), b"abc");
        assert_eq!(writer.write_calls(), 4);
    }

    /// Claims more bytes than it was given.
    struct OverReportingWriter {
        written: parking_lot::Mutex<Vec<u8>>,
    }

    #[async_trait]
    impl Closer for OverReportingWriter {
        async fn close(&self) -> Result<()> {
            Ok(())
        }

        fn is_closed(&self) -> bool {
            false
        }
    }

    #[async_trait]
    impl ByteWriter for OverReportingWriter {
        async fn write(&self, buf: &[u8]) -> Result<usize> {
            self.written.lock().extend_from_slice(buf);
            Ok(buf.len() + 16)
        }
    }

    #[tokio::test]
    async fn test_write_all_clamps_reported_length() {
        let writer = OverReportingWriter {
            written: parking_lot::Mutex::new(Vec::new()),
        };
        writer.write_all(b"0123").await.unwrap();
        assert_eq!(*writer.written.lock(), b"0123");
    }

    #[tokio::test]
    async fn test_write_all_on_closed_writer() {
        let writer = FakeByteStream::new(Vec::new());
        writer.close().await.unwrap();
        assert!(matches!(writer.write_all(b"x").await, Err(Error::Closed)));
    }
}

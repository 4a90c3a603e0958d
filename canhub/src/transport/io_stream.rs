use std::io::ErrorKind;

use async_trait::async_trait;
use log::{debug, warn};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpStream, UnixStream, tcp, unix};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::io::{ByteReader, ByteWriter, Closer};

/// Byte stream over a TCP connection.
pub type TcpByteStream = IoByteStream<tcp::OwnedReadHalf, tcp::OwnedWriteHalf>;

/// Byte stream over a Unix domain socket.
pub type UnixByteStream = IoByteStream<unix::OwnedReadHalf, unix::OwnedWriteHalf>;

/// A byte stream over separate tokio read and write halves.
///
/// End of stream or an I/O error closes the stream. Closing shuts down the
/// write half and wakes any pending read or write.
pub struct IoByteStream<R, W> {
    reader: Mutex<R>,
    writer: Mutex<W>,
    closed: CancellationToken,
    peer: String,
}

impl<R, W> IoByteStream<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    /// `peer` names the remote end in log messages.
    pub fn new(reader: R, writer: W, peer: impl Into<String>) -> Self {
        Self {
            reader: Mutex::new(reader),
            writer: Mutex::new(writer),
            closed: CancellationToken::new(),
            peer: peer.into(),
        }
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }
}

impl TcpByteStream {
    pub fn tcp(stream: TcpStream) -> Self {
        let peer = stream
            .peer_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_else(|_| "tcp".to_string());
        if let Err(e) = stream.set_nodelay(true) {
            debug!("{}: set_nodelay failed: {}", peer, e);
        }
        let (reader, writer) = stream.into_split();
        Self::new(reader, writer, peer)
    }
}

impl UnixByteStream {
    pub fn unix(stream: UnixStream) -> Self {
        let peer = stream
            .peer_addr()
            .ok()
            .and_then(|addr| addr.as_pathname().map(|path| path.display().to_string()))
            .unwrap_or_else(|| "unix".to_string());
        let (reader, writer) = stream.into_split();
        Self::new(reader, writer, peer)
    }
}

#[async_trait]
impl<R, W> Closer for IoByteStream<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn close(&self) -> Result<()> {
        if self.closed.is_cancelled() {
            return Ok(());
        }
        self.closed.cancel();
        let mut writer = self.writer.lock().await;
        if let Err(e) = writer.shutdown().await {
            debug!("{}: shutdown failed: {}", self.peer, e);
        }
        debug!("{}: closed", self.peer);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }
}

#[async_trait]
impl<R, W> ByteReader for IoByteStream<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn read(&self, buf: &mut [u8]) -> Result<usize> {
        if self.is_closed() {
            return Err(Error::Closed);
        }
        let result = {
            let mut reader = self.reader.lock().await;
            tokio::select! {
                _ = self.closed.cancelled() => return Err(Error::Closed),
                result = reader.read(buf) => result,
            }
        };
        match result {
            Ok(0) if !buf.is_empty() => {
                debug!("{}: end of stream", self.peer);
                self.close().await?;
                Ok(0)
            }
            Ok(n) => Ok(n),
            Err(e) if e.kind() == ErrorKind::Interrupted => Ok(0),
            Err(e) => {
                warn!("{}: read failed: {}", self.peer, e);
                self.close().await?;
                Err(e.into())
            }
        }
    }
}

#[async_trait]
impl<R, W> ByteWriter for IoByteStream<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn write(&self, buf: &[u8]) -> Result<usize> {
        if self.is_closed() {
            return Err(Error::Closed);
        }
        let result = {
            let mut writer = self.writer.lock().await;
            tokio::select! {
                _ = self.closed.cancelled() => return Err(Error::Closed),
                result = async {
                    let n = writer.write(buf).await?;
                    writer.flush().await?;
                    Ok::<_, std::io::Error>(n)
                } => result,
            }
        };
        match result {
            Ok(0) if !buf.is_empty() => {
                debug!("{}: peer stopped accepting data", self.peer);
                self.close().await?;
                Err(Error::Closed)
            }
            Ok(n) => Ok(n),
            Err(e) if e.kind() == ErrorKind::Interrupted => Ok(0),
            Err(e) => {
                warn!("{}: write failed: {}", self.peer, e);
                self.close().await?;
                Err(e.into())
            }
        }
    }
}

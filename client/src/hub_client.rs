use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use canhub::{ByteStream, Frame, FrameStream, IoByteStream, ProtocolRegistry, Result};
use log::*;
use tokio::net::{TcpStream, UnixStream};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientTarget {
    Unix(PathBuf),
    Tcp(SocketAddr),
}

impl fmt::Display for ClientTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientTarget::Unix(path) => write!(f, "unix://{}", path.display()),
            ClientTarget::Tcp(addr) => write!(f, "tcp://{}", addr),
        }
    }
}

/// A frame to send repeatedly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Injection {
    pub frame: Frame,
    pub interval: Duration,
}

/// Connects to a hub, logs every frame it relays and optionally injects
/// frames of its own.
pub struct HubClient {
    target: ClientTarget,
    protocol: String,
    registry: ProtocolRegistry,
}

impl HubClient {
    pub fn new(target: ClientTarget, protocol: impl Into<String>) -> Self {
        Self {
            target,
            protocol: protocol.into(),
            registry: ProtocolRegistry::with_defaults(),
        }
    }

    pub async fn connect(&self) -> Result<Arc<dyn FrameStream>> {
        info!("Connecting to target: {}", self.target);
        let stream: Arc<dyn ByteStream> = match &self.target {
            ClientTarget::Unix(path) => {
                let stream = UnixStream::connect(path).await?;
                info!("Unix socket connected.");
                Arc::new(IoByteStream::unix(stream))
            }
            ClientTarget::Tcp(addr) => {
                let stream = TcpStream::connect(addr).await?;
                info!("TCP socket connected.");
                Arc::new(IoByteStream::tcp(stream))
            }
        };
        self.registry.wrap(&self.protocol, stream)
    }

    /// Runs until the hub disconnects, `limit` frames have been received,
    /// or `stop` is cancelled. Returns the number of frames received.
    pub async fn run(
        &self,
        injection: Option<Injection>,
        limit: Option<u64>,
        stop: CancellationToken,
    ) -> Result<u64> {
        let stream = self.connect().await?;
        let done = stop.child_token();

        let injector = injection.map(|injection| {
            tokio::spawn(Self::inject(stream.clone(), injection, done.clone()))
        });

        let mut received = 0u64;
        while !stream.is_closed() && limit.is_none_or(|limit| received < limit) {
            let frame = tokio::select! {
                _ = done.cancelled() => break,
                frame = stream.read() => frame,
            };
            match frame {
                Ok(Some(frame)) => {
                    received += 1;
                    info!("Received frame {}", frame);
                }
                Ok(None) => {}
                Err(e) if e.is_closed() => info!("Connection closed by remote"),
                Err(e) => warn!("Read failed: {}", e),
            }
        }

        done.cancel();
        if let Some(injector) = injector {
            if let Err(e) = injector.await {
                warn!("Injector task failed: {}", e);
            }
        }
        stream.close().await?;
        info!("Client finished after {} frames", received);
        Ok(received)
    }

    async fn inject(stream: Arc<dyn FrameStream>, injection: Injection, done: CancellationToken) {
        let mut ticker = tokio::time::interval(injection.interval);
        loop {
            tokio::select! {
                _ = done.cancelled() => break,
                _ = ticker.tick() => {}
            }
            match stream.write(&injection.frame).await {
                Ok(()) => debug!("Sent frame {}", injection.frame),
                Err(e) if e.is_closed() => break,
                Err(e) => warn!("Write failed: {}", e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canhub::codec::encode_variable;
    use canhub::REALDASH;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_receives_and_injects() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = HubClient::new(ClientTarget::Tcp(addr), REALDASH);

        let injected = Frame::new(0x100, vec![9, 9, 9, 9]);
        let injection = Injection {
            frame: injected.clone(),
            interval: Duration::from_millis(10),
        };
        let run = tokio::spawn(async move {
            client
                .run(Some(injection), Some(2), CancellationToken::new())
                .await
        });

        let (mut hub, _) = listener.accept().await.unwrap();
        let expected = encode_variable(&injected).unwrap();
        let mut buf = vec![0u8; expected.len()];
        hub.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf, expected);

        for id in 0..2u64 {
            let frame = Frame::new(0x200 + id, vec![id as u8; 8]);
            hub.write_all(&encode_variable(&frame).unwrap()).await.unwrap();
        }
        let received = tokio::time::timeout(Duration::from_secs(5), run)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(received, 2);
    }

    #[tokio::test]
    async fn test_stops_when_hub_disconnects() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = HubClient::new(ClientTarget::Tcp(addr), REALDASH);
        let run = tokio::spawn(async move { client.run(None, None, CancellationToken::new()).await });

        let (hub, _) = listener.accept().await.unwrap();
        drop(hub);
        let received = tokio::time::timeout(Duration::from_secs(5), run)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(received, 0);
    }

    #[tokio::test]
    async fn test_unknown_protocol() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let client = HubClient::new(ClientTarget::Tcp(listener.local_addr().unwrap()), "Missing");
        assert!(matches!(
            client.connect().await,
            Err(canhub::Error::UnknownProtocol(_))
        ));
    }
}

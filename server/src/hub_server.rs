use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use canhub::{
    BusConfig, ByteStream, FrameBus, FrameProtocol, HeartbeatConfig, HeartbeatStream,
    IoByteStream, ProtocolRegistry, Result,
};
use log::*;
use tokio::net::{TcpListener, UnixListener};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Pause after a failed accept so a persistent error does not spin.
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// A listening endpoint and the protocol spoken on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerTarget {
    Tcp { addr: SocketAddr, protocol: String },
    Unix { path: PathBuf, protocol: String },
}

impl ServerTarget {
    fn protocol(&self) -> &str {
        match self {
            ServerTarget::Tcp { protocol, .. } | ServerTarget::Unix { protocol, .. } => protocol,
        }
    }
}

impl fmt::Display for ServerTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerTarget::Tcp { addr, protocol } => write!(f, "tcp://{} ({})", addr, protocol),
            ServerTarget::Unix { path, protocol } => {
                write!(f, "unix://{} ({})", path.display(), protocol)
            }
        }
    }
}

enum Listener {
    Tcp(TcpListener),
    Unix(UnixListener),
}

impl Listener {
    async fn accept(&self) -> std::io::Result<Arc<dyn ByteStream>> {
        match self {
            Listener::Tcp(listener) => {
                let (stream, peer) = listener.accept().await?;
                info!("Accepted TCP connection from {:?}", peer);
                Ok(Arc::new(IoByteStream::tcp(stream)))
            }
            Listener::Unix(listener) => {
                let (stream, _) = listener.accept().await?;
                info!("Accepted Unix connection");
                Ok(Arc::new(IoByteStream::unix(stream)))
            }
        }
    }
}

/// Owns the bus and the listeners that feed it.
pub struct HubServer {
    bus: Arc<FrameBus>,
    registry: ProtocolRegistry,
    shutdown: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
    unix_paths: Vec<PathBuf>,
}

impl HubServer {
    pub fn new(config: BusConfig, registry: ProtocolRegistry) -> Self {
        Self {
            bus: Arc::new(FrameBus::new(config)),
            registry,
            shutdown: CancellationToken::new(),
            tasks: Vec::new(),
            unix_paths: Vec::new(),
        }
    }

    pub fn bus(&self) -> &Arc<FrameBus> {
        &self.bus
    }

    pub fn add_heartbeat(&self, config: HeartbeatConfig) {
        info!(
            "Heartbeat frame {} every {} ms",
            config.frame,
            config.period.as_millis()
        );
        self.bus.add(Arc::new(HeartbeatStream::new(config)));
    }

    /// Binds `target` and starts accepting connections on it.
    ///
    /// Returns the bound target, which differs from `target` when it asked
    /// for TCP port 0.
    pub async fn listen(&mut self, target: ServerTarget) -> Result<ServerTarget> {
        let protocol = self
            .registry
            .get(target.protocol())
            .ok_or_else(|| canhub::Error::UnknownProtocol(target.protocol().to_string()))?;

        let (listener, bound) = match target {
            ServerTarget::Tcp { addr, protocol } => {
                let listener = TcpListener::bind(addr).await?;
                let addr = listener.local_addr()?;
                (Listener::Tcp(listener), ServerTarget::Tcp { addr, protocol })
            }
            ServerTarget::Unix { path, protocol } => {
                if path.exists() {
                    std::fs::remove_file(&path)?;
                }
                let listener = UnixListener::bind(&path)?;
                self.unix_paths.push(path.clone());
                (Listener::Unix(listener), ServerTarget::Unix { path, protocol })
            }
        };
        info!("Server listening on {}", bound);

        self.tasks.push(tokio::spawn(Self::accept_loop(
            listener,
            protocol,
            self.bus.clone(),
            self.shutdown.clone(),
        )));
        Ok(bound)
    }

    async fn accept_loop(
        listener: Listener,
        protocol: Arc<dyn FrameProtocol>,
        bus: Arc<FrameBus>,
        shutdown: CancellationToken,
    ) {
        loop {
            let accepted = tokio::select! {
                _ = shutdown.cancelled() => break,
                accepted = listener.accept() => accepted,
            };
            match accepted {
                Ok(stream) => bus.add(protocol.wrap(stream)),
                Err(e) => {
                    warn!("Accept failed: {}", e);
                    tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
                }
            }
        }
        debug!("Accept loop exiting");
    }

    /// Stops accepting, closes the bus and removes Unix socket files.
    pub async fn shutdown(&mut self) {
        self.shutdown.cancel();
        for result in futures::future::join_all(self.tasks.drain(..)).await {
            if let Err(e) = result {
                warn!("Accept task failed: {}", e);
            }
        }
        self.bus.close().await;
        for path in self.unix_paths.drain(..) {
            if let Err(e) = std::fs::remove_file(&path) {
                debug!("Failed to remove {}: {}", path.display(), e);
            }
        }
    }
}

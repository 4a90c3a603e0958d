use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use canhub::{
    BusConfig, DEFAULT_QUEUE_CAPACITY, DeviceConfigStore, DeviceKind, Frame, HeartbeatConfig,
    ProtocolRegistry, REALDASH,
};
use clap::Parser;
use log::*;

mod hub_server;

use hub_server::{HubServer, ServerTarget};

#[derive(Debug, Parser)]
#[command(name = "canhub-server", version, about = "Relays CAN frames between every connected client")]
struct Args {
    /// TCP address to listen on.
    #[arg(long, env = "CANHUB_LISTEN", default_value = "127.0.0.1:57321")]
    listen: SocketAddr,

    /// Also listen on this Unix socket.
    #[arg(long, env = "CANHUB_UNIX_SOCKET")]
    unix_socket: Option<PathBuf>,

    /// Protocol spoken by clients of the default listeners.
    #[arg(long, default_value = REALDASH)]
    protocol: String,

    /// Device configuration file; auto-connect tcp_server entries become
    /// additional listeners.
    #[arg(long, env = "CANHUB_DEVICES")]
    devices: Option<PathBuf>,

    /// Heartbeat frame as ID#HEX.
    #[arg(long, default_value = "6000#0000000000000000")]
    heartbeat_frame: Frame,

    /// Heartbeat period in milliseconds.
    #[arg(long, default_value_t = canhub::DEFAULT_HEARTBEAT_PERIOD_MS)]
    heartbeat_ms: u64,

    /// Do not add a heartbeat member.
    #[arg(long)]
    no_heartbeat: bool,

    /// Frames buffered per client before relaying waits for it.
    #[arg(long, default_value_t = DEFAULT_QUEUE_CAPACITY)]
    queue_capacity: usize,
}

/// Listeners for every auto-connect `tcp_server` device in the file.
fn device_targets(path: &Path) -> canhub::Result<Vec<ServerTarget>> {
    let store = DeviceConfigStore::load(path)?;
    let mut targets = Vec::new();
    for device in store.auto_connect() {
        match (device.kind, device.listen) {
            (DeviceKind::TcpServer, Some(addr)) => targets.push(ServerTarget::Tcp {
                addr,
                protocol: device.protocol.clone(),
            }),
            (DeviceKind::UsbSerial, _) => {
                info!("Skipping serial device {} ({}): no serial transport", device.name, device.id)
            }
            (DeviceKind::TcpServer, None) => {}
        }
    }
    Ok(targets)
}

#[tokio::main]
async fn main() -> canhub::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut targets = vec![ServerTarget::Tcp {
        addr: args.listen,
        protocol: args.protocol.clone(),
    }];
    if let Some(path) = args.unix_socket {
        targets.push(ServerTarget::Unix {
            path,
            protocol: args.protocol.clone(),
        });
    }
    if let Some(path) = &args.devices {
        targets.extend(device_targets(path)?);
    }

    let config = BusConfig::default()
        .with_outbound_capacity(args.queue_capacity)
        .with_inbound_capacity(args.queue_capacity);
    let mut server = HubServer::new(config, ProtocolRegistry::with_defaults());
    if !args.no_heartbeat {
        server.add_heartbeat(
            HeartbeatConfig::default()
                .with_frame(args.heartbeat_frame)
                .with_period(Duration::from_millis(args.heartbeat_ms)),
        );
    }

    for target in targets {
        if let Err(e) = server.listen(target).await {
            error!("Failed to start listener: {}", e);
            server.shutdown().await;
            return Err(e);
        }
    }

    tokio::signal::ctrl_c().await?;
    info!("Interrupted, shutting down");
    server.shutdown().await;

    let stats = server.bus().stats();
    info!(
        "Server stopped: {} members served, {} frames relayed",
        stats.registered, stats.frames_received
    );
    Ok(())
}

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use canhub::{Frame, REALDASH};
use clap::Parser;
use log::info;
use tokio_util::sync::CancellationToken;

mod hub_client;

use hub_client::{ClientTarget, HubClient, Injection};

#[derive(Debug, Parser)]
#[command(name = "canhub-client", version, about = "Watches and injects frames on a canhub server")]
struct Args {
    /// Server TCP address.
    #[arg(long, env = "CANHUB_SERVER", default_value = "127.0.0.1:57321", conflicts_with = "unix")]
    tcp: SocketAddr,

    /// Connect over a Unix socket instead of TCP.
    #[arg(long, env = "CANHUB_UNIX_SOCKET")]
    unix: Option<PathBuf>,

    #[arg(long, default_value = REALDASH)]
    protocol: String,

    /// Frame to send periodically, as ID#HEX (e.g. 5800#f4080eef392c1b4c).
    #[arg(long)]
    inject: Option<Frame>,

    /// Injection interval in milliseconds.
    #[arg(long, default_value_t = 1000)]
    interval_ms: u64,

    /// Exit after receiving this many frames.
    #[arg(long)]
    count: Option<u64>,
}

impl Args {
    fn target(&self) -> ClientTarget {
        match &self.unix {
            Some(path) => ClientTarget::Unix(path.clone()),
            None => ClientTarget::Tcp(self.tcp),
        }
    }

    fn injection(&self) -> Option<Injection> {
        self.inject.clone().map(|frame| Injection {
            frame,
            interval: Duration::from_millis(self.interval_ms.max(1)),
        })
    }
}

#[tokio::main]
async fn main() -> canhub::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let client = HubClient::new(args.target(), args.protocol.clone());
    let stop = CancellationToken::new();
    {
        let stop = stop.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupted, disconnecting");
                stop.cancel();
            }
        });
    }

    client.run(args.injection(), args.count, stop).await?;
    Ok(())
}

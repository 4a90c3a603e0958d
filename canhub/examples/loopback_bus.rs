//! Loopback bus example.
//!
//! This example shows how to:
//! - Start a frame bus with a heartbeat member
//! - Attach RealDash byte streams over in-memory pipes
//! - Watch encoded frames come out the other side
//!
//! Run with: cargo run --example loopback_bus

use std::sync::Arc;
use std::time::Duration;

use canhub::codec::encode_variable;
use canhub::{
    BusConfig, Frame, FrameBus, HeartbeatConfig, HeartbeatStream, IoByteStream, ProtocolRegistry,
    REALDASH,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};

fn attach(bus: &FrameBus, registry: &ProtocolRegistry) -> canhub::Result<DuplexStream> {
    let (local, remote) = tokio::io::duplex(1024);
    let (reader, writer) = tokio::io::split(local);
    let stream = Arc::new(IoByteStream::new(reader, writer, "pipe"));
    bus.add(registry.wrap(REALDASH, stream)?);
    Ok(remote)
}

#[tokio::main]
async fn main() -> canhub::Result<()> {
    println!("=== canhub Loopback Bus Example ===\n");

    let bus = FrameBus::new(BusConfig::default());
    let registry = ProtocolRegistry::with_defaults();

    // 1. Heartbeat
    let heartbeat = HeartbeatConfig::default().with_period(Duration::from_millis(200));
    println!("1. Heartbeat frame {} every {:?}", heartbeat.frame, heartbeat.period);
    bus.add(Arc::new(HeartbeatStream::new(heartbeat)));

    // 2. Two dashboards on in-memory pipes
    let mut dash_a = attach(&bus, &registry)?;
    let mut dash_b = attach(&bus, &registry)?;
    while bus.stats().members < 3 {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    println!("2. Members: {}\n", bus.stats().members);

    // 3. Dashboard A sends a frame; dashboard B receives it with the heartbeats
    let frame = Frame::new(0x5800, vec![0xf4, 0x08, 0x0e, 0xef, 0x39, 0x2c, 0x1b, 0x4c]);
    let encoded = encode_variable(&frame)?;
    println!("3. Sending {} as {} bytes", frame, encoded.len());
    dash_a.write_all(&encoded).await?;

    let mut buf = vec![0u8; 256];
    let deadline = tokio::time::Instant::now() + Duration::from_millis(500);
    while let Ok(read) = tokio::time::timeout_at(deadline, dash_b.read(&mut buf)).await {
        let n = read?;
        if n == 0 {
            break;
        }
        println!("   B received {} bytes: {:02x?}", n, &buf[..n]);
    }

    // 4. Shut down
    bus.close().await;
    let stats = bus.stats();
    println!(
        "\n4. Closed: received={} queued={} evicted={}",
        stats.frames_received, stats.frames_queued, stats.evicted
    );
    Ok(())
}

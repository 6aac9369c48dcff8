//! GOOSE engine daemon.
//!
//! Runs the engine over a UDP-tunnelled Ethernet segment and serves the
//! control channel on a Unix datagram socket. Prints final statistics as
//! JSON on exit.
//!
//! Environment variables:
//! - `GOOSE_CONTROL_SOCKET`: control socket path (default /tmp/goosed.sock)
//! - `GOOSE_INTERFACE`: emulated interface name (default eth0)
//! - `GOOSE_MAC`: interface hardware address
//! - `GOOSE_BIND`: UDP bind address for the segment
//! - `GOOSE_PEERS`: comma-separated UDP peers of the segment

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use goose_tools::{DEFAULT_CONTROL_SOCKET, init_tracing};
use goose_transport::control::ControlSocket;
use goose_transport::transport::{DeviceTable, UdpSegmentBuilder};
use goose_transport::{GooseEngineBuilder, InterfaceName, MacAddress};
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(name = "goosed", about = "GOOSE transport engine daemon")]
struct Cli {
    /// Control socket path.
    #[arg(long, env = "GOOSE_CONTROL_SOCKET", default_value = DEFAULT_CONTROL_SOCKET)]
    control: PathBuf,

    /// Emulated interface name; also the default egress interface.
    #[arg(long, env = "GOOSE_INTERFACE", default_value = "eth0")]
    interface: InterfaceName,

    /// Hardware address of the emulated interface.
    #[arg(long, env = "GOOSE_MAC", default_value = "02:00:00:00:00:01")]
    mac: MacAddress,

    /// UDP address carrying the segment.
    #[arg(long, env = "GOOSE_BIND", default_value = "127.0.0.1:18800")]
    bind: SocketAddr,

    /// Segment peers.
    #[arg(long = "peer", env = "GOOSE_PEERS", value_delimiter = ',')]
    peers: Vec<SocketAddr>,

    /// Delivery delay threshold (ms).
    #[arg(long, default_value_t = 50)]
    delay_threshold_ms: u32,

    /// Initial retransmission interval (ms).
    #[arg(long, default_value_t = 10)]
    retransmit_interval_ms: u32,

    /// Retransmission interval increment (ms).
    #[arg(long, default_value_t = 0)]
    retransmit_increment_ms: u32,

    /// Maximum retransmission interval (ms).
    #[arg(long, default_value_t = 10)]
    max_retransmit_interval_ms: u32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    init_tracing();
    let cli = Cli::parse();

    let mut segment = UdpSegmentBuilder::new(cli.interface.clone(), cli.mac);
    for peer in &cli.peers {
        segment = segment.peer(*peer);
    }
    let segment = Arc::new(segment.bind(cli.bind).await?);
    let devices = Arc::new(DeviceTable::new());
    devices.insert(segment.clone());

    let control = Arc::new(ControlSocket::bind(&cli.control)?);
    let engine = GooseEngineBuilder::new()
        .default_interface(cli.interface.clone())
        .delay_threshold_ms(cli.delay_threshold_ms)
        .retransmit_schedule(
            cli.retransmit_interval_ms,
            cli.retransmit_increment_ms,
            cli.max_retransmit_interval_ms,
        )
        .registry(devices)
        .frame_source(segment.clone())
        .control_sink(control.clone())
        .build()?;

    info!(
        control = %cli.control.display(),
        device = %cli.interface,
        bind = %segment.local_addr()?,
        peers = ?segment.peers(),
        "goosed running"
    );

    let segment_task = tokio::spawn(segment.clone().run(engine.shutdown_signal()));
    let control_task = tokio::spawn(
        control
            .clone()
            .run(engine.dispatcher().clone(), engine.shutdown_signal()),
    );

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    engine.shutdown().await;

    for (name, task) in [("segment", segment_task), ("control", control_task)] {
        match task.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(task = name, error = %e, "receive loop failed"),
            Err(e) => error!(task = name, error = %e, "receive loop panicked"),
        }
    }

    println!("{}", serde_json::to_string_pretty(&engine.stats().snapshot())?);
    Ok(())
}

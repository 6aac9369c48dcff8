//! GOOSE send controller.
//!
//! Registers with the engine, pushes retransmission parameters, sends one
//! unicast frame and reports how long the echoed reply took.

use std::time::{Duration, Instant};

use clap::Parser;
use goose_tools::{ControllerArgs, ToolError, init_tracing};
use goose_transport::control::{ControllerClient, ControllerEvent};
use goose_transport::wire::{SendData, SetParameters};
use goose_transport::{Destination, GooseFrame, InterfaceName, MacAddress};
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "goose-send", about = "Send one GOOSE frame and time the reply")]
struct Cli {
    #[command(flatten)]
    socket: ControllerArgs,

    /// Destination station.
    #[arg(long, default_value = "aa:bb:cc:dd:ee:ff")]
    dest: MacAddress,

    /// Egress interface; the engine default when omitted.
    #[arg(long)]
    device: Option<InterfaceName>,

    /// GOOSE application identifier.
    #[arg(long, default_value_t = 1)]
    app_id: u16,

    /// APDU text.
    #[arg(long, default_value = "PING")]
    payload: String,

    /// Send once instead of through the retransmission engine.
    #[arg(long)]
    unreliable: bool,

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

    /// How long to wait for the reply (ms).
    #[arg(long, default_value_t = 1000)]
    timeout_ms: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    init_tracing();
    let cli = Cli::parse();

    let client = ControllerClient::connect(cli.socket.local_path("goose-send"), &cli.socket.engine)?;
    client.register().await?;
    client
        .set_parameters(SetParameters {
            delay_threshold_ms: cli.delay_threshold_ms,
            initial_interval_ms: cli.retransmit_interval_ms,
            max_interval_ms: cli.max_retransmit_interval_ms,
            increment_ms: cli.retransmit_increment_ms,
            default_device: None,
        })
        .await?;

    let frame = GooseFrame::new(cli.app_id, cli.payload.into_bytes()).map_err(ToolError::from)?;
    let started = Instant::now();
    client
        .send(SendData {
            device: cli.device,
            destination: Destination::Unicast(cli.dest),
            source: MacAddress::ZERO,
            reliable: !cli.unreliable,
            frame,
        })
        .await?;

    let timeout = Duration::from_millis(cli.timeout_ms);
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let event = tokio::time::timeout_at(deadline, client.recv())
            .await
            .map_err(|_| ToolError::Timeout(timeout))??;
        match event {
            ControllerEvent::Report(report) => {
                println!("{}", serde_json::to_string(&report)?);
            }
            ControllerEvent::Inbound(inbound) if inbound.source == cli.dest => {
                let rtt = started.elapsed();
                info!(
                    device = %inbound.device,
                    app_id = inbound.frame.app_id(),
                    rtt_us = rtt.as_micros() as u64,
                    "reply received"
                );
                println!("reply from {} in {:.3} ms", inbound.source, rtt.as_secs_f64() * 1e3);
                return Ok(());
            }
            ControllerEvent::Inbound(_) => {}
        }
    }
}

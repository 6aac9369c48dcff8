//! GOOSE echo controller.
//!
//! Registers with the engine and sends every inbound GOOSE frame back to
//! its source, out of the interface it arrived on.

use clap::Parser;
use goose_tools::{ControllerArgs, init_tracing};
use goose_transport::control::{ControllerClient, ControllerEvent};
use goose_transport::wire::SendData;
use goose_transport::{Destination, MacAddress};
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "goose-echo", about = "Echo inbound GOOSE frames back to their sender")]
struct Cli {
    #[command(flatten)]
    socket: ControllerArgs,

    /// Echo through the retransmission engine.
    #[arg(long)]
    reliable: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    init_tracing();
    let cli = Cli::parse();

    let client = ControllerClient::connect(cli.socket.local_path("goose-echo"), &cli.socket.engine)?;
    client.register().await?;
    info!(engine = %cli.socket.engine.display(), "registered, echoing");

    loop {
        tokio::select! {
            event = client.recv() => match event {
                Ok(ControllerEvent::Inbound(inbound)) => {
                    info!(
                        device = %inbound.device,
                        source = %inbound.source,
                        app_id = inbound.frame.app_id(),
                        len = inbound.frame.apdu().len(),
                        "frame received, echoing"
                    );
                    let echo = SendData {
                        device: Some(inbound.device),
                        destination: Destination::Unicast(inbound.source),
                        source: MacAddress::ZERO,
                        reliable: cli.reliable,
                        frame: inbound.frame,
                    };
                    if let Err(e) = client.send(echo).await {
                        warn!(error = %e, "echo not sent");
                    }
                }
                Ok(ControllerEvent::Report(report)) => {
                    info!(report = %serde_json::to_string(&report)?, "delivery report");
                }
                Err(e) => warn!(error = %e, "control message ignored"),
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    Ok(())
}

//! Shared plumbing for the GOOSE tools.
//!
//! Environment variables (each overridable by a flag):
//! - `GOOSE_CONTROL_SOCKET`: engine control socket path
//! - `GOOSE_CLIENT_SOCKET`: controller socket path
//! - `RUST_LOG`: log filter, default `info`

use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use goose_transport::FrameError;
use goose_transport::control::ChannelError;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Default engine control socket.
pub const DEFAULT_CONTROL_SOCKET: &str = "/tmp/goosed.sock";

/// Errors surfaced by the controller tools.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Control channel failure.
    #[error(transparent)]
    Channel(#[from] ChannelError),

    /// Frame could not be built.
    #[error(transparent)]
    Frame(#[from] FrameError),

    /// No reply within the deadline.
    #[error("no reply within {0:?}")]
    Timeout(Duration),
}

/// Control socket addressing shared by controller tools.
#[derive(Debug, Clone, Args)]
pub struct ControllerArgs {
    /// Engine control socket.
    #[arg(long, env = "GOOSE_CONTROL_SOCKET", default_value = DEFAULT_CONTROL_SOCKET)]
    pub engine: PathBuf,

    /// Local socket the engine replies to.
    #[arg(long, env = "GOOSE_CLIENT_SOCKET")]
    pub local: Option<PathBuf>,
}

impl ControllerArgs {
    /// Local socket path, defaulting to one derived from `tool`.
    pub fn local_path(&self, tool: &str) -> PathBuf {
        self.local.clone().unwrap_or_else(|| {
            std::env::temp_dir().join(format!("{tool}-{}.sock", std::process::id()))
        })
    }
}

/// Install the tracing subscriber. `RUST_LOG` wins over `info`.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

//! Controller side of the Unix control socket.

use std::io;
use std::path::{Path, PathBuf};

use tokio::net::UnixDatagram;
use tracing::debug;

use super::channel::ChannelError;
use super::socket::map_send_error;
use crate::core::{FrameError, MAX_CONTROL_MESSAGE_SIZE};
use crate::wire::{ControlMessage, DeliveryReport, InboundFrame, SendData, SetParameters};

/// Event received from the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerEvent {
    /// A GOOSE frame arrived on some interface.
    Inbound(InboundFrame),
    /// A reliable session finished.
    Report(DeliveryReport),
}

/// A controller connected to an engine's control socket.
#[derive(Debug)]
pub struct ControllerClient {
    socket: UnixDatagram,
    local: PathBuf,
}

impl ControllerClient {
    /// Bind at `local` and connect to the engine at `engine`.
    pub fn connect(local: impl AsRef<Path>, engine: impl AsRef<Path>) -> io::Result<Self> {
        let local = local.as_ref().to_path_buf();
        let _ = std::fs::remove_file(&local);
        let socket = UnixDatagram::bind(&local)?;
        socket.connect(engine)?;
        Ok(Self { socket, local })
    }

    /// Local path the engine replies to.
    pub fn local_path(&self) -> &Path {
        &self.local
    }

    /// Become the engine's controller.
    pub async fn register(&self) -> Result<(), ChannelError> {
        self.send_message(&ControlMessage::Register).await
    }

    /// Update retransmission parameters.
    pub async fn set_parameters(&self, update: SetParameters) -> Result<(), ChannelError> {
        self.send_message(&ControlMessage::SetParameters(update)).await
    }

    /// Ask the engine to transmit a frame.
    pub async fn send(&self, data: SendData) -> Result<(), ChannelError> {
        self.send_message(&ControlMessage::SendData(data)).await
    }

    async fn send_message(&self, message: &ControlMessage) -> Result<(), ChannelError> {
        let bytes = message.encode()?;
        self.socket.send(&bytes).await.map_err(map_send_error)?;
        debug!(kind = message.kind(), "control message sent");
        Ok(())
    }

    /// Wait for the next event from the engine.
    pub async fn recv(&self) -> Result<ControllerEvent, ChannelError> {
        let mut buf = vec![0u8; MAX_CONTROL_MESSAGE_SIZE];
        let len = self.socket.recv(&mut buf).await?;
        match ControlMessage::decode(&buf[..len])? {
            ControlMessage::Inbound(inbound) => Ok(ControllerEvent::Inbound(inbound)),
            ControlMessage::Report(report) => Ok(ControllerEvent::Report(report)),
            other => Err(FrameError::UnknownKind(other.kind()).into()),
        }
    }
}

impl Drop for ControllerClient {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.local);
    }
}

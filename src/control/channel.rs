//! The registered controller and the sink used to reach it.

use std::collections::HashMap;
use std::fmt;
use std::io;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::RwLock;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{info, trace};

use crate::core::FrameError;
use crate::transport::{InboundSink, ReportSink, TransportError, TransportResult};
use crate::wire::{ControlMessage, DeliveryReport, InboundFrame};

/// Errors on the control channel.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The endpoint's queue is full.
    #[error("control channel full")]
    Full,

    /// The endpoint is gone.
    #[error("control channel closed")]
    Closed,

    /// Message could not be encoded or decoded.
    #[error("control message codec error: {0}")]
    Codec(#[from] FrameError),

    /// Socket error.
    #[error("control socket i/o error: {0}")]
    Io(#[from] io::Error),
}

/// Address of a control-channel peer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EndpointId(String);

impl EndpointId {
    /// Wrap an address.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The address as text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Non-blocking delivery of encoded messages to an endpoint.
pub trait ControlSink: Send + Sync {
    /// Queue `message` for `to`. Never waits.
    fn try_send(&self, to: &EndpointId, message: Bytes) -> Result<(), ChannelError>;
}

/// In-process control sink: one bounded queue per connected endpoint.
#[derive(Debug, Default)]
pub struct MemoryChannel {
    endpoints: RwLock<HashMap<EndpointId, mpsc::Sender<Bytes>>>,
}

impl MemoryChannel {
    /// Create a channel with no endpoints.
    pub fn new() -> Self {
        Self::default()
    }

    /// Connect an endpoint and return its receiving end.
    pub fn connect(&self, id: EndpointId, capacity: usize) -> mpsc::Receiver<Bytes> {
        let (tx, rx) = mpsc::channel(capacity);
        self.endpoints.write().insert(id, tx);
        rx
    }

    /// Forget an endpoint.
    pub fn disconnect(&self, id: &EndpointId) {
        self.endpoints.write().remove(id);
    }
}

impl ControlSink for MemoryChannel {
    fn try_send(&self, to: &EndpointId, message: Bytes) -> Result<(), ChannelError> {
        let endpoints = self.endpoints.read();
        let tx = endpoints.get(to).ok_or(ChannelError::Closed)?;
        tx.try_send(message).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => ChannelError::Full,
            mpsc::error::TrySendError::Closed(_) => ChannelError::Closed,
        })
    }
}

/// The single registered controller.
///
/// Replaced atomically on registration. Inbound frames and delivery reports
/// are forwarded at most once and dropped when no controller is registered
/// or its channel is unavailable.
pub struct ControllerSlot {
    controller: RwLock<Option<EndpointId>>,
    sink: Arc<dyn ControlSink>,
}

impl ControllerSlot {
    /// Create an empty slot sending through `sink`.
    pub fn new(sink: Arc<dyn ControlSink>) -> Self {
        Self {
            controller: RwLock::new(None),
            sink,
        }
    }

    /// Make `endpoint` the controller. Returns the controller it replaced.
    pub fn register(&self, endpoint: EndpointId) -> Option<EndpointId> {
        info!(controller = %endpoint, "controller registered");
        self.controller.write().replace(endpoint)
    }

    /// Current controller.
    pub fn controller(&self) -> Option<EndpointId> {
        self.controller.read().clone()
    }

    /// Forget the controller.
    pub fn clear(&self) -> Option<EndpointId> {
        self.controller.write().take()
    }

    fn forward(&self, message: &ControlMessage) -> TransportResult<()> {
        let controller = self.controller().ok_or(TransportError::NoController)?;
        let bytes = message.encode()?;
        self.sink.try_send(&controller, bytes).map_err(|e| {
            trace!(controller = %controller, error = %e, "controller unreachable");
            TransportError::ChannelUnavailable
        })
    }
}

impl InboundSink for ControllerSlot {
    fn deliver(&self, inbound: InboundFrame) -> TransportResult<()> {
        self.forward(&ControlMessage::Inbound(inbound))
    }
}

impl ReportSink for ControllerSlot {
    fn report(&self, report: DeliveryReport) {
        if let Err(e) = self.forward(&ControlMessage::Report(report)) {
            trace!(error = %e, "delivery report dropped");
        }
    }
}

impl fmt::Debug for ControllerSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControllerSlot")
            .field("controller", &self.controller())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{InterfaceName, MacAddress};
    use crate::wire::{DeliveryOutcome, GooseFrame};

    fn inbound() -> InboundFrame {
        InboundFrame {
            device: InterfaceName::new("eth0").unwrap(),
            destination: MacAddress::BROADCAST,
            source: MacAddress::new([2, 0, 0, 0, 0, 9]),
            frame: GooseFrame::new(5, &b"evt"[..]).unwrap(),
        }
    }

    #[test]
    fn test_no_controller_drops() {
        let slot = ControllerSlot::new(Arc::new(MemoryChannel::new()));
        assert!(matches!(
            slot.deliver(inbound()),
            Err(TransportError::NoController)
        ));
    }

    #[test]
    fn test_registered_controller_receives() {
        let channel = Arc::new(MemoryChannel::new());
        let slot = ControllerSlot::new(channel.clone());
        let id = EndpointId::new("ctl-1");
        let mut rx = channel.connect(id.clone(), 4);

        assert_eq!(slot.register(id.clone()), None);
        slot.deliver(inbound()).unwrap();

        let bytes = rx.try_recv().unwrap();
        assert_eq!(
            ControlMessage::decode(&bytes).unwrap(),
            ControlMessage::Inbound(inbound())
        );
    }

    #[test]
    fn test_register_replaces_previous() {
        let channel = Arc::new(MemoryChannel::new());
        let slot = ControllerSlot::new(channel.clone());
        let mut first = channel.connect(EndpointId::new("a"), 4);
        let mut second = channel.connect(EndpointId::new("b"), 4);

        slot.register(EndpointId::new("a"));
        assert_eq!(slot.register(EndpointId::new("b")), Some(EndpointId::new("a")));
        slot.report(DeliveryReport {
            outcome: DeliveryOutcome::Delivered,
            attempts: 5,
            elapsed_ms: 50,
            app_id: 1,
            destination: MacAddress::BROADCAST,
        });

        assert!(first.try_recv().is_err());
        assert!(matches!(
            ControlMessage::decode(&second.try_recv().unwrap()).unwrap(),
            ControlMessage::Report(_)
        ));
    }

    #[test]
    fn test_full_or_closed_channel_drops() {
        let channel = Arc::new(MemoryChannel::new());
        let slot = ControllerSlot::new(channel.clone());
        let id = EndpointId::new("slow");
        let _rx = channel.connect(id.clone(), 1);
        slot.register(id.clone());

        slot.deliver(inbound()).unwrap();
        assert!(matches!(
            slot.deliver(inbound()),
            Err(TransportError::ChannelUnavailable)
        ));

        channel.disconnect(&id);
        assert!(matches!(
            slot.deliver(inbound()),
            Err(TransportError::ChannelUnavailable)
        ));
        assert_eq!(slot.clear(), Some(id));
    }
}

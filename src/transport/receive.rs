//! Inbound path: GOOSE frames from the host to the controller.

use std::sync::Arc;

use tracing::{debug, trace};

use super::device::FrameHandler;
use super::error::{TransportError, TransportResult};
use super::stats::TransportStats;
use crate::core::{ETH_P_GOOSE, InterfaceName};
use crate::params::ParameterStore;
use crate::wire::{EthernetHeader, GooseFrame, InboundFrame};

/// Where decoded inbound frames go.
pub trait InboundSink: Send + Sync {
    /// Fire-and-forget delivery. Must not block.
    fn deliver(&self, inbound: InboundFrame) -> TransportResult<()>;
}

/// Filters, decodes and forwards inbound frames.
pub struct ReceivePath {
    params: Arc<ParameterStore>,
    sink: Arc<dyn InboundSink>,
    stats: Arc<TransportStats>,
}

impl ReceivePath {
    /// Create a receive path forwarding to `sink`.
    pub fn new(
        params: Arc<ParameterStore>,
        sink: Arc<dyn InboundSink>,
        stats: Arc<TransportStats>,
    ) -> Self {
        Self {
            params,
            sink,
            stats,
        }
    }

    /// Handle one raw Ethernet frame received on `ingress`.
    ///
    /// Frames of other protocols are ignored. Errors are informational; the
    /// frame has already been dropped and counted.
    pub fn on_frame_received(&self, raw: &[u8], ingress: &InterfaceName) -> TransportResult<()> {
        if !self.params.receive_enabled() {
            return Err(TransportError::ReceptionDisabled);
        }

        let (header, payload) = EthernetHeader::parse(raw).inspect_err(|e| {
            self.stats.record_inbound_malformed();
            trace!(device = %ingress, error = %e, "malformed ethernet frame dropped");
        })?;
        if header.ethertype != ETH_P_GOOSE {
            return Ok(());
        }

        let frame = GooseFrame::decode(payload).inspect_err(|e| {
            self.stats.record_inbound_malformed();
            trace!(device = %ingress, error = %e, "malformed goose frame dropped");
        })?;

        let inbound = InboundFrame {
            device: ingress.clone(),
            destination: header.destination,
            source: header.source,
            frame,
        };
        match self.sink.deliver(inbound) {
            Ok(()) => {
                self.stats.record_inbound_forwarded();
                Ok(())
            }
            Err(e) => {
                self.stats.record_inbound_dropped();
                trace!(device = %ingress, error = %e, "inbound frame dropped");
                Err(e)
            }
        }
    }
}

impl FrameHandler for ReceivePath {
    fn on_frame(&self, raw: &[u8], ingress: &InterfaceName) {
        if let Err(e) = self.on_frame_received(raw, ingress) {
            if !e.is_silent_drop() {
                debug!(device = %ingress, error = %e, "inbound frame not forwarded");
            }
        }
    }
}

impl std::fmt::Debug for ReceivePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReceivePath")
            .field("receive_enabled", &self.params.receive_enabled())
            .finish()
    }
}

//! Egress routing: interface resolution, addressing, reliable vs one-shot.

use std::sync::Arc;

use bytes::BytesMut;
use tracing::{trace, warn};

use super::device::{DeviceRegistry, NetDevice};
use super::error::{TransportError, TransportResult};
use super::retransmit::RetransmitEngine;
use super::stats::TransportStats;
use crate::core::{Destination, ETH_HEADER_SIZE, ETH_P_GOOSE, InterfaceName};
use crate::params::ParameterStore;
use crate::wire::{EthernetHeader, GooseFrame, SendData};

/// One frame to send. Consumed by [`Router::send`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryRequest {
    /// Named egress interface; `None` uses the default interface.
    pub egress: Option<InterfaceName>,
    /// Addressing.
    pub destination: Destination,
    /// Use the retransmission engine.
    pub reliable: bool,
    /// Frame to send.
    pub frame: GooseFrame,
}

impl From<SendData> for DeliveryRequest {
    fn from(data: SendData) -> Self {
        Self {
            egress: data.device,
            destination: data.destination,
            reliable: data.reliable,
            frame: data.frame,
        }
    }
}

/// Resolves devices and hands frames to the wire.
pub struct Router {
    params: Arc<ParameterStore>,
    registry: Arc<dyn DeviceRegistry>,
    reliable: RetransmitEngine,
    stats: Arc<TransportStats>,
}

impl Router {
    /// Create a router.
    pub fn new(
        params: Arc<ParameterStore>,
        registry: Arc<dyn DeviceRegistry>,
        reliable: RetransmitEngine,
        stats: Arc<TransportStats>,
    ) -> Self {
        Self {
            params,
            registry,
            reliable,
            stats,
        }
    }

    /// The retransmission engine behind reliable sends.
    pub fn reliable(&self) -> &RetransmitEngine {
        &self.reliable
    }

    /// Resolve the named interface, or the default interface when `None`.
    pub fn resolve(&self, egress: Option<&InterfaceName>) -> TransportResult<Arc<dyn NetDevice>> {
        let name = match egress {
            Some(name) => name.clone(),
            None => self.params.default_interface(),
        };
        self.registry.lookup(&name).ok_or_else(|| {
            warn!(device = %name, "cannot find device, choose another device");
            TransportError::NoInterface(name)
        })
    }

    /// Send a frame.
    ///
    /// One-shot sends return after a single transmission attempt. Reliable
    /// sends return once the session is running.
    pub fn send(&self, request: DeliveryRequest) -> TransportResult<()> {
        if !self.params.transmit_enabled() {
            return Err(TransportError::TransmissionDisabled);
        }

        let device = self.resolve(request.egress.as_ref())?;
        let size = request.frame.encoded_len();
        if size > device.mtu() {
            return Err(TransportError::FrameTooLarge {
                device: device.name().clone(),
                size,
                mtu: device.mtu(),
            });
        }

        let destination = request.destination.resolve(device.broadcast_addr());
        let mut buf = BytesMut::with_capacity(ETH_HEADER_SIZE + size);
        EthernetHeader::new(destination, device.hw_addr(), ETH_P_GOOSE).encode_into(&mut buf);
        request.frame.encode_into(&mut buf);
        let frame = buf.freeze();

        if request.reliable {
            return self
                .reliable
                .start(device, frame, request.frame.app_id(), destination);
        }

        if let Err(e) = device.transmit(&frame) {
            self.stats.record_send_failure();
            return Err(e.into());
        }
        self.stats.record_frame_sent();
        trace!(device = %device.name(), %destination, app_id = request.frame.app_id(), "frame sent");
        Ok(())
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("default_interface", &self.params.default_interface())
            .field("reliable", &self.reliable)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::MacAddress;
    use crate::transport::memory::MemorySegment;
    use crate::transport::retransmit::ReportSink;
    use crate::transport::timing::RecordingTimer;
    use crate::wire::{DeliveryOutcome, DeliveryReport};
    use tokio::runtime::Handle;
    use tokio::sync::{mpsc, watch};

    const OWN: MacAddress = MacAddress::new([0x02, 0, 0, 0, 0, 0x01]);
    const PEER: MacAddress = MacAddress::new([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);

    struct ChannelSink(mpsc::UnboundedSender<DeliveryReport>);

    impl ReportSink for ChannelSink {
        fn report(&self, report: DeliveryReport) {
            let _ = self.0.send(report);
        }
    }

    struct Fixture {
        router: Router,
        segment: MemorySegment,
        params: Arc<ParameterStore>,
        stats: Arc<TransportStats>,
        reports: mpsc::UnboundedReceiver<DeliveryReport>,
        _stop: watch::Sender<bool>,
    }

    fn fixture() -> Fixture {
        let segment = MemorySegment::new();
        segment.attach(name("eth0"), OWN);
        let params = Arc::new(ParameterStore::new());
        let stats = Arc::new(TransportStats::new());
        let (tx, reports) = mpsc::unbounded_channel();
        let (stop, shutdown) = watch::channel(false);
        let reliable = RetransmitEngine::new(
            Arc::clone(&params),
            Arc::new(RecordingTimer::new()),
            Arc::new(ChannelSink(tx)),
            Arc::clone(&stats),
            shutdown,
            Handle::current(),
        );
        let router = Router::new(
            Arc::clone(&params),
            Arc::new(segment.clone()),
            reliable,
            Arc::clone(&stats),
        );
        Fixture {
            router,
            segment,
            params,
            stats,
            reports,
            _stop: stop,
        }
    }

    fn name(s: &str) -> InterfaceName {
        InterfaceName::new(s).unwrap()
    }

    fn request(destination: Destination, reliable: bool) -> DeliveryRequest {
        DeliveryRequest {
            egress: None,
            destination,
            reliable,
            frame: GooseFrame::new(0x0001, &b"PING"[..]).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_one_shot_unicast_envelope() {
        let f = fixture();
        f.router.send(request(Destination::Unicast(PEER), false)).unwrap();

        let frames = f.segment.transmitted();
        assert_eq!(frames.len(), 1);
        let (header, payload) = EthernetHeader::parse(&frames[0].bytes).unwrap();
        assert_eq!(header.destination, PEER);
        assert_eq!(header.source, OWN);
        assert_eq!(header.ethertype, ETH_P_GOOSE);
        assert_eq!(GooseFrame::decode(payload).unwrap().apdu().as_ref(), b"PING");
        assert_eq!(f.stats.snapshot().frames_sent, 1);
    }

    #[tokio::test]
    async fn test_broadcast_uses_interface_broadcast_address() {
        let f = fixture();
        f.router.send(request(Destination::Broadcast, false)).unwrap();
        let frames = f.segment.transmitted();
        let (header, _) = EthernetHeader::parse(&frames[0].bytes).unwrap();
        assert!(header.destination.is_broadcast());
    }

    #[tokio::test]
    async fn test_transmit_disabled_rejects_everything() {
        let f = fixture();
        f.params.set_transmit_enabled(false);
        for reliable in [false, true] {
            assert!(matches!(
                f.router.send(request(Destination::Unicast(PEER), reliable)),
                Err(TransportError::TransmissionDisabled)
            ));
        }
        assert!(f.segment.transmitted().is_empty());
        assert_eq!(f.router.reliable().active_sessions(), 0);
    }

    #[tokio::test]
    async fn test_unknown_interfaces() {
        let f = fixture();
        let mut named = request(Destination::Broadcast, false);
        named.egress = Some(name("eth7"));
        assert!(matches!(
            f.router.send(named),
            Err(TransportError::NoInterface(n)) if n.as_str() == "eth7"
        ));

        f.params.set_default_interface(name("ghost0"));
        assert!(matches!(
            f.router.send(request(Destination::Broadcast, false)),
            Err(TransportError::NoInterface(n)) if n.as_str() == "ghost0"
        ));
        assert!(f.segment.transmitted().is_empty());
    }

    #[tokio::test]
    async fn test_named_interface_wins_over_default() {
        let f = fixture();
        f.segment.attach(name("eth1"), MacAddress::new([0x02, 0, 0, 0, 0, 0x02]));
        let mut named = request(Destination::Broadcast, false);
        named.egress = Some(name("eth1"));
        f.router.send(named).unwrap();
        assert_eq!(f.segment.transmitted()[0].device, name("eth1"));
    }

    #[tokio::test]
    async fn test_frame_too_large_for_mtu() {
        let f = fixture();
        f.segment.attach_with_mtu(name("small0"), OWN, 64);
        let req = DeliveryRequest {
            egress: Some(name("small0")),
            destination: Destination::Broadcast,
            reliable: false,
            frame: GooseFrame::new(1, vec![0u8; 100]).unwrap(),
        };
        assert!(matches!(
            f.router.send(req),
            Err(TransportError::FrameTooLarge { size: 108, mtu: 64, .. })
        ));
    }

    #[tokio::test]
    async fn test_one_shot_send_failure() {
        let f = fixture();
        f.segment.attach(name("down0"), OWN).set_failing(true);
        let mut req = request(Destination::Broadcast, false);
        req.egress = Some(name("down0"));
        assert!(matches!(
            f.router.send(req),
            Err(TransportError::SendFailed(_))
        ));
        assert_eq!(f.stats.snapshot().send_failures, 1);
    }

    #[tokio::test]
    async fn test_reliable_send_is_accepted_and_reported() {
        let mut f = fixture();
        f.router.send(request(Destination::Unicast(PEER), true)).unwrap();
        let report = f.reports.recv().await.unwrap();
        assert_eq!(report.outcome, DeliveryOutcome::Delivered);
        assert_eq!(report.destination, PEER);
        assert_eq!(f.segment.transmitted().len(), 5);
        assert_eq!(f.stats.snapshot().frames_sent, 0);
    }
}

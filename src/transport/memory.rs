//! In-process Ethernet segment.
//!
//! A [`MemorySegment`] records every frame its devices transmit and lets a
//! test (or a single-host setup) inject frames as if they arrived from the
//! wire. It implements [`FrameSource`] and [`DeviceRegistry`], so it can back
//! an engine on its own.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::trace;

use super::device::{DeviceRegistry, DeviceTable, FrameHandler, FrameSource, HandlerTable, NetDevice};
use super::error::DeviceError;
use crate::core::{DEFAULT_MTU, InterfaceName, MacAddress};
use crate::wire::EthernetHeader;

/// A frame transmitted onto the segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedFrame {
    /// Transmitting device.
    pub device: InterfaceName,
    /// Transmission time.
    pub at: Instant,
    /// Complete Ethernet frame.
    pub bytes: Bytes,
}

#[derive(Debug, Default)]
struct SegmentInner {
    devices: DeviceTable,
    handlers: HandlerTable,
    captured: Mutex<Vec<CapturedFrame>>,
}

/// Shared in-memory segment. Clones refer to the same segment.
#[derive(Debug, Clone, Default)]
pub struct MemorySegment {
    inner: Arc<SegmentInner>,
}

impl MemorySegment {
    /// Create an empty segment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a device with the default MTU.
    pub fn attach(&self, name: InterfaceName, hw_addr: MacAddress) -> Arc<MemoryDevice> {
        self.attach_with_mtu(name, hw_addr, DEFAULT_MTU)
    }

    /// Attach a device with an explicit MTU.
    pub fn attach_with_mtu(
        &self,
        name: InterfaceName,
        hw_addr: MacAddress,
        mtu: usize,
    ) -> Arc<MemoryDevice> {
        let device = Arc::new(MemoryDevice {
            name,
            hw_addr,
            mtu,
            failing: AtomicBool::new(false),
            segment: Arc::downgrade(&self.inner),
        });
        self.inner.devices.insert(device.clone());
        device
    }

    /// Detach a device. Later lookups by its name fail.
    pub fn detach(&self, name: &InterfaceName) {
        self.inner.devices.remove(name);
    }

    /// Deliver a frame to the registered handler for its ethertype.
    ///
    /// Returns whether a handler took the frame. Runt frames are discarded.
    pub fn inject(&self, raw: &[u8], ingress: &InterfaceName) -> bool {
        match EthernetHeader::parse(raw) {
            Ok((header, _)) => self.inner.handlers.dispatch(header.ethertype, raw, ingress),
            Err(e) => {
                trace!(error = %e, "runt frame discarded by segment");
                false
            }
        }
    }

    /// All frames transmitted so far.
    pub fn transmitted(&self) -> Vec<CapturedFrame> {
        self.inner.captured.lock().clone()
    }

    /// Remove and return all captured frames.
    pub fn take_transmitted(&self) -> Vec<CapturedFrame> {
        std::mem::take(&mut *self.inner.captured.lock())
    }
}

impl DeviceRegistry for MemorySegment {
    fn lookup(&self, name: &InterfaceName) -> Option<Arc<dyn NetDevice>> {
        self.inner.devices.lookup(name)
    }
}

impl FrameSource for MemorySegment {
    fn register(&self, ethertype: u16, handler: Arc<dyn FrameHandler>) {
        self.inner.handlers.register(ethertype, handler);
    }

    fn unregister(&self, ethertype: u16) {
        self.inner.handlers.unregister(ethertype);
    }
}

/// Device attached to a [`MemorySegment`].
#[derive(Debug)]
pub struct MemoryDevice {
    name: InterfaceName,
    hw_addr: MacAddress,
    mtu: usize,
    failing: AtomicBool,
    segment: std::sync::Weak<SegmentInner>,
}

impl MemoryDevice {
    /// Make every following transmission fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Relaxed);
    }
}

impl NetDevice for MemoryDevice {
    fn name(&self) -> &InterfaceName {
        &self.name
    }

    fn hw_addr(&self) -> MacAddress {
        self.hw_addr
    }

    fn mtu(&self) -> usize {
        self.mtu
    }

    fn transmit(&self, frame: &[u8]) -> Result<(), DeviceError> {
        if self.failing.load(Ordering::Relaxed) {
            return Err(DeviceError::LinkDown(self.name.clone()));
        }
        let segment = self
            .segment
            .upgrade()
            .ok_or_else(|| DeviceError::LinkDown(self.name.clone()))?;
        segment.captured.lock().push(CapturedFrame {
            device: self.name.clone(),
            at: Instant::now(),
            bytes: Bytes::copy_from_slice(frame),
        });
        Ok(())
    }
}

//! Host network capabilities: transmit-capable devices, device lookup, and
//! delivery of inbound frames by ethertype.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use super::error::DeviceError;
use crate::core::{DEFAULT_MTU, InterfaceName, MacAddress};

/// A network interface that can put Ethernet frames on the wire.
pub trait NetDevice: Send + Sync + fmt::Debug {
    /// Interface name.
    fn name(&self) -> &InterfaceName;

    /// The interface's own hardware address.
    fn hw_addr(&self) -> MacAddress;

    /// Address used for broadcast destinations.
    fn broadcast_addr(&self) -> MacAddress {
        MacAddress::BROADCAST
    }

    /// Largest payload after the Ethernet header.
    fn mtu(&self) -> usize {
        DEFAULT_MTU
    }

    /// Transmit one complete Ethernet frame. Must not block.
    fn transmit(&self, frame: &[u8]) -> Result<(), DeviceError>;
}

/// Resolves interface names to live devices.
pub trait DeviceRegistry: Send + Sync {
    /// Look up a device by name.
    fn lookup(&self, name: &InterfaceName) -> Option<Arc<dyn NetDevice>>;
}

/// Receives frames whose ethertype it was registered for.
pub trait FrameHandler: Send + Sync {
    /// Called from the host's delivery context; must not block.
    fn on_frame(&self, raw: &[u8], ingress: &InterfaceName);
}

/// Delivers inbound frames to registered handlers.
pub trait FrameSource: Send + Sync {
    /// Register `handler` for `ethertype`, replacing any previous handler.
    fn register(&self, ethertype: u16, handler: Arc<dyn FrameHandler>);

    /// Remove the handler for `ethertype`.
    fn unregister(&self, ethertype: u16);
}

/// Name-indexed set of devices.
#[derive(Default)]
pub struct DeviceTable {
    devices: RwLock<HashMap<InterfaceName, Arc<dyn NetDevice>>>,
}

impl DeviceTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a device, replacing any device with the same name.
    pub fn insert(&self, device: Arc<dyn NetDevice>) {
        self.devices.write().insert(device.name().clone(), device);
    }

    /// Remove a device by name.
    pub fn remove(&self, name: &InterfaceName) -> Option<Arc<dyn NetDevice>> {
        self.devices.write().remove(name)
    }

    /// Names of all devices, sorted.
    pub fn names(&self) -> Vec<InterfaceName> {
        let mut names: Vec<_> = self.devices.read().keys().cloned().collect();
        names.sort();
        names
    }
}

impl DeviceRegistry for DeviceTable {
    fn lookup(&self, name: &InterfaceName) -> Option<Arc<dyn NetDevice>> {
        self.devices.read().get(name).cloned()
    }
}

impl fmt::Debug for DeviceTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceTable")
            .field("devices", &self.names())
            .finish()
    }
}

/// Ethertype-indexed handler table, shared by frame source implementations.
#[derive(Default)]
pub(crate) struct HandlerTable {
    handlers: RwLock<HashMap<u16, Arc<dyn FrameHandler>>>,
}

impl HandlerTable {
    pub(crate) fn register(&self, ethertype: u16, handler: Arc<dyn FrameHandler>) {
        self.handlers.write().insert(ethertype, handler);
    }

    pub(crate) fn unregister(&self, ethertype: u16) {
        self.handlers.write().remove(&ethertype);
    }

    /// Hand `raw` to the handler for `ethertype`, if any.
    pub(crate) fn dispatch(&self, ethertype: u16, raw: &[u8], ingress: &InterfaceName) -> bool {
        let handler = self.handlers.read().get(&ethertype).cloned();
        match handler {
            Some(handler) => {
                handler.on_frame(raw, ingress);
                true
            }
            None => false,
        }
    }
}

impl fmt::Debug for HandlerTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ethertypes: Vec<_> = self.handlers.read().keys().copied().collect();
        ethertypes.sort_unstable();
        f.debug_struct("HandlerTable")
            .field("ethertypes", &ethertypes)
            .finish()
    }
}

//! Ethernet segment tunnelled over UDP.
//!
//! Each [`UdpSegment`] is one emulated interface: complete Ethernet frames
//! are carried as UDP datagrams between the configured peers. It lets the
//! engine run unprivileged on hosts without raw socket access.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tracing::{debug, trace, warn};

use super::device::{FrameHandler, FrameSource, HandlerTable, NetDevice};
use super::error::DeviceError;
use super::timing::shutdown_requested;
use crate::core::{DEFAULT_MTU, ETH_HEADER_SIZE, InterfaceName, MacAddress, VLAN_TAG_SIZE};
use crate::wire::EthernetHeader;

/// Default receive buffer size.
pub const DEFAULT_RECV_BUFFER_SIZE: usize = DEFAULT_MTU + ETH_HEADER_SIZE + VLAN_TAG_SIZE;

/// UDP-backed network device and frame source.
#[derive(Debug)]
pub struct UdpSegment {
    socket: Arc<UdpSocket>,
    /// Non-blocking handle on the same socket for synchronous transmits.
    sender: std::net::UdpSocket,
    name: InterfaceName,
    hw_addr: MacAddress,
    mtu: usize,
    recv_buffer_size: usize,
    peers: RwLock<Vec<SocketAddr>>,
    handlers: HandlerTable,
}

impl UdpSegment {
    /// Bind a segment with default options.
    pub async fn bind(
        name: InterfaceName,
        hw_addr: MacAddress,
        addr: SocketAddr,
    ) -> io::Result<Self> {
        UdpSegmentBuilder::new(name, hw_addr).bind(addr).await
    }

    /// Local address.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Add a peer that receives every transmitted frame.
    pub fn add_peer(&self, peer: SocketAddr) {
        let mut peers = self.peers.write();
        if !peers.contains(&peer) {
            peers.push(peer);
        }
    }

    /// Current peers.
    pub fn peers(&self) -> Vec<SocketAddr> {
        self.peers.read().clone()
    }

    /// Receive datagrams and hand them to registered handlers until
    /// `shutdown` turns true.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) -> io::Result<()> {
        let mut buf = vec![0u8; self.recv_buffer_size];
        loop {
            tokio::select! {
                result = self.socket.recv_from(&mut buf) => match result {
                    Ok((len, from)) => self.deliver(&buf[..len], from),
                    Err(e) => warn!(device = %self.name, error = %e, "segment receive failed"),
                },
                _ = shutdown_requested(&mut shutdown) => {
                    debug!(device = %self.name, "segment receive loop stopped");
                    return Ok(());
                }
            }
        }
    }

    fn deliver(&self, raw: &[u8], from: SocketAddr) {
        match EthernetHeader::parse(raw) {
            Ok((header, _)) => {
                if !self.handlers.dispatch(header.ethertype, raw, &self.name) {
                    trace!(%from, ethertype = header.ethertype, "no handler for frame");
                }
            }
            Err(e) => trace!(%from, error = %e, "runt datagram discarded"),
        }
    }
}

impl NetDevice for UdpSegment {
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
        let peers = self.peers.read();
        if peers.is_empty() {
            return Err(DeviceError::LinkDown(self.name.clone()));
        }
        for peer in peers.iter() {
            match self.sender.send_to(frame, *peer) {
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    warn!(device = %self.name, %peer, "socket buffer full, frame dropped");
                    return Err(e.into());
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

impl FrameSource for UdpSegment {
    fn register(&self, ethertype: u16, handler: Arc<dyn FrameHandler>) {
        self.handlers.register(ethertype, handler);
    }

    fn unregister(&self, ethertype: u16) {
        self.handlers.unregister(ethertype);
    }
}

/// Builder for [`UdpSegment`].
#[derive(Debug, Clone)]
pub struct UdpSegmentBuilder {
    name: InterfaceName,
    hw_addr: MacAddress,
    mtu: usize,
    recv_buffer_size: usize,
    peers: Vec<SocketAddr>,
}

impl UdpSegmentBuilder {
    /// Create a builder with default options.
    pub fn new(name: InterfaceName, hw_addr: MacAddress) -> Self {
        Self {
            name,
            hw_addr,
            mtu: DEFAULT_MTU,
            recv_buffer_size: DEFAULT_RECV_BUFFER_SIZE,
            peers: Vec::new(),
        }
    }

    /// Set the MTU.
    pub fn mtu(mut self, mtu: usize) -> Self {
        self.mtu = mtu;
        self
    }

    /// Set the receive buffer size.
    pub fn recv_buffer_size(mut self, size: usize) -> Self {
        self.recv_buffer_size = size;
        self
    }

    /// Add a peer.
    pub fn peer(mut self, peer: SocketAddr) -> Self {
        self.peers.push(peer);
        self
    }

    /// Bind to the given address and create a segment.
    pub async fn bind(self, addr: SocketAddr) -> io::Result<UdpSegment> {
        let socket = UdpSocket::bind(addr).await?;
        self.from_socket(socket)
    }

    /// Create a segment from an existing UDP socket.
    ///
    /// Must be called within a Tokio runtime.
    pub fn from_socket(self, socket: UdpSocket) -> io::Result<UdpSegment> {
        let std_socket = socket.into_std()?;
        std_socket.set_nonblocking(true)?;
        let sender = std_socket.try_clone()?;
        let socket = UdpSocket::from_std(std_socket)?;
        Ok(UdpSegment {
            socket: Arc::new(socket),
            sender,
            name: self.name,
            hw_addr: self.hw_addr,
            mtu: self.mtu,
            recv_buffer_size: self.recv_buffer_size,
            peers: RwLock::new(self.peers),
            handlers: HandlerTable::default(),
        })
    }
}

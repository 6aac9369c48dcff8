//! GOOSE transport layer.
//!
//! - **Devices**: [`NetDevice`], [`DeviceRegistry`], [`FrameSource`] and
//!   [`FrameHandler`] abstract the host network; [`MemorySegment`] and
//!   [`UdpSegment`] implement them
//! - **Routing**: [`Router`] resolves the egress interface and addressing
//! - **Reliable delivery**: [`RetransmitEngine`] drives one
//!   [`RetransmitSession`] per reliable send
//! - **Receive path**: [`ReceivePath`] filters and forwards inbound frames
//! - **Timing**: the [`Timer`] trait with [`TokioTimer`] and [`RecordingTimer`]
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │         Control channel                 │
//! ├─────────────────────────────────────────┤
//! │         Transport Layer                 │  ← This module
//! │  router, retransmission, receive path   │
//! ├─────────────────────────────────────────┤
//! │         Wire formats                    │
//! ├─────────────────────────────────────────┤
//! │         Ethernet (ethertype 0x88B8)     │
//! └─────────────────────────────────────────┘
//! ```

mod device;
mod error;
mod memory;
mod receive;
mod retransmit;
mod router;
mod socket;
mod stats;
mod timing;

pub use device::{DeviceRegistry, DeviceTable, FrameHandler, FrameSource, NetDevice};
pub use error::*;
pub use memory::{CapturedFrame, MemoryDevice, MemorySegment};
pub use receive::{InboundSink, ReceivePath};
pub use retransmit::{RetransmitEngine, RetransmitSession, ReportSink, Schedule, SessionState};
pub use router::{DeliveryRequest, Router};
pub use socket::{DEFAULT_RECV_BUFFER_SIZE, UdpSegment, UdpSegmentBuilder};
pub use stats::{StatsSnapshot, TransportStats};
pub use timing::{RecordingTimer, Timer, TokioTimer, next_interval, shutdown_requested};

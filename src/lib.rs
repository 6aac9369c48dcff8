//! # GOOSE Transport
//!
//! Transport engine for IEC 61850 **GOOSE** (Generic Object Oriented
//! Substation Event) messages carried directly over Ethernet
//! (ethertype `0x88B8`).
//!
//! A single controller drives the engine over a datagram control channel:
//!
//! - **Send**: broadcast or unicast GOOSE frames, one-shot or reliable
//! - **Reliable delivery**: repeated transmission on a stepped interval
//!   schedule until a delay threshold is reached, with a report of the outcome
//! - **Receive**: every inbound GOOSE frame is forwarded with its ingress
//!   interface
//! - **Configure**: retransmission schedule, default interface and enable
//!   flags, at runtime
//!
//! ## Feature Flags
//!
//! - `transport` (default): devices, router, retransmission, receive path
//! - `control` (default): control channel, configuration interface and the
//!   assembled [`GooseEngine`]
//!
//! ## Modules
//!
//! - [`core`]: constants, addresses, interface names and error types (always included)
//! - [`wire`]: GOOSE, Ethernet and control message codecs (always included)
//! - [`params`]: the shared parameter store (always included)
//! - [`transport`]: transport layer (requires `transport` feature)
//! - [`control`]: controller-facing surfaces (requires `control` feature)
//! - [`engine`]: component wiring and lifecycle (requires `control` feature)
//!
//! ## Example Usage
//!
//! ```rust
//! use goose_transport::prelude::*;
//!
//! let frame = GooseFrame::new(0x0001, &b"PING"[..]).unwrap();
//! let bytes = frame.encode();
//! assert_eq!(bytes.len(), 12);
//! assert_eq!(GooseFrame::decode(&bytes).unwrap(), frame);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// Always included
pub mod core;
pub mod params;
pub mod wire;

// Transport layer (feature-gated)
#[cfg(feature = "transport")]
#[cfg_attr(docsrs, doc(cfg(feature = "transport")))]
pub mod transport;

// Control channel (feature-gated)
#[cfg(feature = "control")]
#[cfg_attr(docsrs, doc(cfg(feature = "control")))]
pub mod control;

// Engine wiring (feature-gated)
#[cfg(feature = "control")]
#[cfg_attr(docsrs, doc(cfg(feature = "control")))]
pub mod engine;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::core::*;
    pub use crate::params::{ParameterStore, Parameters};
    pub use crate::wire::*;

    #[cfg(feature = "transport")]
    pub use crate::transport::{
        DeliveryRequest, DeviceRegistry, DeviceTable, FrameHandler, FrameSource, MemorySegment,
        NetDevice, Router, TransportError, TransportResult, TransportStats, UdpSegment,
        UdpSegmentBuilder,
    };

    #[cfg(feature = "control")]
    pub use crate::control::{
        ConfigInterface, ConfigKey, ControlSink, ControllerSlot, EndpointId, MemoryChannel,
    };

    #[cfg(all(feature = "control", unix))]
    pub use crate::control::{ControlSocket, ControllerClient, ControllerEvent};

    #[cfg(feature = "control")]
    pub use crate::engine::{EngineConfig, EngineError, GooseEngine, GooseEngineBuilder};
}

// Re-export commonly used items at crate root
pub use crate::core::{Destination, FrameError, InterfaceName, MacAddress, ParamError};
pub use crate::wire::{ControlMessage, DeliveryOutcome, DeliveryReport, GooseFrame};

#[cfg(feature = "transport")]
pub use crate::transport::{TransportError, TransportResult};

#[cfg(feature = "control")]
pub use crate::engine::{EngineConfig, EngineError, GooseEngine, GooseEngineBuilder};

//! Controller-facing surfaces.
//!
//! - [`Dispatcher`] decodes controller messages and acts on them
//! - [`ControllerSlot`] holds the registered controller and forwards inbound
//!   frames and delivery reports to it
//! - [`ConfigInterface`] exposes parameters as text keys
//! - [`ControlSocket`] and [`ControllerClient`] carry the channel over a
//!   Unix datagram socket; [`MemoryChannel`] carries it in-process

mod channel;
mod config;
mod dispatcher;

#[cfg(unix)]
mod client;
#[cfg(unix)]
mod socket;

pub use channel::{ChannelError, ControlSink, ControllerSlot, EndpointId, MemoryChannel};
pub use config::{ConfigInterface, ConfigKey};
pub use dispatcher::{DispatchError, Dispatcher, MessageClass};

#[cfg(unix)]
#[cfg_attr(docsrs, doc(cfg(unix)))]
pub use client::{ControllerClient, ControllerEvent};
#[cfg(unix)]
#[cfg_attr(docsrs, doc(cfg(unix)))]
pub use socket::ControlSocket;

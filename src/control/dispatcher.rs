//! Control message dispatch.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use super::channel::{ControllerSlot, EndpointId};
use crate::core::{FrameError, ParamError};
use crate::params::ParameterStore;
use crate::transport::{DeviceRegistry, Router, TransportError, TransportStats};
use crate::wire::ControlMessage;

/// What a handled control message was.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageClass {
    /// Controller registration.
    Register,
    /// Parameter update.
    SetParameters,
    /// Data transmission request.
    SendData,
}

/// Errors from handling one control message.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Message could not be decoded.
    #[error("malformed control message: {0}")]
    Malformed(#[from] FrameError),

    /// Parameter update rejected.
    #[error(transparent)]
    Param(#[from] ParamError),

    /// Transmission request rejected.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Registration from a peer the engine cannot address.
    #[error("register from unnamed endpoint")]
    UnnamedEndpoint,

    /// Message kind is only sent by the engine.
    #[error("unexpected control message kind 0x{0:04x}")]
    UnexpectedKind(u16),
}

/// Classifies controller messages and acts on them.
pub struct Dispatcher {
    params: Arc<ParameterStore>,
    router: Arc<Router>,
    slot: Arc<ControllerSlot>,
    registry: Arc<dyn DeviceRegistry>,
    stats: Arc<TransportStats>,
}

impl Dispatcher {
    /// Create a dispatcher.
    pub fn new(
        params: Arc<ParameterStore>,
        router: Arc<Router>,
        slot: Arc<ControllerSlot>,
        registry: Arc<dyn DeviceRegistry>,
        stats: Arc<TransportStats>,
    ) -> Self {
        Self {
            params,
            router,
            slot,
            registry,
            stats,
        }
    }

    /// Handle one raw message from `from`.
    ///
    /// Errors are logged here; callers only need them for accounting.
    pub fn handle(&self, from: &EndpointId, raw: &[u8]) -> Result<MessageClass, DispatchError> {
        let message = ControlMessage::decode(raw).inspect_err(|e| {
            self.stats.record_control_malformed();
            debug!(endpoint = %from, error = %e, "malformed control message dropped");
        })?;

        match message {
            ControlMessage::Register => {
                if from.as_str().is_empty() {
                    warn!("register from unnamed endpoint ignored");
                    return Err(DispatchError::UnnamedEndpoint);
                }
                self.slot.register(from.clone());
                Ok(MessageClass::Register)
            }
            ControlMessage::SetParameters(update) => {
                self.params.apply(&update).inspect_err(|e| {
                    warn!(endpoint = %from, error = %e, "parameter update rejected");
                })?;
                if let Some(name) = &update.default_device {
                    if self.registry.lookup(name).is_some() {
                        info!(device = %name, "default network device changed");
                    } else {
                        warn!(device = %name, "cannot find device, choose another device");
                    }
                }
                Ok(MessageClass::SetParameters)
            }
            ControlMessage::SendData(data) => {
                self.router.send(data.into()).inspect_err(|e| {
                    warn!(endpoint = %from, error = %e, "send request failed");
                })?;
                Ok(MessageClass::SendData)
            }
            other @ (ControlMessage::Inbound(_) | ControlMessage::Report(_)) => {
                self.stats.record_control_malformed();
                debug!(endpoint = %from, kind = other.kind(), "engine-bound kind from controller");
                Err(DispatchError::UnexpectedKind(other.kind()))
            }
        }
    }

    /// The controller slot messages register into.
    pub fn slot(&self) -> &Arc<ControllerSlot> {
        &self.slot
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("router", &self.router)
            .field("slot", &self.slot)
            .finish()
    }
}

//! Transport layer error types.

use std::io;

use thiserror::Error;

use crate::core::{FrameError, InterfaceName};

/// Errors raised by a network device.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// The device refused the frame because its link is down.
    #[error("device {0} is down")]
    LinkDown(InterfaceName),

    /// The underlying socket failed.
    #[error("device i/o error: {0}")]
    Io(#[from] io::Error),
}

/// Errors from routing, transmitting and receiving GOOSE frames.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Outbound transmission is disabled.
    #[error("transmission disabled")]
    TransmissionDisabled,

    /// Inbound forwarding is disabled.
    #[error("reception disabled")]
    ReceptionDisabled,

    /// Neither the named nor the default interface resolves to a device.
    #[error("no such device: {0}")]
    NoInterface(InterfaceName),

    /// Encoded frame does not fit the device MTU.
    #[error("frame of {size} bytes exceeds MTU {mtu} of {device}")]
    FrameTooLarge {
        /// Egress device.
        device: InterfaceName,
        /// Encoded GOOSE frame size.
        size: usize,
        /// Device MTU.
        mtu: usize,
    },

    /// The device rejected a transmission.
    #[error("send failed: {0}")]
    SendFailed(#[from] DeviceError),

    /// Reliable delivery is shutting down and accepts no new sessions.
    #[error("engine stopped")]
    EngineStopped,

    /// No controller is registered.
    #[error("no controller registered")]
    NoController,

    /// The controller channel is full or closed.
    #[error("controller channel unavailable")]
    ChannelUnavailable,

    /// Frame failed to decode.
    #[error("malformed frame: {0}")]
    Malformed(#[from] FrameError),
}

impl TransportError {
    /// Whether the error is handled by dropping the frame without further
    /// reporting.
    pub fn is_silent_drop(&self) -> bool {
        matches!(
            self,
            Self::Malformed(_)
                | Self::ReceptionDisabled
                | Self::NoController
                | Self::ChannelUnavailable
        )
    }
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silent_drop_classification() {
        assert!(TransportError::Malformed(FrameError::InvalidName).is_silent_drop());
        assert!(TransportError::ChannelUnavailable.is_silent_drop());
        assert!(TransportError::NoController.is_silent_drop());
        assert!(!TransportError::TransmissionDisabled.is_silent_drop());
        assert!(!TransportError::EngineStopped.is_silent_drop());
        assert!(
            !TransportError::NoInterface(InterfaceName::new("eth9").unwrap()).is_silent_drop()
        );
    }

    #[test]
    fn test_device_error_converts() {
        let err: TransportError =
            DeviceError::from(io::Error::other("boom")).into();
        assert!(matches!(err, TransportError::SendFailed(DeviceError::Io(_))));
        assert_eq!(err.to_string(), "send failed: device i/o error: boom");
    }
}

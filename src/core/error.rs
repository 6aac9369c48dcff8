//! Error types shared across layers.

use thiserror::Error;

/// Errors from wire decoding and encoding.
///
/// Every variant describes a malformed frame or message; inbound paths
/// drop these silently and only count them.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Buffer is shorter than the fixed header.
    #[error("malformed frame: expected at least {expected} bytes, got {actual}")]
    TooShort {
        /// Minimum expected size.
        expected: usize,
        /// Actual size received.
        actual: usize,
    },

    /// Declared length is smaller than the header it includes.
    #[error("malformed frame: declared length {declared} is below the {header}-byte header")]
    LengthUnderflow {
        /// Length from the wire.
        declared: usize,
        /// Fixed header size.
        header: usize,
    },

    /// Declared length runs past the end of the buffer.
    #[error("malformed frame: declared length {declared} exceeds {available} available bytes")]
    LengthOverrun {
        /// Length from the wire.
        declared: usize,
        /// Bytes actually present.
        available: usize,
    },

    /// APDU does not fit the 16-bit length field.
    #[error("apdu of {0} bytes does not fit a GOOSE frame")]
    ApduTooLarge(usize),

    /// Control message payload does not fit the 16-bit length field.
    #[error("control payload of {0} bytes exceeds the length field")]
    MessageTooLarge(usize),

    /// Delivery outcome byte is not recognised.
    #[error("unknown delivery outcome {0}")]
    UnknownOutcome(u8),

    /// Unknown control message kind.
    #[error("unknown control message kind 0x{0:04x}")]
    UnknownKind(u16),

    /// Interface name field is not valid text.
    #[error("invalid interface name field")]
    InvalidName,
}

/// Errors from parameter validation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParamError {
    /// Value could not be parsed as an unsigned integer or flag.
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue {
        /// Parameter key.
        key: String,
        /// Rejected text.
        value: String,
    },

    /// Value is longer than the interface accepts.
    #[error("value for {key} is {len} bytes, limit is {max}")]
    TooLong {
        /// Parameter key.
        key: String,
        /// Supplied length.
        len: usize,
        /// Accepted maximum.
        max: usize,
    },

    /// Initial retransmission interval above the maximum interval.
    #[error("initial interval {initial_ms}ms exceeds maximum interval {max_ms}ms")]
    InvalidSchedule {
        /// Initial interval.
        initial_ms: u32,
        /// Maximum interval.
        max_ms: u32,
    },

    /// Unknown configuration key.
    #[error("unknown parameter: {0}")]
    UnknownKey(String),

    /// Key is exposed for reading only.
    #[error("parameter {0} is read-only")]
    ReadOnly(String),

    /// Interface name is empty or too long.
    #[error("invalid interface name {0:?}")]
    InvalidInterface(String),
}

//! Wire formats: GOOSE frames, the Ethernet envelope, and control-channel
//! messages.
//!
//! Everything here is pure encoding and decoding; decoders return
//! [`FrameError`](crate::core::FrameError) on malformed input and never panic.

mod control;
mod ethernet;
mod goose;

pub use control::*;
pub use ethernet::EthernetHeader;
pub use goose::{GooseFrame, SeqType};

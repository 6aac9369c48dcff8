//! Core types, constants, and error types.
//!
//! Nothing in this module performs I/O.

mod constants;
mod error;
mod types;

pub use constants::*;
pub use error::*;
pub use types::*;

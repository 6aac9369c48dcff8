//! Addressing types used on the wire and across the engine.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use super::constants::{DEFAULT_INTERFACE, ETH_ALEN, IFNAMSIZ, MAX_INTERFACE_NAME_LEN};
use super::error::{FrameError, ParamError};

/// 48-bit Ethernet hardware address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MacAddress([u8; ETH_ALEN]);

impl MacAddress {
    /// All-ones broadcast address.
    pub const BROADCAST: Self = Self([0xFF; ETH_ALEN]);

    /// All-zero address.
    pub const ZERO: Self = Self([0; ETH_ALEN]);

    /// Create an address from raw bytes.
    pub const fn new(bytes: [u8; ETH_ALEN]) -> Self {
        Self(bytes)
    }

    /// Create an address from the first six bytes of a slice.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, FrameError> {
        let raw: [u8; ETH_ALEN] = bytes
            .get(..ETH_ALEN)
            .and_then(|b| b.try_into().ok())
            .ok_or(FrameError::TooShort {
                expected: ETH_ALEN,
                actual: bytes.len(),
            })?;
        Ok(Self(raw))
    }

    /// Raw address bytes.
    pub fn octets(&self) -> [u8; ETH_ALEN] {
        self.0
    }

    /// Whether this is the broadcast address.
    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }

    /// Whether the group bit is set (multicast or broadcast).
    pub fn is_multicast(&self) -> bool {
        self.0[0] & 0x01 != 0
    }
}

impl AsRef<[u8]> for MacAddress {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

impl fmt::Debug for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MacAddress({self})")
    }
}

impl Serialize for MacAddress {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Error parsing a textual hardware address.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid hardware address {0:?}")]
pub struct ParseMacError(String);

impl FromStr for MacAddress {
    type Err = ParseMacError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; ETH_ALEN];
        let mut parts = s.split([':', '-']);
        for byte in bytes.iter_mut() {
            let part = parts.next().ok_or_else(|| ParseMacError(s.to_string()))?;
            if part.len() != 2 {
                return Err(ParseMacError(s.to_string()));
            }
            *byte = u8::from_str_radix(part, 16).map_err(|_| ParseMacError(s.to_string()))?;
        }
        if parts.next().is_some() {
            return Err(ParseMacError(s.to_string()));
        }
        Ok(Self(bytes))
    }
}

/// Where a frame is addressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Destination {
    /// The egress interface's broadcast address.
    Broadcast,
    /// A specific station.
    Unicast(MacAddress),
}

impl Destination {
    /// Resolve against the egress interface's broadcast address.
    pub fn resolve(&self, broadcast: MacAddress) -> MacAddress {
        match self {
            Self::Broadcast => broadcast,
            Self::Unicast(addr) => *addr,
        }
    }
}

/// Network interface name, at most 15 bytes (the kernel's `IFNAMSIZ - 1`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct InterfaceName(String);

impl InterfaceName {
    /// Validate and wrap an interface name.
    pub fn new(name: impl Into<String>) -> Result<Self, ParamError> {
        let name = name.into();
        if name.is_empty() || name.len() > MAX_INTERFACE_NAME_LEN || name.contains('\0') {
            return Err(ParamError::InvalidInterface(name));
        }
        Ok(Self(name))
    }

    /// The name as text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Encode into the fixed NUL-padded wire field.
    pub fn to_field(&self) -> [u8; IFNAMSIZ] {
        let mut field = [0u8; IFNAMSIZ];
        field[..self.0.len()].copy_from_slice(self.0.as_bytes());
        field
    }

    /// Decode a fixed wire field. An empty field yields `None`.
    pub fn from_field(field: &[u8]) -> Result<Option<Self>, FrameError> {
        let field = field.get(..IFNAMSIZ).ok_or(FrameError::TooShort {
            expected: IFNAMSIZ,
            actual: field.len(),
        })?;
        let end = field.iter().position(|&b| b == 0).unwrap_or(IFNAMSIZ);
        if end == 0 {
            return Ok(None);
        }
        if end > MAX_INTERFACE_NAME_LEN {
            return Err(FrameError::InvalidName);
        }
        let name = std::str::from_utf8(&field[..end]).map_err(|_| FrameError::InvalidName)?;
        Ok(Some(Self(name.to_string())))
    }
}

impl Default for InterfaceName {
    fn default() -> Self {
        Self(DEFAULT_INTERFACE.to_string())
    }
}

impl fmt::Display for InterfaceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for InterfaceName {
    type Err = ParamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

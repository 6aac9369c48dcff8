//! Ethernet II envelope.
//!
//! ```text
//! +----------+----------+-------------------+-----------+---------+
//! | Dst (6)  | Src (6)  | [0x8100 TCI] (4)  | Type (2)  | Payload |
//! +----------+----------+-------------------+-----------+---------+
//! ```
//!
//! Decoding skips a single 802.1Q tag. Encoding never emits one.

use bytes::{BufMut, Bytes, BytesMut};

use crate::core::{ETH_ALEN, ETH_HEADER_SIZE, ETH_P_8021Q, FrameError, MacAddress, VLAN_TAG_SIZE};

/// Parsed Ethernet header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EthernetHeader {
    /// Destination address.
    pub destination: MacAddress,
    /// Source address.
    pub source: MacAddress,
    /// Protocol identifier after any VLAN tag.
    pub ethertype: u16,
}

impl EthernetHeader {
    /// Create a header.
    pub fn new(destination: MacAddress, source: MacAddress, ethertype: u16) -> Self {
        Self {
            destination,
            source,
            ethertype,
        }
    }

    /// Parse the header and return it with the remaining payload.
    pub fn parse(data: &[u8]) -> Result<(Self, &[u8]), FrameError> {
        if data.len() < ETH_HEADER_SIZE {
            return Err(FrameError::TooShort {
                expected: ETH_HEADER_SIZE,
                actual: data.len(),
            });
        }

        let destination = MacAddress::from_slice(&data[..ETH_ALEN])?;
        let source = MacAddress::from_slice(&data[ETH_ALEN..2 * ETH_ALEN])?;
        let mut ethertype = u16::from_be_bytes([data[12], data[13]]);
        let mut offset = ETH_HEADER_SIZE;

        if ethertype == ETH_P_8021Q {
            let tagged = ETH_HEADER_SIZE + VLAN_TAG_SIZE;
            if data.len() < tagged {
                return Err(FrameError::TooShort {
                    expected: tagged,
                    actual: data.len(),
                });
            }
            ethertype = u16::from_be_bytes([data[16], data[17]]);
            offset = tagged;
        }

        Ok((Self::new(destination, source, ethertype), &data[offset..]))
    }

    /// Append the untagged header to `buf`.
    pub fn encode_into(&self, buf: &mut BytesMut) {
        buf.put_slice(self.destination.as_ref());
        buf.put_slice(self.source.as_ref());
        buf.put_u16(self.ethertype);
    }

    /// Encode a complete frame around `payload`.
    pub fn encapsulate(&self, payload: &[u8]) -> Bytes {
        let mut buf = BytesMut::with_capacity(ETH_HEADER_SIZE + payload.len());
        self.encode_into(&mut buf);
        buf.put_slice(payload);
        buf.freeze()
    }
}

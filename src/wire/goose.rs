//! GOOSE frame encoding and decoding.
//!
//! Wire format (8-byte header followed by the APDU):
//! ```text
//! +----------+----------+---------+---------+----------+----------+--------+
//! | APPID    | Length   | SigLen  | SeqNum  | SeqType  | Reserved | APDU   |
//! | 2 (BE16) | 2 (BE16) | 1 byte  | 1 byte  | 1 byte   | 1 byte   | ...    |
//! +----------+----------+---------+---------+----------+----------+--------+
//! ```
//!
//! `Length` covers the header and the APDU.

use bytes::{BufMut, Bytes, BytesMut};

use crate::core::{FrameError, GOOSE_HEADER_SIZE, MAX_APDU_SIZE, SEQ_TYPE_ACK, SEQ_TYPE_FRAME};

/// Sequence type byte of the reliability extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SeqType {
    /// Data transmission.
    Frame,
    /// Acknowledgment.
    Ack,
    /// Any other value, carried verbatim.
    Other(u8),
}

impl SeqType {
    /// Parse a sequence type from its byte.
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            SEQ_TYPE_FRAME => Self::Frame,
            SEQ_TYPE_ACK => Self::Ack,
            other => Self::Other(other),
        }
    }

    /// Byte representation.
    pub fn as_byte(self) -> u8 {
        match self {
            Self::Frame => SEQ_TYPE_FRAME,
            Self::Ack => SEQ_TYPE_ACK,
            Self::Other(b) => b,
        }
    }
}

/// A GOOSE frame: header fields plus opaque APDU.
///
/// The length field is never stored; it is derived from the APDU on encode,
/// so a constructed frame always satisfies `payload_length >= 8`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GooseFrame {
    app_id: u16,
    sig_len: u8,
    seq_number: u8,
    seq_type: SeqType,
    reserved: u8,
    apdu: Bytes,
}

impl GooseFrame {
    /// Create a data frame with zeroed extension fields.
    pub fn new(app_id: u16, apdu: impl Into<Bytes>) -> Result<Self, FrameError> {
        let apdu = apdu.into();
        if apdu.len() > MAX_APDU_SIZE {
            return Err(FrameError::ApduTooLarge(apdu.len()));
        }
        Ok(Self {
            app_id,
            sig_len: 0,
            seq_number: 0,
            seq_type: SeqType::Frame,
            reserved: 0,
            apdu,
        })
    }

    /// Set the signature length byte.
    pub fn with_sig_len(mut self, sig_len: u8) -> Self {
        self.sig_len = sig_len;
        self
    }

    /// Set the sequence number byte.
    pub fn with_seq_number(mut self, seq_number: u8) -> Self {
        self.seq_number = seq_number;
        self
    }

    /// Set the sequence type.
    pub fn with_seq_type(mut self, seq_type: SeqType) -> Self {
        self.seq_type = seq_type;
        self
    }

    /// Set the reserved byte.
    pub fn with_reserved(mut self, reserved: u8) -> Self {
        self.reserved = reserved;
        self
    }

    /// Application identifier.
    pub fn app_id(&self) -> u16 {
        self.app_id
    }

    /// Signature length (security extension).
    pub fn sig_len(&self) -> u8 {
        self.sig_len
    }

    /// Sequence number.
    pub fn seq_number(&self) -> u8 {
        self.seq_number
    }

    /// Sequence type.
    pub fn seq_type(&self) -> SeqType {
        self.seq_type
    }

    /// Reserved byte.
    pub fn reserved(&self) -> u8 {
        self.reserved
    }

    /// Application payload.
    pub fn apdu(&self) -> &Bytes {
        &self.apdu
    }

    /// Value of the length field: header plus APDU.
    pub fn payload_length(&self) -> u16 {
        // MAX_APDU_SIZE bounds the sum.
        (GOOSE_HEADER_SIZE + self.apdu.len()) as u16
    }

    /// Encoded size in bytes.
    pub fn encoded_len(&self) -> usize {
        GOOSE_HEADER_SIZE + self.apdu.len()
    }

    /// Append the encoded frame to `buf`.
    pub fn encode_into(&self, buf: &mut BytesMut) {
        buf.reserve(self.encoded_len());
        buf.put_u16(self.app_id);
        buf.put_u16(self.payload_length());
        buf.put_u8(self.sig_len);
        buf.put_u8(self.seq_number);
        buf.put_u8(self.seq_type.as_byte());
        buf.put_u8(self.reserved);
        buf.extend_from_slice(&self.apdu);
    }

    /// Encode the frame.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode_into(&mut buf);
        buf.freeze()
    }

    /// Decode a frame.
    ///
    /// Bytes past the declared length (Ethernet padding) are ignored.
    pub fn decode(data: &[u8]) -> Result<Self, FrameError> {
        if data.len() < GOOSE_HEADER_SIZE {
            return Err(FrameError::TooShort {
                expected: GOOSE_HEADER_SIZE,
                actual: data.len(),
            });
        }

        let app_id = u16::from_be_bytes([data[0], data[1]]);
        let declared = u16::from_be_bytes([data[2], data[3]]) as usize;

        if declared < GOOSE_HEADER_SIZE {
            return Err(FrameError::LengthUnderflow {
                declared,
                header: GOOSE_HEADER_SIZE,
            });
        }
        if declared > data.len() {
            return Err(FrameError::LengthOverrun {
                declared,
                available: data.len(),
            });
        }

        Ok(Self {
            app_id,
            sig_len: data[4],
            seq_number: data[5],
            seq_type: SeqType::from_byte(data[6]),
            reserved: data[7],
            apdu: Bytes::copy_from_slice(&data[GOOSE_HEADER_SIZE..declared]),
        })
    }
}

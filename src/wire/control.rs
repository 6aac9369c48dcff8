//! Control-channel messages exchanged between the engine and its controller.
//!
//! Every message is wrapped in a 4-byte envelope:
//! ```text
//! +-----------+-------------+-------------------+
//! | Kind (2)  | Length (2)  | Payload (Length)  |
//! +-----------+-------------+-------------------+
//! ```
//!
//! All integers are big-endian. Bytes past `Length` are ignored.
//!
//! Controller to engine:
//! - `0xFFFF` register (empty payload)
//! - `0x0001` set parameters
//! - `0x0002` / `0x0004` broadcast / unicast data, optionally OR-ed with the
//!   `0x0008` reliable flag
//!
//! Engine to controller:
//! - `0x0100` inbound frame
//! - `0x0200` delivery report

use bytes::{BufMut, Bytes, BytesMut};
use serde::Serialize;

use super::goose::GooseFrame;
use crate::core::{
    CONTROL_HEADER_SIZE, DATA_HEADER_SIZE, Destination, ETH_ALEN, FrameError, IFNAMSIZ,
    InterfaceName, KIND_CTRL, KIND_DATA_BROADCAST, KIND_DATA_RELIABLE, KIND_DATA_UNICAST,
    KIND_INBOUND, KIND_REGISTER, KIND_REPORT, MacAddress, REPORT_SIZE, SET_PARAMETERS_SIZE,
};

/// Parameter update carried by a control message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetParameters {
    /// Delivery delay threshold (ms).
    pub delay_threshold_ms: u32,
    /// Initial retransmission interval (ms).
    pub initial_interval_ms: u32,
    /// Maximum retransmission interval (ms).
    pub max_interval_ms: u32,
    /// Interval increment per retransmission (ms).
    pub increment_ms: u32,
    /// New default interface; `None` leaves it unchanged.
    pub default_device: Option<InterfaceName>,
}

/// A GOOSE frame the controller wants transmitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendData {
    /// Egress interface; `None` selects the default interface.
    pub device: Option<InterfaceName>,
    /// Broadcast or unicast addressing.
    pub destination: Destination,
    /// Source address supplied by the controller. The engine always
    /// substitutes the egress interface's own address.
    pub source: MacAddress,
    /// Route through the retransmission engine.
    pub reliable: bool,
    /// Frame to send.
    pub frame: GooseFrame,
}

/// A received GOOSE frame forwarded to the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundFrame {
    /// Interface the frame arrived on.
    pub device: InterfaceName,
    /// Ethernet destination.
    pub destination: MacAddress,
    /// Ethernet source.
    pub source: MacAddress,
    /// Decoded frame.
    pub frame: GooseFrame,
}

/// How a reliable session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryOutcome {
    /// Delay threshold or retry ceiling reached.
    Delivered,
    /// A transmission failed.
    Failed,
    /// Engine shut down mid-session.
    Cancelled,
}

impl DeliveryOutcome {
    fn as_byte(self) -> u8 {
        match self {
            Self::Delivered => 0,
            Self::Failed => 1,
            Self::Cancelled => 2,
        }
    }

    fn from_byte(byte: u8) -> Result<Self, FrameError> {
        match byte {
            0 => Ok(Self::Delivered),
            1 => Ok(Self::Failed),
            2 => Ok(Self::Cancelled),
            other => Err(FrameError::UnknownOutcome(other)),
        }
    }
}

/// Completion notice for a reliable session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeliveryReport {
    /// How the session ended.
    pub outcome: DeliveryOutcome,
    /// Transmissions made.
    pub attempts: u32,
    /// Accumulated wait time (ms).
    pub elapsed_ms: u32,
    /// APPID of the frame.
    pub app_id: u16,
    /// Resolved destination address.
    pub destination: MacAddress,
}

/// A decoded control-channel message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlMessage {
    /// Sender becomes the registered controller.
    Register,
    /// Update retransmission parameters.
    SetParameters(SetParameters),
    /// Transmit a frame.
    SendData(SendData),
    /// Received frame (engine to controller).
    Inbound(InboundFrame),
    /// Reliable session finished (engine to controller).
    Report(DeliveryReport),
}

impl ControlMessage {
    /// Kind field for this message.
    pub fn kind(&self) -> u16 {
        match self {
            Self::Register => KIND_REGISTER,
            Self::SetParameters(_) => KIND_CTRL,
            Self::SendData(data) => {
                let base = match data.destination {
                    Destination::Broadcast => KIND_DATA_BROADCAST,
                    Destination::Unicast(_) => KIND_DATA_UNICAST,
                };
                if data.reliable {
                    base | KIND_DATA_RELIABLE
                } else {
                    base
                }
            }
            Self::Inbound(_) => KIND_INBOUND,
            Self::Report(_) => KIND_REPORT,
        }
    }

    /// Encode the message with its envelope.
    pub fn encode(&self) -> Result<Bytes, FrameError> {
        let mut payload = BytesMut::new();
        match self {
            Self::Register => {}
            Self::SetParameters(params) => {
                payload.reserve(SET_PARAMETERS_SIZE);
                payload.put_u32(params.delay_threshold_ms);
                payload.put_u32(params.initial_interval_ms);
                payload.put_u32(params.max_interval_ms);
                payload.put_u32(params.increment_ms);
                put_device(&mut payload, params.default_device.as_ref());
            }
            Self::SendData(data) => {
                put_device(&mut payload, data.device.as_ref());
                payload.put_slice(data.destination.resolve(MacAddress::BROADCAST).as_ref());
                payload.put_slice(data.source.as_ref());
                data.frame.encode_into(&mut payload);
            }
            Self::Inbound(inbound) => {
                put_device(&mut payload, Some(&inbound.device));
                payload.put_slice(inbound.destination.as_ref());
                payload.put_slice(inbound.source.as_ref());
                inbound.frame.encode_into(&mut payload);
            }
            Self::Report(report) => {
                payload.reserve(REPORT_SIZE);
                payload.put_u8(report.outcome.as_byte());
                payload.put_u32(report.attempts);
                payload.put_u32(report.elapsed_ms);
                payload.put_u16(report.app_id);
                payload.put_slice(report.destination.as_ref());
            }
        }

        let length =
            u16::try_from(payload.len()).map_err(|_| FrameError::MessageTooLarge(payload.len()))?;
        let mut buf = BytesMut::with_capacity(CONTROL_HEADER_SIZE + payload.len());
        buf.put_u16(self.kind());
        buf.put_u16(length);
        buf.extend_from_slice(&payload);
        Ok(buf.freeze())
    }

    /// Decode a message from its envelope.
    pub fn decode(data: &[u8]) -> Result<Self, FrameError> {
        if data.len() < CONTROL_HEADER_SIZE {
            return Err(FrameError::TooShort {
                expected: CONTROL_HEADER_SIZE,
                actual: data.len(),
            });
        }

        let kind = u16::from_be_bytes([data[0], data[1]]);
        let length = u16::from_be_bytes([data[2], data[3]]) as usize;
        let available = data.len() - CONTROL_HEADER_SIZE;
        if length > available {
            return Err(FrameError::LengthOverrun {
                declared: length,
                available,
            });
        }
        let payload = &data[CONTROL_HEADER_SIZE..CONTROL_HEADER_SIZE + length];

        match kind {
            KIND_REGISTER => Ok(Self::Register),
            KIND_INBOUND => decode_inbound(payload).map(Self::Inbound),
            KIND_REPORT => decode_report(payload).map(Self::Report),
            k if k & KIND_CTRL != 0 => decode_set_parameters(payload).map(Self::SetParameters),
            k if k & KIND_DATA_BROADCAST != 0 => {
                decode_send_data(payload, true, k & KIND_DATA_RELIABLE != 0).map(Self::SendData)
            }
            k if k & KIND_DATA_UNICAST != 0 => {
                decode_send_data(payload, false, k & KIND_DATA_RELIABLE != 0).map(Self::SendData)
            }
            other => Err(FrameError::UnknownKind(other)),
        }
    }
}

fn put_device(buf: &mut BytesMut, device: Option<&InterfaceName>) {
    match device {
        Some(name) => buf.put_slice(&name.to_field()),
        None => buf.put_bytes(0, IFNAMSIZ),
    }
}

fn require(payload: &[u8], expected: usize) -> Result<(), FrameError> {
    if payload.len() < expected {
        return Err(FrameError::TooShort {
            expected,
            actual: payload.len(),
        });
    }
    Ok(())
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

fn decode_set_parameters(payload: &[u8]) -> Result<SetParameters, FrameError> {
    require(payload, SET_PARAMETERS_SIZE)?;
    Ok(SetParameters {
        delay_threshold_ms: read_u32(payload, 0),
        initial_interval_ms: read_u32(payload, 4),
        max_interval_ms: read_u32(payload, 8),
        increment_ms: read_u32(payload, 12),
        default_device: InterfaceName::from_field(&payload[16..16 + IFNAMSIZ])?,
    })
}

/// Shared layout of SendData and Inbound payloads.
fn decode_data_header(
    payload: &[u8],
) -> Result<(Option<InterfaceName>, MacAddress, MacAddress, GooseFrame), FrameError> {
    require(payload, DATA_HEADER_SIZE)?;
    let device = InterfaceName::from_field(&payload[..IFNAMSIZ])?;
    let destination = MacAddress::from_slice(&payload[IFNAMSIZ..IFNAMSIZ + ETH_ALEN])?;
    let source = MacAddress::from_slice(&payload[IFNAMSIZ + ETH_ALEN..DATA_HEADER_SIZE])?;
    let frame = GooseFrame::decode(&payload[DATA_HEADER_SIZE..])?;
    Ok((device, destination, source, frame))
}

fn decode_send_data(payload: &[u8], broadcast: bool, reliable: bool) -> Result<SendData, FrameError> {
    let (device, destination, source, frame) = decode_data_header(payload)?;
    Ok(SendData {
        device,
        destination: if broadcast {
            Destination::Broadcast
        } else {
            Destination::Unicast(destination)
        },
        source,
        reliable,
        frame,
    })
}

fn decode_inbound(payload: &[u8]) -> Result<InboundFrame, FrameError> {
    let (device, destination, source, frame) = decode_data_header(payload)?;
    Ok(InboundFrame {
        device: device.ok_or(FrameError::InvalidName)?,
        destination,
        source,
        frame,
    })
}

fn decode_report(payload: &[u8]) -> Result<DeliveryReport, FrameError> {
    require(payload, REPORT_SIZE)?;
    Ok(DeliveryReport {
        outcome: DeliveryOutcome::from_byte(payload[0])?,
        attempts: read_u32(payload, 1),
        elapsed_ms: read_u32(payload, 5),
        app_id: u16::from_be_bytes([payload[9], payload[10]]),
        destination: MacAddress::from_slice(&payload[11..REPORT_SIZE])?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::MAX_APDU_SIZE;

    const PEER: MacAddress = MacAddress::new([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);

    fn ping() -> GooseFrame {
        GooseFrame::new(1, &b"PING"[..]).unwrap()
    }

    #[test]
    fn test_register_layout() {
        let bytes = ControlMessage::Register.encode().unwrap();
        assert_eq!(hex::encode(&bytes), "ffff0000");
        assert_eq!(ControlMessage::decode(&bytes).unwrap(), ControlMessage::Register);
    }

    #[test]
    fn test_set_parameters_layout() {
        let msg = ControlMessage::SetParameters(SetParameters {
            delay_threshold_ms: 50,
            initial_interval_ms: 10,
            max_interval_ms: 40,
            increment_ms: 5,
            default_device: Some(InterfaceName::new("eth1").unwrap()),
        });
        let bytes = msg.encode().unwrap();
        assert_eq!(
            hex::encode(&bytes[..20]),
            "00010020000000320000000a0000002800000005"
        );
        assert_eq!(&bytes[20..24], b"eth1");
        assert_eq!(bytes.len(), CONTROL_HEADER_SIZE + SET_PARAMETERS_SIZE);
        assert_eq!(ControlMessage::decode(&bytes).unwrap(), msg);
    }

    #[test]
    fn test_set_parameters_empty_device() {
        let msg = ControlMessage::SetParameters(SetParameters {
            delay_threshold_ms: 1,
            initial_interval_ms: 2,
            max_interval_ms: 3,
            increment_ms: 4,
            default_device: None,
        });
        let decoded = ControlMessage::decode(&msg.encode().unwrap()).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn test_send_data_kinds() {
        let unicast = SendData {
            device: None,
            destination: Destination::Unicast(PEER),
            source: MacAddress::ZERO,
            reliable: true,
            frame: ping(),
        };
        let msg = ControlMessage::SendData(unicast.clone());
        assert_eq!(msg.kind(), KIND_DATA_UNICAST | KIND_DATA_RELIABLE);
        assert_eq!(ControlMessage::decode(&msg.encode().unwrap()).unwrap(), msg);

        let broadcast = ControlMessage::SendData(SendData {
            destination: Destination::Broadcast,
            reliable: false,
            ..unicast
        });
        let bytes = broadcast.encode().unwrap();
        assert_eq!(hex::encode(&bytes[..2]), "0002");
        assert_eq!(&bytes[20..26], &[0xFF; 6]);
        assert_eq!(ControlMessage::decode(&bytes).unwrap(), broadcast);
    }

    #[test]
    fn test_broadcast_bit_wins_over_unicast() {
        let mut bytes = ControlMessage::SendData(SendData {
            device: None,
            destination: Destination::Unicast(PEER),
            source: MacAddress::ZERO,
            reliable: false,
            frame: ping(),
        })
        .encode()
        .unwrap()
        .to_vec();
        bytes[1] = (KIND_DATA_BROADCAST | KIND_DATA_UNICAST) as u8;

        match ControlMessage::decode(&bytes).unwrap() {
            ControlMessage::SendData(data) => assert_eq!(data.destination, Destination::Broadcast),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_inbound_and_report() {
        let inbound = ControlMessage::Inbound(InboundFrame {
            device: InterfaceName::new("eth0").unwrap(),
            destination: MacAddress::BROADCAST,
            source: PEER,
            frame: ping(),
        });
        assert_eq!(
            ControlMessage::decode(&inbound.encode().unwrap()).unwrap(),
            inbound
        );

        let report = ControlMessage::Report(DeliveryReport {
            outcome: DeliveryOutcome::Delivered,
            attempts: 5,
            elapsed_ms: 50,
            app_id: 1,
            destination: PEER,
        });
        let bytes = report.encode().unwrap();
        assert_eq!(
            hex::encode(&bytes),
            "020000110000000005000000320001aabbccddeeff"
        );
        assert_eq!(ControlMessage::decode(&bytes).unwrap(), report);
    }

    #[test]
    fn test_malformed_messages() {
        assert!(matches!(
            ControlMessage::decode(&[0x00, 0x01]),
            Err(FrameError::TooShort { .. })
        ));
        // Declared length past the buffer.
        assert!(matches!(
            ControlMessage::decode(&[0x00, 0x01, 0x00, 0x20, 0x00]),
            Err(FrameError::LengthOverrun {
                declared: 32,
                available: 1
            })
        ));
        // Undersized SetParameters payload.
        assert!(matches!(
            ControlMessage::decode(&[0x00, 0x01, 0x00, 0x01, 0x00]),
            Err(FrameError::TooShort {
                expected: 32,
                actual: 1
            })
        ));
        assert_eq!(
            ControlMessage::decode(&[0x00, 0x10, 0x00, 0x00]),
            Err(FrameError::UnknownKind(0x0010))
        );
        // Data header present but the embedded GOOSE frame is truncated.
        let mut data = vec![0x00, 0x04, 0x00, 0x1E];
        data.extend_from_slice(&[0u8; 30]);
        assert!(matches!(
            ControlMessage::decode(&data),
            Err(FrameError::TooShort { expected: 8, .. })
        ));
    }

    #[test]
    fn test_message_too_large() {
        let frame = GooseFrame::new(1, vec![0u8; MAX_APDU_SIZE]).unwrap();
        let msg = ControlMessage::SendData(SendData {
            device: None,
            destination: Destination::Broadcast,
            source: MacAddress::ZERO,
            reliable: false,
            frame,
        });
        assert!(matches!(msg.encode(), Err(FrameError::MessageTooLarge(_))));
    }
}

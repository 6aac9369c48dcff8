//! Protocol constants and engine defaults.
//!
//! Wire values are fixed by IEC 61850-8-1 and the control-channel format;
//! defaults are the values the engine starts with before any controller
//! reconfigures it.

// =============================================================================
// ETHERNET
// =============================================================================

/// Ethernet protocol identifier (ethertype) for GOOSE.
pub const ETH_P_GOOSE: u16 = 0x88B8;

/// IEEE 802.1Q VLAN tag protocol identifier.
pub const ETH_P_8021Q: u16 = 0x8100;

/// Hardware address length.
pub const ETH_ALEN: usize = 6;

/// Ethernet header size (destination + source + ethertype).
pub const ETH_HEADER_SIZE: usize = 14;

/// Size of an 802.1Q tag (TPID + TCI).
pub const VLAN_TAG_SIZE: usize = 4;

/// Default Ethernet MTU (maximum payload after the Ethernet header).
pub const DEFAULT_MTU: usize = 1500;

// =============================================================================
// GOOSE FRAME
// =============================================================================

/// GOOSE header size (app_id + length + sig_len + seq_number + seq_type + reserved).
pub const GOOSE_HEADER_SIZE: usize = 8;

/// Largest APDU that keeps the 16-bit length field valid.
pub const MAX_APDU_SIZE: usize = u16::MAX as usize - GOOSE_HEADER_SIZE;

/// Sequence type marking a data transmission.
pub const SEQ_TYPE_FRAME: u8 = 0x00;

/// Sequence type marking an acknowledgment.
pub const SEQ_TYPE_ACK: u8 = 0x01;

// =============================================================================
// CONTROL CHANNEL
// =============================================================================

/// Interface name field size on the control channel (15 bytes + NUL).
pub const IFNAMSIZ: usize = 16;

/// Longest interface name that fits the control-channel field.
pub const MAX_INTERFACE_NAME_LEN: usize = IFNAMSIZ - 1;

/// Control envelope header size (kind + length).
pub const CONTROL_HEADER_SIZE: usize = 4;

/// Data header size (device name + destination + source).
pub const DATA_HEADER_SIZE: usize = IFNAMSIZ + ETH_ALEN + ETH_ALEN;

/// SetParameters payload size (four u32 values + device name).
pub const SET_PARAMETERS_SIZE: usize = 4 * 4 + IFNAMSIZ;

/// Delivery report payload size (outcome + attempts + elapsed + app_id + destination).
pub const REPORT_SIZE: usize = 1 + 4 + 4 + 2 + ETH_ALEN;

/// Largest control message the sockets accept.
pub const MAX_CONTROL_MESSAGE_SIZE: usize = CONTROL_HEADER_SIZE + u16::MAX as usize;

/// Message kind: parameter update.
pub const KIND_CTRL: u16 = 0x0001;

/// Message kind: broadcast data.
pub const KIND_DATA_BROADCAST: u16 = 0x0002;

/// Message kind: unicast data.
pub const KIND_DATA_UNICAST: u16 = 0x0004;

/// Message kind flag: deliver through the reliable retransmission path.
pub const KIND_DATA_RELIABLE: u16 = 0x0008;

/// Message kind: inbound frame forwarded to the controller.
pub const KIND_INBOUND: u16 = 0x0100;

/// Message kind: reliable delivery report sent to the controller.
pub const KIND_REPORT: u16 = 0x0200;

/// Message kind: controller registration.
pub const KIND_REGISTER: u16 = 0xFFFF;

// =============================================================================
// RELIABLE DELIVERY
// =============================================================================

/// Hard ceiling on retries per reliable session.
pub const MAX_ATTEMPTS: u32 = 32;

// =============================================================================
// DEFAULTS
// =============================================================================

/// Default egress interface.
pub const DEFAULT_INTERFACE: &str = "eth0";

/// Default heartbeat transmission interval (ms).
pub const DEFAULT_TRANSMIT_INTERVAL_MS: u32 = 5000;

/// Default delivery delay threshold (ms).
pub const DEFAULT_DELAY_THRESHOLD_MS: u32 = 50;

/// Default initial retransmission interval (ms).
pub const DEFAULT_RETRANSMIT_INTERVAL_MS: u32 = 10;

/// Default retransmission interval increment (ms).
pub const DEFAULT_RETRANSMIT_INCREMENT_MS: u32 = 0;

/// Default maximum retransmission interval (ms).
pub const DEFAULT_MAX_RETRANSMIT_INTERVAL_MS: u32 = 10;

/// Longest textual value accepted by the key-value configuration interface.
pub const MAX_CONFIG_VALUE_LEN: usize = 15;

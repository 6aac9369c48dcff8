//! Key-value configuration surface.
//!
//! Each key maps to one parameter (or counter). Values are short text: at
//! most 15 bytes once surrounding whitespace, including a trailing newline,
//! is removed.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use tracing::{info, warn};

use crate::core::{InterfaceName, MAX_CONFIG_VALUE_LEN, ParamError};
use crate::params::ParameterStore;
use crate::transport::{DeviceRegistry, TransportStats};

/// A configuration key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigKey {
    /// Default egress interface name.
    DefaultDevice,
    /// Heartbeat interval (ms).
    TransmitInterval,
    /// Delivery delay threshold (ms).
    DelayThreshold,
    /// Initial retransmission interval (ms).
    RetransmitInterval,
    /// Retransmission interval increment (ms).
    RetransmitIncrement,
    /// Maximum retransmission interval (ms).
    MaxRetransmitInterval,
    /// Outbound transmission flag (`0`/`1`).
    TransmitEnabled,
    /// Inbound forwarding flag (`0`/`1`).
    ReceiveEnabled,
    /// Completed reliable sessions. Read-only.
    ReliableDelivered,
}

impl ConfigKey {
    /// Every key, in display order.
    pub const ALL: [ConfigKey; 9] = [
        Self::DefaultDevice,
        Self::TransmitInterval,
        Self::DelayThreshold,
        Self::RetransmitInterval,
        Self::RetransmitIncrement,
        Self::MaxRetransmitInterval,
        Self::TransmitEnabled,
        Self::ReceiveEnabled,
        Self::ReliableDelivered,
    ];

    /// Key name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DefaultDevice => "default_device",
            Self::TransmitInterval => "transmit_interval_ms",
            Self::DelayThreshold => "delay_threshold_ms",
            Self::RetransmitInterval => "retransmit_interval_ms",
            Self::RetransmitIncrement => "retransmit_increment_ms",
            Self::MaxRetransmitInterval => "max_retransmit_interval_ms",
            Self::TransmitEnabled => "transmit_enabled",
            Self::ReceiveEnabled => "receive_enabled",
            Self::ReliableDelivered => "reliable_delivered",
        }
    }

    /// Whether the key can only be read.
    pub fn is_read_only(self) -> bool {
        matches!(self, Self::ReliableDelivered)
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConfigKey {
    type Err = ParamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| ParamError::UnknownKey(s.to_string()))
    }
}

/// Text get/set over the parameter store.
#[derive(Clone)]
pub struct ConfigInterface {
    params: Arc<ParameterStore>,
    registry: Arc<dyn DeviceRegistry>,
    stats: Arc<TransportStats>,
}

impl ConfigInterface {
    /// Create the interface.
    pub fn new(
        params: Arc<ParameterStore>,
        registry: Arc<dyn DeviceRegistry>,
        stats: Arc<TransportStats>,
    ) -> Self {
        Self {
            params,
            registry,
            stats,
        }
    }

    /// Read a value.
    pub fn get(&self, key: ConfigKey) -> String {
        let p = &self.params;
        match key {
            ConfigKey::DefaultDevice => p.default_interface().to_string(),
            ConfigKey::TransmitInterval => p.transmit_interval_ms().to_string(),
            ConfigKey::DelayThreshold => p.delay_threshold_ms().to_string(),
            ConfigKey::RetransmitInterval => p.retransmit_initial_interval_ms().to_string(),
            ConfigKey::RetransmitIncrement => p.retransmit_increment_ms().to_string(),
            ConfigKey::MaxRetransmitInterval => p.retransmit_max_interval_ms().to_string(),
            ConfigKey::TransmitEnabled => u8::from(p.transmit_enabled()).to_string(),
            ConfigKey::ReceiveEnabled => u8::from(p.receive_enabled()).to_string(),
            ConfigKey::ReliableDelivered => self.stats.reliable_delivered().to_string(),
        }
    }

    /// Read a value by key name.
    pub fn get_str(&self, key: &str) -> Result<String, ParamError> {
        Ok(self.get(key.parse()?))
    }

    /// Write a value.
    pub fn set(&self, key: ConfigKey, value: &str) -> Result<(), ParamError> {
        let value = value.trim();
        if value.len() > MAX_CONFIG_VALUE_LEN {
            return Err(ParamError::TooLong {
                key: key.to_string(),
                len: value.len(),
                max: MAX_CONFIG_VALUE_LEN,
            });
        }

        let p = &self.params;
        match key {
            ConfigKey::DefaultDevice => {
                let name = InterfaceName::new(value)?;
                if self.registry.lookup(&name).is_some() {
                    info!(device = %name, "default network device changed");
                } else {
                    warn!(device = %name, "cannot find device, choose another device");
                }
                p.set_default_interface(name);
            }
            ConfigKey::TransmitInterval => p.set_transmit_interval_ms(parse_u32(key, value)?),
            ConfigKey::DelayThreshold => p.set_delay_threshold_ms(parse_u32(key, value)?),
            ConfigKey::RetransmitInterval => {
                p.set_retransmit_initial_interval_ms(parse_u32(key, value)?)?
            }
            ConfigKey::RetransmitIncrement => {
                p.set_retransmit_increment_ms(parse_u32(key, value)?)
            }
            ConfigKey::MaxRetransmitInterval => {
                p.set_retransmit_max_interval_ms(parse_u32(key, value)?)?
            }
            ConfigKey::TransmitEnabled => p.set_transmit_enabled(parse_flag(key, value)?),
            ConfigKey::ReceiveEnabled => p.set_receive_enabled(parse_flag(key, value)?),
            ConfigKey::ReliableDelivered => return Err(ParamError::ReadOnly(key.to_string())),
        }
        Ok(())
    }

    /// Write a value by key name.
    pub fn set_str(&self, key: &str, value: &str) -> Result<(), ParamError> {
        self.set(key.parse()?, value)
    }

    /// All keys with their current values.
    pub fn entries(&self) -> Vec<(ConfigKey, String)> {
        ConfigKey::ALL
            .into_iter()
            .map(|key| (key, self.get(key)))
            .collect()
    }
}

impl fmt::Debug for ConfigInterface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigInterface")
            .field("params", &self.params)
            .finish()
    }
}

fn invalid(key: ConfigKey, value: &str) -> ParamError {
    ParamError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}

fn parse_u32(key: ConfigKey, value: &str) -> Result<u32, ParamError> {
    value.parse().map_err(|_| invalid(key, value))
}

fn parse_flag(key: ConfigKey, value: &str) -> Result<bool, ParamError> {
    match value {
        "0" => Ok(false),
        "1" => Ok(true),
        _ => Err(invalid(key, value)),
    }
}

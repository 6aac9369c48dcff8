//! Process-wide engine parameters.
//!
//! The [`ParameterStore`] is shared by `Arc` between the router, the
//! retransmission sessions, the receive path and the configuration surfaces.
//! Every field is individually atomic. Readers never block; writers of the
//! retransmission schedule are serialized so `initial <= max` always holds.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tracing::debug;

use crate::core::{
    DEFAULT_DELAY_THRESHOLD_MS, DEFAULT_MAX_RETRANSMIT_INTERVAL_MS,
    DEFAULT_RETRANSMIT_INCREMENT_MS, DEFAULT_RETRANSMIT_INTERVAL_MS, DEFAULT_TRANSMIT_INTERVAL_MS,
    InterfaceName, ParamError,
};
use crate::wire::SetParameters;

/// Plain parameter values, used for initial configuration and snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Parameters {
    /// Outbound transmission allowed.
    pub transmit_enabled: bool,
    /// Inbound frames forwarded.
    pub receive_enabled: bool,
    /// Interface used when a send names none.
    pub default_interface: InterfaceName,
    /// Heartbeat interval (ms). Stored and exposed only.
    pub transmit_interval_ms: u32,
    /// Wall-clock delivery budget for a reliable session (ms).
    pub delay_threshold_ms: u32,
    /// First retransmission wait (ms).
    pub retransmit_initial_interval_ms: u32,
    /// Growth of the wait per retransmission (ms).
    pub retransmit_increment_ms: u32,
    /// Ceiling of the wait (ms).
    pub retransmit_max_interval_ms: u32,
}

impl Parameters {
    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<(), ParamError> {
        check_schedule(
            self.retransmit_initial_interval_ms,
            self.retransmit_max_interval_ms,
        )
    }
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            transmit_enabled: true,
            receive_enabled: true,
            default_interface: InterfaceName::default(),
            transmit_interval_ms: DEFAULT_TRANSMIT_INTERVAL_MS,
            delay_threshold_ms: DEFAULT_DELAY_THRESHOLD_MS,
            retransmit_initial_interval_ms: DEFAULT_RETRANSMIT_INTERVAL_MS,
            retransmit_increment_ms: DEFAULT_RETRANSMIT_INCREMENT_MS,
            retransmit_max_interval_ms: DEFAULT_MAX_RETRANSMIT_INTERVAL_MS,
        }
    }
}

fn check_schedule(initial_ms: u32, max_ms: u32) -> Result<(), ParamError> {
    if initial_ms > max_ms {
        return Err(ParamError::InvalidSchedule { initial_ms, max_ms });
    }
    Ok(())
}

/// Shared, mutable engine parameters.
#[derive(Debug)]
pub struct ParameterStore {
    transmit_enabled: AtomicBool,
    receive_enabled: AtomicBool,
    default_interface: RwLock<InterfaceName>,
    transmit_interval_ms: AtomicU32,
    delay_threshold_ms: AtomicU32,
    initial_interval_ms: AtomicU32,
    increment_ms: AtomicU32,
    max_interval_ms: AtomicU32,
    /// Serializes schedule writers.
    schedule_writer: Mutex<()>,
}

impl Default for ParameterStore {
    fn default() -> Self {
        Self::from_values(Parameters::default())
    }
}

impl ParameterStore {
    /// Create a store with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store from explicit values.
    pub fn with_values(values: Parameters) -> Result<Self, ParamError> {
        values.validate()?;
        Ok(Self::from_values(values))
    }

    fn from_values(values: Parameters) -> Self {
        Self {
            transmit_enabled: AtomicBool::new(values.transmit_enabled),
            receive_enabled: AtomicBool::new(values.receive_enabled),
            default_interface: RwLock::new(values.default_interface),
            transmit_interval_ms: AtomicU32::new(values.transmit_interval_ms),
            delay_threshold_ms: AtomicU32::new(values.delay_threshold_ms),
            initial_interval_ms: AtomicU32::new(values.retransmit_initial_interval_ms),
            increment_ms: AtomicU32::new(values.retransmit_increment_ms),
            max_interval_ms: AtomicU32::new(values.retransmit_max_interval_ms),
            schedule_writer: Mutex::new(()),
        }
    }

    /// Whether outbound transmission is allowed.
    pub fn transmit_enabled(&self) -> bool {
        self.transmit_enabled.load(Ordering::Relaxed)
    }

    /// Allow or block outbound transmission.
    pub fn set_transmit_enabled(&self, enabled: bool) {
        self.transmit_enabled.store(enabled, Ordering::Relaxed);
    }

    /// Whether inbound frames are forwarded.
    pub fn receive_enabled(&self) -> bool {
        self.receive_enabled.load(Ordering::Relaxed)
    }

    /// Allow or block inbound forwarding.
    pub fn set_receive_enabled(&self, enabled: bool) {
        self.receive_enabled.store(enabled, Ordering::Relaxed);
    }

    /// Default egress interface name.
    pub fn default_interface(&self) -> InterfaceName {
        self.default_interface.read().clone()
    }

    /// Replace the default egress interface name.
    ///
    /// The name is stored whether or not a device with that name exists.
    pub fn set_default_interface(&self, name: InterfaceName) {
        *self.default_interface.write() = name;
    }

    /// Heartbeat interval (ms).
    pub fn transmit_interval_ms(&self) -> u32 {
        self.transmit_interval_ms.load(Ordering::Relaxed)
    }

    /// Set the heartbeat interval (ms).
    pub fn set_transmit_interval_ms(&self, value: u32) {
        self.transmit_interval_ms.store(value, Ordering::Relaxed);
    }

    /// Delivery delay threshold (ms).
    pub fn delay_threshold_ms(&self) -> u32 {
        self.delay_threshold_ms.load(Ordering::Relaxed)
    }

    /// Set the delivery delay threshold (ms).
    pub fn set_delay_threshold_ms(&self, value: u32) {
        self.delay_threshold_ms.store(value, Ordering::Relaxed);
    }

    /// Initial retransmission interval (ms).
    pub fn retransmit_initial_interval_ms(&self) -> u32 {
        self.initial_interval_ms.load(Ordering::Relaxed)
    }

    /// Set the initial retransmission interval. Rejected above the maximum.
    pub fn set_retransmit_initial_interval_ms(&self, value: u32) -> Result<(), ParamError> {
        let _guard = self.schedule_writer.lock();
        check_schedule(value, self.retransmit_max_interval_ms())?;
        self.initial_interval_ms.store(value, Ordering::Relaxed);
        Ok(())
    }

    /// Retransmission interval increment (ms).
    pub fn retransmit_increment_ms(&self) -> u32 {
        self.increment_ms.load(Ordering::Relaxed)
    }

    /// Set the retransmission interval increment (ms).
    pub fn set_retransmit_increment_ms(&self, value: u32) {
        self.increment_ms.store(value, Ordering::Relaxed);
    }

    /// Maximum retransmission interval (ms).
    pub fn retransmit_max_interval_ms(&self) -> u32 {
        self.max_interval_ms.load(Ordering::Relaxed)
    }

    /// Set the maximum retransmission interval. Rejected below the initial interval.
    pub fn set_retransmit_max_interval_ms(&self, value: u32) -> Result<(), ParamError> {
        let _guard = self.schedule_writer.lock();
        check_schedule(self.retransmit_initial_interval_ms(), value)?;
        self.max_interval_ms.store(value, Ordering::Relaxed);
        Ok(())
    }

    /// Apply a controller parameter update.
    ///
    /// Nothing is changed when `initial > max`. The default interface is only
    /// replaced when the update names one.
    pub fn apply(&self, update: &SetParameters) -> Result<(), ParamError> {
        check_schedule(update.initial_interval_ms, update.max_interval_ms)?;
        {
            let _guard = self.schedule_writer.lock();
            // Order the two stores so readers never observe initial > max.
            if update.max_interval_ms >= self.retransmit_initial_interval_ms() {
                self.max_interval_ms
                    .store(update.max_interval_ms, Ordering::Relaxed);
                self.initial_interval_ms
                    .store(update.initial_interval_ms, Ordering::Relaxed);
            } else {
                self.initial_interval_ms
                    .store(update.initial_interval_ms, Ordering::Relaxed);
                self.max_interval_ms
                    .store(update.max_interval_ms, Ordering::Relaxed);
            }
            self.increment_ms
                .store(update.increment_ms, Ordering::Relaxed);
        }
        self.set_delay_threshold_ms(update.delay_threshold_ms);
        if let Some(name) = &update.default_device {
            self.set_default_interface(name.clone());
        }
        debug!(
            threshold_ms = update.delay_threshold_ms,
            initial_ms = update.initial_interval_ms,
            max_ms = update.max_interval_ms,
            increment_ms = update.increment_ms,
            "retransmission parameters updated"
        );
        Ok(())
    }

    /// Copy of all current values.
    pub fn snapshot(&self) -> Parameters {
        Parameters {
            transmit_enabled: self.transmit_enabled(),
            receive_enabled: self.receive_enabled(),
            default_interface: self.default_interface(),
            transmit_interval_ms: self.transmit_interval_ms(),
            delay_threshold_ms: self.delay_threshold_ms(),
            retransmit_initial_interval_ms: self.retransmit_initial_interval_ms(),
            retransmit_increment_ms: self.retransmit_increment_ms(),
            retransmit_max_interval_ms: self.retransmit_max_interval_ms(),
        }
    }
}

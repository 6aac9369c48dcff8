//! Lifetime counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Counters shared by every transport component.
#[derive(Debug, Default)]
pub struct TransportStats {
    reliable_delivered: AtomicU64,
    reliable_abandoned: AtomicU64,
    frames_sent: AtomicU64,
    send_failures: AtomicU64,
    inbound_forwarded: AtomicU64,
    inbound_dropped: AtomicU64,
    inbound_malformed: AtomicU64,
    control_malformed: AtomicU64,
}

/// Point-in-time copy of [`TransportStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Reliable sessions that reached the delay threshold or retry ceiling.
    pub reliable_delivered: u64,
    /// Reliable sessions that ended on a send failure or shutdown.
    pub reliable_abandoned: u64,
    /// One-shot frames handed to a device.
    pub frames_sent: u64,
    /// Transmissions rejected by a device.
    pub send_failures: u64,
    /// Inbound frames forwarded to the controller.
    pub inbound_forwarded: u64,
    /// Inbound frames dropped for lack of a controller or channel space.
    pub inbound_dropped: u64,
    /// Inbound frames that failed to decode.
    pub inbound_malformed: u64,
    /// Control messages that failed to decode or carried an engine-only kind.
    pub control_malformed: u64,
}

macro_rules! counter {
    ($record:ident, $field:ident) => {
        #[doc = concat!("Increment `", stringify!($field), "`.")]
        pub fn $record(&self) {
            self.$field.fetch_add(1, Ordering::Relaxed);
        }
    };
}

impl TransportStats {
    /// Create zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    counter!(record_reliable_delivered, reliable_delivered);
    counter!(record_reliable_abandoned, reliable_abandoned);
    counter!(record_frame_sent, frames_sent);
    counter!(record_send_failure, send_failures);
    counter!(record_inbound_forwarded, inbound_forwarded);
    counter!(record_inbound_dropped, inbound_dropped);
    counter!(record_inbound_malformed, inbound_malformed);
    counter!(record_control_malformed, control_malformed);

    /// Reliable sessions completed so far.
    pub fn reliable_delivered(&self) -> u64 {
        self.reliable_delivered.load(Ordering::Relaxed)
    }

    /// Copy all counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            reliable_delivered: self.reliable_delivered(),
            reliable_abandoned: self.reliable_abandoned.load(Ordering::Relaxed),
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            send_failures: self.send_failures.load(Ordering::Relaxed),
            inbound_forwarded: self.inbound_forwarded.load(Ordering::Relaxed),
            inbound_dropped: self.inbound_dropped.load(Ordering::Relaxed),
            inbound_malformed: self.inbound_malformed.load(Ordering::Relaxed),
            control_malformed: self.control_malformed.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_and_snapshot() {
        let stats = TransportStats::new();
        stats.record_reliable_delivered();
        stats.record_reliable_delivered();
        stats.record_inbound_dropped();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.reliable_delivered, 2);
        assert_eq!(snapshot.inbound_dropped, 1);
        assert_eq!(snapshot.frames_sent, 0);
        assert_eq!(stats.reliable_delivered(), 2);
    }
}

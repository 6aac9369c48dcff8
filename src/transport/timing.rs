//! Timers and retransmission interval arithmetic.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::watch;

/// Waits used by retransmission sessions.
///
/// Each call is an independent wait; sessions never share a timer entry.
#[async_trait]
pub trait Timer: Send + Sync {
    /// Suspend for `duration`.
    async fn sleep(&self, duration: Duration);
}

/// Timer backed by the tokio clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioTimer;

#[async_trait]
impl Timer for TokioTimer {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Timer that records every requested wait and returns immediately.
///
/// Makes schedule behavior observable without real time passing.
#[derive(Debug, Clone, Default)]
pub struct RecordingTimer {
    waits: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingTimer {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits requested so far.
    pub fn waits(&self) -> Vec<Duration> {
        self.waits.lock().clone()
    }

    /// Waits requested so far, in whole milliseconds.
    pub fn waits_ms(&self) -> Vec<u64> {
        self.waits.lock().iter().map(|d| d.as_millis() as u64).collect()
    }
}

#[async_trait]
impl Timer for RecordingTimer {
    async fn sleep(&self, duration: Duration) {
        self.waits.lock().push(duration);
        tokio::task::yield_now().await;
    }
}

/// Resolve once `shutdown` carries `true` or its sender is gone.
pub async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

/// Next retransmission interval: grow by `increment_ms`, capped at `max_ms`.
pub fn next_interval(current_ms: u32, increment_ms: u32, max_ms: u32) -> u32 {
    current_ms.saturating_add(increment_ms).min(max_ms)
}

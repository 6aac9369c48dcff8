//! Reliable delivery by stepped-interval retransmission.
//!
//! GOOSE has no acknowledgments. A reliable send transmits the same frame
//! repeatedly, waiting a growing interval between copies, until the
//! accumulated wait reaches the delivery delay threshold or the retry
//! ceiling is hit.
//!
//! ```text
//!   Idle ──▶ Sending ──ok──▶ WaitingForInterval ──▶ Sending ...
//!               │                    │
//!              err            elapsed >= threshold
//!               │             or retries >= 32
//!               ▼                    ▼
//!        Terminated(Failed)   Terminated(Delivered)
//! ```
//!
//! Shutdown ends a session at its next wait with `Cancelled`.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use bytes::Bytes;
use tokio::runtime::Handle;
use tokio::sync::{Notify, watch};
use tracing::{debug, trace, warn};

use super::device::NetDevice;
use super::error::{TransportError, TransportResult};
use super::stats::TransportStats;
use super::timing::{Timer, next_interval, shutdown_requested};
use crate::core::{MAX_ATTEMPTS, MacAddress};
use crate::params::ParameterStore;
use crate::wire::{DeliveryOutcome, DeliveryReport};

/// Receives the report of every finished reliable session.
pub trait ReportSink: Send + Sync {
    /// Must not block.
    fn report(&self, report: DeliveryReport);
}

/// Session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created, nothing sent.
    Idle,
    /// A copy is due.
    Sending,
    /// Waiting `current_interval_ms` before the next copy.
    WaitingForInterval,
    /// Finished.
    Terminated(DeliveryOutcome),
}

/// Schedule values read from the parameter store at each step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    /// Interval growth per retransmission (ms).
    pub increment_ms: u32,
    /// Interval ceiling (ms).
    pub max_interval_ms: u32,
    /// Delivery delay threshold (ms).
    pub delay_threshold_ms: u32,
}

impl Schedule {
    /// Read the current values.
    pub fn sample(params: &ParameterStore) -> Self {
        Self {
            increment_ms: params.retransmit_increment_ms(),
            max_interval_ms: params.retransmit_max_interval_ms(),
            delay_threshold_ms: params.delay_threshold_ms(),
        }
    }
}

/// State of one reliable send.
#[derive(Debug, Clone)]
pub struct RetransmitSession {
    state: SessionState,
    current_interval_ms: u32,
    elapsed_ms: u32,
    retries: u32,
    transmissions: u32,
    app_id: u16,
    destination: MacAddress,
}

impl RetransmitSession {
    /// Create an idle session starting at `initial_interval_ms`.
    pub fn new(initial_interval_ms: u32, app_id: u16, destination: MacAddress) -> Self {
        Self {
            state: SessionState::Idle,
            current_interval_ms: initial_interval_ms,
            elapsed_ms: 0,
            retries: 0,
            transmissions: 0,
            app_id,
            destination,
        }
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Wait before the next copy.
    pub fn current_interval(&self) -> Duration {
        Duration::from_millis(u64::from(self.current_interval_ms))
    }

    /// Accumulated wait (ms).
    pub fn elapsed_ms(&self) -> u32 {
        self.elapsed_ms
    }

    /// Retransmissions after the first copy.
    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// Copies handed to the device successfully.
    pub fn transmissions(&self) -> u32 {
        self.transmissions
    }

    /// Move from `Idle` to `Sending`.
    pub fn start(&mut self) -> SessionState {
        if self.state == SessionState::Idle {
            self.state = SessionState::Sending;
        }
        self.state
    }

    /// Record the result of a transmission.
    pub fn on_transmit(&mut self, sent: bool) -> SessionState {
        if self.state != SessionState::Sending {
            return self.state;
        }
        self.state = if sent {
            self.transmissions += 1;
            SessionState::WaitingForInterval
        } else {
            SessionState::Terminated(DeliveryOutcome::Failed)
        };
        self.state
    }

    /// Record that the current wait finished.
    pub fn on_wait_complete(&mut self, schedule: Schedule) -> SessionState {
        if self.state != SessionState::WaitingForInterval {
            return self.state;
        }
        self.elapsed_ms = self.elapsed_ms.saturating_add(self.current_interval_ms);
        self.current_interval_ms = next_interval(
            self.current_interval_ms,
            schedule.increment_ms,
            schedule.max_interval_ms,
        );

        self.state = if self.elapsed_ms >= schedule.delay_threshold_ms || self.retries >= MAX_ATTEMPTS
        {
            SessionState::Terminated(DeliveryOutcome::Delivered)
        } else {
            self.retries += 1;
            SessionState::Sending
        };
        self.state
    }

    /// Stop the session unless it already finished.
    pub fn cancel(&mut self) -> SessionState {
        if !matches!(self.state, SessionState::Terminated(_)) {
            self.state = SessionState::Terminated(DeliveryOutcome::Cancelled);
        }
        self.state
    }

    /// Completion report. `None` while the session is running.
    pub fn report(&self) -> Option<DeliveryReport> {
        match self.state {
            SessionState::Terminated(outcome) => Some(self.report_for(outcome)),
            _ => None,
        }
    }

    fn report_for(&self, outcome: DeliveryOutcome) -> DeliveryReport {
        DeliveryReport {
            outcome,
            attempts: self.transmissions,
            elapsed_ms: self.elapsed_ms,
            app_id: self.app_id,
            destination: self.destination,
        }
    }
}

#[derive(Debug, Default)]
struct SessionTracker {
    active: AtomicUsize,
    idle: Notify,
}

struct SessionGuard(Arc<SessionTracker>);

impl SessionGuard {
    fn enter(tracker: &Arc<SessionTracker>) -> Self {
        tracker.active.fetch_add(1, Ordering::AcqRel);
        Self(Arc::clone(tracker))
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if self.0.active.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

/// Spawns and tracks retransmission sessions.
pub struct RetransmitEngine {
    params: Arc<ParameterStore>,
    timer: Arc<dyn Timer>,
    reports: Arc<dyn ReportSink>,
    stats: Arc<TransportStats>,
    shutdown: watch::Receiver<bool>,
    sessions: Arc<SessionTracker>,
    runtime: Handle,
}

impl RetransmitEngine {
    /// Create an engine that spawns sessions on `runtime`.
    pub fn new(
        params: Arc<ParameterStore>,
        timer: Arc<dyn Timer>,
        reports: Arc<dyn ReportSink>,
        stats: Arc<TransportStats>,
        shutdown: watch::Receiver<bool>,
        runtime: Handle,
    ) -> Self {
        Self {
            params,
            timer,
            reports,
            stats,
            shutdown,
            sessions: Arc::default(),
            runtime,
        }
    }

    /// Start a session for an encoded Ethernet frame.
    ///
    /// Returns once the session is spawned; the outcome arrives at the
    /// report sink.
    pub fn start(
        &self,
        device: Arc<dyn NetDevice>,
        frame: Bytes,
        app_id: u16,
        destination: MacAddress,
    ) -> TransportResult<()> {
        if *self.shutdown.borrow() {
            return Err(TransportError::EngineStopped);
        }

        let session = RetransmitSession::new(
            self.params.retransmit_initial_interval_ms(),
            app_id,
            destination,
        );
        let guard = SessionGuard::enter(&self.sessions);
        let params = Arc::clone(&self.params);
        let timer = Arc::clone(&self.timer);
        let reports = Arc::clone(&self.reports);
        let stats = Arc::clone(&self.stats);
        let shutdown = self.shutdown.clone();

        debug!(device = %device.name(), app_id, %destination, "reliable session started");
        self.runtime.spawn(async move {
            let _guard = guard;
            let report = drive(session, device, frame, params, timer, shutdown).await;
            match report.outcome {
                DeliveryOutcome::Delivered => stats.record_reliable_delivered(),
                DeliveryOutcome::Failed => {
                    stats.record_send_failure();
                    stats.record_reliable_abandoned();
                }
                DeliveryOutcome::Cancelled => stats.record_reliable_abandoned(),
            }
            debug!(
                outcome = ?report.outcome,
                attempts = report.attempts,
                elapsed_ms = report.elapsed_ms,
                "reliable session finished"
            );
            reports.report(report);
        });
        Ok(())
    }

    /// Sessions currently running.
    pub fn active_sessions(&self) -> usize {
        self.sessions.active.load(Ordering::Acquire)
    }

    /// Wait until no session is running.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.sessions.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.active_sessions() == 0 {
                return;
            }
            notified.await;
        }
    }
}

impl std::fmt::Debug for RetransmitEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetransmitEngine")
            .field("active_sessions", &self.active_sessions())
            .field("stopped", &*self.shutdown.borrow())
            .finish()
    }
}

async fn drive(
    mut session: RetransmitSession,
    device: Arc<dyn NetDevice>,
    frame: Bytes,
    params: Arc<ParameterStore>,
    timer: Arc<dyn Timer>,
    mut shutdown: watch::Receiver<bool>,
) -> DeliveryReport {
    loop {
        match session.state() {
            SessionState::Idle => {
                session.start();
            }
            SessionState::Sending => {
                let sent = match device.transmit(&frame) {
                    Ok(()) => true,
                    Err(e) => {
                        warn!(device = %device.name(), error = %e, "reliable transmission failed");
                        false
                    }
                };
                session.on_transmit(sent);
                trace!(retries = session.retries(), "copy transmitted");
            }
            SessionState::WaitingForInterval => {
                tokio::select! {
                    biased;
                    _ = shutdown_requested(&mut shutdown) => {
                        session.cancel();
                    }
                    _ = timer.sleep(session.current_interval()) => {
                        session.on_wait_complete(Schedule::sample(&params));
                    }
                }
            }
            SessionState::Terminated(outcome) => return session.report_for(outcome),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::InterfaceName;
    use crate::transport::error::DeviceError;
    use crate::transport::timing::RecordingTimer;
    use crate::wire::SetParameters;
    use parking_lot::Mutex;
    use std::sync::atomic::AtomicU32;
    use tokio::sync::mpsc;

    const PEER: MacAddress = MacAddress::new([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);

    /// Device that counts copies and fails from the `fail_from`th on.
    #[derive(Debug)]
    struct CountingDevice {
        name: InterfaceName,
        sent: AtomicU32,
        fail_from: u32,
    }

    impl CountingDevice {
        fn new(fail_from: u32) -> Arc<Self> {
            Arc::new(Self {
                name: InterfaceName::new("eth0").unwrap(),
                sent: AtomicU32::new(0),
                fail_from,
            })
        }
    }

    impl NetDevice for CountingDevice {
        fn name(&self) -> &InterfaceName {
            &self.name
        }

        fn hw_addr(&self) -> MacAddress {
            MacAddress::ZERO
        }

        fn transmit(&self, _frame: &[u8]) -> Result<(), DeviceError> {
            let n = self.sent.fetch_add(1, Ordering::SeqCst) + 1;
            if n >= self.fail_from {
                return Err(DeviceError::LinkDown(self.name.clone()));
            }
            Ok(())
        }
    }

    struct ChannelSink(mpsc::UnboundedSender<DeliveryReport>);

    impl ReportSink for ChannelSink {
        fn report(&self, report: DeliveryReport) {
            let _ = self.0.send(report);
        }
    }

    struct Harness {
        engine: RetransmitEngine,
        timer: RecordingTimer,
        stats: Arc<TransportStats>,
        params: Arc<ParameterStore>,
        reports: mpsc::UnboundedReceiver<DeliveryReport>,
        stop: watch::Sender<bool>,
    }

    fn harness() -> Harness {
        let params = Arc::new(ParameterStore::new());
        let timer = RecordingTimer::new();
        let stats = Arc::new(TransportStats::new());
        let (tx, reports) = mpsc::unbounded_channel();
        let (stop, shutdown) = watch::channel(false);
        let engine = RetransmitEngine::new(
            Arc::clone(&params),
            Arc::new(timer.clone()),
            Arc::new(ChannelSink(tx)),
            Arc::clone(&stats),
            shutdown,
            Handle::current(),
        );
        Harness {
            engine,
            timer,
            stats,
            params,
            reports,
            stop,
        }
    }

    fn schedule(increment_ms: u32, max_interval_ms: u32, delay_threshold_ms: u32) -> Schedule {
        Schedule {
            increment_ms,
            max_interval_ms,
            delay_threshold_ms,
        }
    }

    /// Run a session to completion against a fixed schedule.
    fn simulate(initial: u32, schedule: Schedule, fail_at: Option<u32>) -> (RetransmitSession, Vec<u32>) {
        let mut session = RetransmitSession::new(initial, 1, PEER);
        let mut waits = Vec::new();
        session.start();
        let mut copies = 0;
        loop {
            match session.state() {
                SessionState::Sending => {
                    copies += 1;
                    session.on_transmit(fail_at != Some(copies));
                }
                SessionState::WaitingForInterval => {
                    waits.push(session.current_interval_ms);
                    session.on_wait_complete(schedule);
                }
                SessionState::Terminated(_) => return (session, waits),
                SessionState::Idle => unreachable!(),
            }
        }
    }

    #[test]
    fn test_default_schedule_sends_five_copies() {
        let (session, waits) = simulate(10, schedule(0, 10, 50), None);
        assert_eq!(waits, vec![10; 5]);
        let report = session.report().unwrap();
        assert_eq!(report.outcome, DeliveryOutcome::Delivered);
        assert_eq!(report.attempts, 5);
        assert_eq!(report.elapsed_ms, 50);
        assert_eq!(session.retries(), 4);
    }

    #[test]
    fn test_growing_schedule() {
        let (session, waits) = simulate(10, schedule(20, 50, 150), None);
        assert_eq!(waits, vec![10, 30, 50, 50, 50]);
        assert_eq!(session.report().unwrap().elapsed_ms, 190);
    }

    #[test]
    fn test_retry_ceiling() {
        let (session, waits) = simulate(0, schedule(0, 0, 1), None);
        assert_eq!(waits.len(), 33);
        assert_eq!(session.retries(), MAX_ATTEMPTS);
        assert_eq!(session.report().unwrap().attempts, 33);
        assert_eq!(
            session.report().unwrap().outcome,
            DeliveryOutcome::Delivered
        );
    }

    #[test]
    fn test_first_attempt_failure() {
        let (session, waits) = simulate(10, schedule(0, 10, 50), Some(1));
        assert!(waits.is_empty());
        assert_eq!(session.retries(), 0);
        let report = session.report().unwrap();
        assert_eq!(report.outcome, DeliveryOutcome::Failed);
        assert_eq!(report.attempts, 0);
    }

    #[test]
    fn test_cancel_and_transitions_after_termination() {
        let mut session = RetransmitSession::new(10, 1, PEER);
        assert!(session.report().is_none());
        session.start();
        session.on_transmit(true);
        assert_eq!(
            session.cancel(),
            SessionState::Terminated(DeliveryOutcome::Cancelled)
        );
        // Terminal state is sticky.
        assert_eq!(
            session.on_wait_complete(schedule(0, 10, 50)),
            SessionState::Terminated(DeliveryOutcome::Cancelled)
        );
        assert_eq!(
            session.on_transmit(true),
            SessionState::Terminated(DeliveryOutcome::Cancelled)
        );
    }

    #[tokio::test]
    async fn test_engine_runs_session_with_recording_timer() {
        let mut h = harness();
        let device = CountingDevice::new(u32::MAX);
        h.engine
            .start(device.clone(), Bytes::from_static(b"frame"), 7, PEER)
            .unwrap();

        let report = h.reports.recv().await.unwrap();
        assert_eq!(report.outcome, DeliveryOutcome::Delivered);
        assert_eq!(report.attempts, 5);
        assert_eq!(report.app_id, 7);
        assert_eq!(report.destination, PEER);
        assert_eq!(device.sent.load(Ordering::SeqCst), 5);
        assert_eq!(h.timer.waits_ms(), vec![10; 5]);

        h.engine.wait_idle().await;
        assert_eq!(h.engine.active_sessions(), 0);
        assert_eq!(h.stats.reliable_delivered(), 1);
    }

    #[tokio::test]
    async fn test_parameters_sampled_per_step() {
        let mut h = harness();
        h.params
            .apply(&SetParameters {
                delay_threshold_ms: 100,
                initial_interval_ms: 10,
                max_interval_ms: 40,
                increment_ms: 15,
                default_device: None,
            })
            .unwrap();

        h.engine
            .start(CountingDevice::new(u32::MAX), Bytes::from_static(b"f"), 1, PEER)
            .unwrap();
        let report = h.reports.recv().await.unwrap();
        // 10, 25, 40, 40 => 115ms after four waits
        assert_eq!(h.timer.waits_ms(), vec![10, 25, 40, 40]);
        assert_eq!(report.elapsed_ms, 115);
        assert_eq!(report.attempts, 4);
    }

    #[tokio::test]
    async fn test_engine_mid_session_failure() {
        let mut h = harness();
        h.engine
            .start(CountingDevice::new(3), Bytes::from_static(b"f"), 1, PEER)
            .unwrap();
        let report = h.reports.recv().await.unwrap();
        assert_eq!(report.outcome, DeliveryOutcome::Failed);
        assert_eq!(report.attempts, 2);

        let stats = h.stats.snapshot();
        assert_eq!(stats.reliable_delivered, 0);
        assert_eq!(stats.reliable_abandoned, 1);
        assert_eq!(stats.send_failures, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_and_rejects() {
        let params = Arc::new(ParameterStore::new());
        params.set_delay_threshold_ms(10_000);
        let stats = Arc::new(TransportStats::new());
        let (tx, mut reports) = mpsc::unbounded_channel();
        let (stop, shutdown) = watch::channel(false);
        let engine = RetransmitEngine::new(
            params,
            Arc::new(crate::transport::timing::TokioTimer),
            Arc::new(ChannelSink(tx)),
            Arc::clone(&stats),
            shutdown,
            Handle::current(),
        );

        engine
            .start(CountingDevice::new(u32::MAX), Bytes::from_static(b"f"), 1, PEER)
            .unwrap();
        tokio::time::sleep(Duration::from_millis(25)).await;
        assert_eq!(engine.active_sessions(), 1);

        stop.send(true).unwrap();
        let report = reports.recv().await.unwrap();
        assert_eq!(report.outcome, DeliveryOutcome::Cancelled);
        engine.wait_idle().await;
        assert_eq!(stats.snapshot().reliable_abandoned, 1);

        assert!(matches!(
            engine.start(CountingDevice::new(u32::MAX), Bytes::new(), 1, PEER),
            Err(TransportError::EngineStopped)
        ));
    }

    #[tokio::test]
    async fn test_sessions_are_independent() {
        let mut h = harness();
        for app_id in 0..3 {
            h.engine
                .start(CountingDevice::new(u32::MAX), Bytes::from_static(b"f"), app_id, PEER)
                .unwrap();
        }
        let mut seen = Vec::new();
        for _ in 0..3 {
            seen.push(h.reports.recv().await.unwrap().app_id);
        }
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1, 2]);
        assert_eq!(h.timer.waits().len(), 15);
        h.stop.send(true).unwrap();
    }

    #[derive(Default)]
    struct Collect(Mutex<Vec<DeliveryReport>>);

    impl ReportSink for Collect {
        fn report(&self, report: DeliveryReport) {
            self.0.lock().push(report);
        }
    }

    #[tokio::test]
    async fn test_wait_idle_without_sessions() {
        let (_stop, shutdown) = watch::channel(false);
        let engine = RetransmitEngine::new(
            Arc::new(ParameterStore::new()),
            Arc::new(RecordingTimer::new()),
            Arc::new(Collect::default()),
            Arc::new(TransportStats::new()),
            shutdown,
            Handle::current(),
        );
        engine.wait_idle().await;
        assert_eq!(engine.active_sessions(), 0);
    }
}

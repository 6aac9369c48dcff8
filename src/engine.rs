//! The assembled GOOSE transport engine.
//!
//! [`GooseEngine`] wires the parameter store, router, retransmission engine,
//! receive path, controller slot and configuration interface together and
//! owns their shared shutdown signal.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use goose_transport::prelude::*;
//!
//! let segment = Arc::new(MemorySegment::new());
//! segment.attach("eth0".parse()?, MacAddress::new([2, 0, 0, 0, 0, 1]));
//!
//! let channel = Arc::new(MemoryChannel::new());
//! let engine = GooseEngineBuilder::new()
//!     .segment(segment)
//!     .control_sink(channel)
//!     .delay_threshold_ms(100)
//!     .build()?;
//!
//! engine.shutdown().await;
//! ```

use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::info;

use crate::control::{
    ConfigInterface, ControlSink, ControllerSlot, DispatchError, Dispatcher,
    EndpointId, MemoryChannel, MessageClass,
};
use crate::core::{ETH_P_GOOSE, InterfaceName, ParamError};
use crate::params::{ParameterStore, Parameters};
use crate::transport::{
    DeliveryRequest, DeviceRegistry, FrameSource, ReceivePath, RetransmitEngine, Router, Timer,
    TokioTimer, TransportResult, TransportStats,
};

/// Errors from assembling an engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Initial parameters are inconsistent.
    #[error("invalid parameters: {0}")]
    Param(#[from] ParamError),

    /// No device registry was supplied.
    #[error("no device registry configured")]
    NoRegistry,

    /// Not called from within a tokio runtime.
    #[error("engine must be built inside a tokio runtime")]
    NoRuntime,
}

/// Engine configuration.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    /// Initial parameter values.
    pub parameters: Parameters,
}

/// Builder for [`GooseEngine`].
pub struct GooseEngineBuilder {
    config: EngineConfig,
    registry: Option<Arc<dyn DeviceRegistry>>,
    frame_source: Option<Arc<dyn FrameSource>>,
    control_sink: Option<Arc<dyn ControlSink>>,
    timer: Arc<dyn Timer>,
}

impl GooseEngineBuilder {
    /// Create a builder with default parameters.
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
            registry: None,
            frame_source: None,
            control_sink: None,
            timer: Arc::new(TokioTimer),
        }
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the default egress interface.
    pub fn default_interface(mut self, name: InterfaceName) -> Self {
        self.config.parameters.default_interface = name;
        self
    }

    /// Set the heartbeat interval.
    pub fn transmit_interval_ms(mut self, ms: u32) -> Self {
        self.config.parameters.transmit_interval_ms = ms;
        self
    }

    /// Set the delivery delay threshold.
    pub fn delay_threshold_ms(mut self, ms: u32) -> Self {
        self.config.parameters.delay_threshold_ms = ms;
        self
    }

    /// Set the retransmission schedule.
    pub fn retransmit_schedule(mut self, initial_ms: u32, increment_ms: u32, max_ms: u32) -> Self {
        let p = &mut self.config.parameters;
        p.retransmit_initial_interval_ms = initial_ms;
        p.retransmit_increment_ms = increment_ms;
        p.retransmit_max_interval_ms = max_ms;
        self
    }

    /// Enable or disable outbound transmission.
    pub fn transmit_enabled(mut self, enabled: bool) -> Self {
        self.config.parameters.transmit_enabled = enabled;
        self
    }

    /// Enable or disable inbound forwarding.
    pub fn receive_enabled(mut self, enabled: bool) -> Self {
        self.config.parameters.receive_enabled = enabled;
        self
    }

    /// Set the device registry.
    pub fn registry(mut self, registry: Arc<dyn DeviceRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Set the source of inbound frames.
    pub fn frame_source(mut self, source: Arc<dyn FrameSource>) -> Self {
        self.frame_source = Some(source);
        self
    }

    /// Use one object as both device registry and frame source.
    pub fn segment<S>(mut self, segment: Arc<S>) -> Self
    where
        S: DeviceRegistry + FrameSource + 'static,
    {
        let registry: Arc<dyn DeviceRegistry> = segment.clone();
        let source: Arc<dyn FrameSource> = segment;
        self.registry = Some(registry);
        self.frame_source = Some(source);
        self
    }

    /// Set the sink used to reach the controller.
    pub fn control_sink(mut self, sink: Arc<dyn ControlSink>) -> Self {
        self.control_sink = Some(sink);
        self
    }

    /// Set the timer used by retransmission sessions.
    pub fn timer(mut self, timer: Arc<dyn Timer>) -> Self {
        self.timer = timer;
        self
    }

    /// Assemble the engine and start receiving.
    ///
    /// Must be called inside a tokio runtime; sessions are spawned on it.
    pub fn build(self) -> Result<GooseEngine, EngineError> {
        let runtime = Handle::try_current().map_err(|_| EngineError::NoRuntime)?;
        let registry = self.registry.ok_or(EngineError::NoRegistry)?;
        let params = Arc::new(ParameterStore::with_values(self.config.parameters)?);
        let stats = Arc::new(TransportStats::new());
        let sink = self
            .control_sink
            .unwrap_or_else(|| Arc::new(MemoryChannel::new()));
        let slot = Arc::new(ControllerSlot::new(sink));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let reliable = RetransmitEngine::new(
            Arc::clone(&params),
            self.timer,
            slot.clone(),
            Arc::clone(&stats),
            shutdown_rx,
            runtime,
        );
        let router = Arc::new(Router::new(
            Arc::clone(&params),
            Arc::clone(&registry),
            reliable,
            Arc::clone(&stats),
        ));
        let dispatcher = Arc::new(Dispatcher::new(
            Arc::clone(&params),
            Arc::clone(&router),
            Arc::clone(&slot),
            Arc::clone(&registry),
            Arc::clone(&stats),
        ));
        let receive = Arc::new(ReceivePath::new(
            Arc::clone(&params),
            slot.clone(),
            Arc::clone(&stats),
        ));
        if let Some(source) = &self.frame_source {
            source.register(ETH_P_GOOSE, receive.clone());
        }
        let config = ConfigInterface::new(Arc::clone(&params), registry, Arc::clone(&stats));

        info!(
            default_device = %params.default_interface(),
            receiving = self.frame_source.is_some(),
            "goose engine started"
        );
        Ok(GooseEngine {
            params,
            stats,
            router,
            dispatcher,
            slot,
            receive,
            config,
            frame_source: self.frame_source,
            shutdown: shutdown_tx,
        })
    }
}

impl Default for GooseEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for GooseEngineBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GooseEngineBuilder")
            .field("config", &self.config)
            .field("has_registry", &self.registry.is_some())
            .field("has_frame_source", &self.frame_source.is_some())
            .finish()
    }
}

/// A running GOOSE transport engine.
pub struct GooseEngine {
    params: Arc<ParameterStore>,
    stats: Arc<TransportStats>,
    router: Arc<Router>,
    dispatcher: Arc<Dispatcher>,
    slot: Arc<ControllerSlot>,
    receive: Arc<ReceivePath>,
    config: ConfigInterface,
    frame_source: Option<Arc<dyn FrameSource>>,
    shutdown: watch::Sender<bool>,
}

impl GooseEngine {
    /// Shorthand for [`GooseEngineBuilder::new`].
    pub fn builder() -> GooseEngineBuilder {
        GooseEngineBuilder::new()
    }

    /// Shared parameters.
    pub fn params(&self) -> &Arc<ParameterStore> {
        &self.params
    }

    /// Lifetime counters.
    pub fn stats(&self) -> &Arc<TransportStats> {
        &self.stats
    }

    /// Egress router.
    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    /// Control message dispatcher.
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Registered controller.
    pub fn controller_slot(&self) -> &Arc<ControllerSlot> {
        &self.slot
    }

    /// Inbound path, for hosts that deliver frames without a [`FrameSource`].
    pub fn receive_path(&self) -> &Arc<ReceivePath> {
        &self.receive
    }

    /// Key-value configuration interface.
    pub fn config(&self) -> &ConfigInterface {
        &self.config
    }

    /// Handle one raw control message from `from`.
    pub fn handle_control(
        &self,
        from: &EndpointId,
        raw: &[u8],
    ) -> Result<MessageClass, DispatchError> {
        self.dispatcher.handle(from, raw)
    }

    /// Send a frame directly, bypassing the control channel.
    pub fn send(&self, request: DeliveryRequest) -> TransportResult<()> {
        self.router.send(request)
    }

    /// Receiver that turns true when the engine shuts down.
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }

    /// Whether [`shutdown`](Self::shutdown) has been called.
    pub fn is_shut_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Stop the engine.
    ///
    /// Disables both directions, stops receiving, signals every reliable
    /// session to stop at its next wait, then waits for them to finish.
    pub async fn shutdown(&self) {
        self.params.set_transmit_enabled(false);
        self.params.set_receive_enabled(false);
        if let Some(source) = &self.frame_source {
            source.unregister(ETH_P_GOOSE);
        }
        self.shutdown.send_replace(true);
        self.router.reliable().wait_idle().await;
        info!(stats = ?self.stats.snapshot(), "goose engine stopped");
    }
}

impl fmt::Debug for GooseEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GooseEngine")
            .field("params", &self.params.snapshot())
            .field("router", &self.router)
            .field("slot", &self.slot)
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}

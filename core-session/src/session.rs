//! # Session Coordinator
//!
//! Owns the lifecycle of one streaming engine instance and wires its
//! events into the supervising components. Every reconnect discards the
//! engine instance and creates a fresh one from the same media source; the
//! coordinator guarantees that no timer, task or subscription belonging to
//! a previous instance survives a `load()` or `destroy()`.
//!
//! ## Epoch discipline
//!
//! Each engine instance is tagged with a session epoch. The event pump
//! forwards events tagged with its own epoch, and [`SessionCoordinator::dispatch`]
//! discards anything stale. Teardown bumps the epoch before releasing the
//! engine, so a late callback from a dying instance can never mutate the
//! state of its successor.

use crate::accel::AccelProbeAdapter;
use crate::config::SessionConfig;
use crate::error::{Result, SessionError};
use crate::latency::LatencyGovernor;
use crate::profiles::base_engine_config;
use crate::quality::QualityMonitor;
use crate::supervisor::{ConnectionPhase, ConnectionSupervisor, SessionCommand};
use bridge_traits::engine::{
    EngineEvent, EngineFactory, FaultInfo, FaultKind, MediaSource, StreamingEngine,
};
use bridge_traits::probe::{AccelerationReport, CapabilityProbe, ProbeRequest};
use bridge_traits::surface::{PlaybackSignal, RenderSurface};
use bridge_traits::time::Clock;
use core_runtime::events::{CoreEvent, EventBus, LatencyLevel, QualityLevel, SessionEvent};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Instant;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// External collaborators injected into the coordinator.
pub struct CoordinatorDeps {
    /// Creates one engine instance per connection attempt.
    pub factory: Arc<dyn EngineFactory>,
    /// Where decoded media lands; read-only for this layer.
    pub surface: Arc<dyn RenderSurface>,
    /// Hardware-acceleration fact source.
    pub probe: Arc<dyn CapabilityProbe>,
    /// Time source, injectable for deterministic tests.
    pub clock: Arc<dyn Clock>,
}

struct ActiveSession {
    engine: Arc<dyn StreamingEngine>,
    source: MediaSource,
    started_at: Instant,
    cancel: CancellationToken,
    pump: JoinHandle<()>,
}

/// Coordinates one playback session across engine recreations.
pub struct SessionCoordinator {
    events: EventBus,
    factory: Arc<dyn EngineFactory>,
    surface: Arc<dyn RenderSurface>,
    supervisor: Arc<ConnectionSupervisor>,
    quality: Arc<QualityMonitor>,
    latency: Arc<LatencyGovernor>,
    accel: Arc<AccelProbeAdapter>,
    epoch: AtomicU64,
    active: tokio::sync::Mutex<Option<ActiveSession>>,
    weak: Weak<SessionCoordinator>,
}

impl SessionCoordinator {
    /// Builds the component graph and starts the command loop.
    ///
    /// Runs initial acceleration detection so the first engine instance is
    /// already tuned to the host.
    ///
    /// # Errors
    ///
    /// Fails when the configuration does not validate.
    pub fn new(config: SessionConfig, deps: CoordinatorDeps, events: EventBus) -> Result<Arc<Self>> {
        config.validate().map_err(SessionError::InvalidConfig)?;

        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let supervisor = ConnectionSupervisor::new(&config, events.clone(), commands_tx);
        let latency = LatencyGovernor::new(config.latency.clone(), events.clone(), deps.clock.clone());
        let quality = QualityMonitor::new(
            config.quality.clone(),
            events.clone(),
            deps.clock,
            supervisor.clone(),
            latency.clone(),
        );
        let accel = AccelProbeAdapter::new(deps.probe, events.clone());
        accel.detect(&ProbeRequest::default());

        let coordinator = Arc::new_cyclic(|weak| Self {
            events,
            factory: deps.factory,
            surface: deps.surface,
            supervisor,
            quality,
            latency,
            accel,
            epoch: AtomicU64::new(0),
            active: tokio::sync::Mutex::new(None),
            weak: weak.clone(),
        });
        coordinator.spawn_command_loop(commands_rx);
        Ok(coordinator)
    }

    /// Loads a media source, tearing down any current session first.
    ///
    /// Resets the retry budget and the classification levels: a
    /// caller-issued load is a fresh start, unlike the internal reconnect
    /// path. Loading the URL of an already connected session is a no-op.
    pub async fn load(&self, source: MediaSource) -> Result<()> {
        if self.supervisor.is_connected() {
            let active = self.active.lock().await;
            if let Some(session) = active.as_ref() {
                if session.source.url == source.url {
                    debug!(url = %source.url, "already connected to this source, ignoring load");
                    return Ok(());
                }
            }
        }

        self.supervisor.reset();
        self.quality.reset();
        self.latency.reset();
        self.start_session(source).await
    }

    /// Destroys the current session, releasing the engine and stopping
    /// every child timer. Safe to call with no session active.
    pub async fn destroy(&self) {
        self.teardown_current().await;
        self.supervisor.reset();
        self.events
            .emit(CoreEvent::Session(SessionEvent::Destroyed))
            .ok();
    }

    /// Routes one engine event into the component graph.
    ///
    /// Events tagged with a stale epoch are discarded; they come from an
    /// instance that has already been torn down.
    pub fn dispatch(&self, epoch: u64, event: EngineEvent) {
        if epoch != self.epoch.load(Ordering::SeqCst) {
            trace!(epoch, "discarding event from a stale session epoch");
            return;
        }
        match event {
            EngineEvent::Telemetry(sample) => {
                self.supervisor.handle_telemetry(&sample);
                self.quality.update_history(sample);
            }
            EngineEvent::Fault(fault) => {
                warn!(%fault, "engine fault");
                self.supervisor.handle_fault(&fault);
            }
            EngineEvent::SessionInfo(metadata) => {
                debug!(?metadata, "session metadata updated");
            }
        }
    }

    /// The epoch of the current engine instance.
    pub fn current_epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Current connection phase.
    pub fn connection_phase(&self) -> ConnectionPhase {
        self.supervisor.phase()
    }

    /// The last acted-upon network quality level.
    pub fn quality_level(&self) -> QualityLevel {
        self.quality.quality_level()
    }

    /// The last acted-upon latency level.
    pub fn latency_level(&self) -> LatencyLevel {
        self.latency.current_level()
    }

    /// Stall events observed since the last resume signal.
    pub fn stall_count(&self) -> u32 {
        self.quality.stall_count()
    }

    /// Cached hardware-acceleration facts.
    pub fn hardware_acceleration_info(&self) -> Option<AccelerationReport> {
        self.accel.cached()
    }

    /// Re-runs acceleration detection with new forcing flags.
    ///
    /// The returned facts only affect engine configuration once the caller
    /// issues a fresh [`load`](Self::load).
    pub fn set_hardware_acceleration(&self, request: &ProbeRequest) -> AccelerationReport {
        self.accel.set_acceleration(request)
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    async fn start_session(&self, source: MediaSource) -> Result<()> {
        self.teardown_current().await;
        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;

        let mut engine_config = base_engine_config(&source);
        for (key, value) in self.accel.config_adjustments() {
            engine_config.insert(key, value);
        }

        let engine = self.factory.create(&source, &engine_config)?;
        if let Err(e) = engine.attach(self.surface.clone()).await {
            let _ = engine.destroy().await;
            return Err(e.into());
        }

        // subscribe before load so no early event is lost
        let events_rx = engine.subscribe();
        let signals_rx = self.surface.signals();
        let cancel = CancellationToken::new();
        let pump = self.spawn_pump(epoch, events_rx, signals_rx, cancel.clone());

        self.supervisor.connect();
        if let Err(e) = engine.load().await {
            cancel.cancel();
            self.supervisor.halt();
            let _ = engine.destroy().await;
            return Err(e.into());
        }

        self.quality.start(engine.clone(), self.surface.clone());
        self.latency.start(engine.clone(), self.surface.clone());

        info!(url = %source.url, epoch, "engine instance loaded");
        self.events
            .emit(CoreEvent::Session(SessionEvent::Loaded {
                url: source.url.clone(),
            }))
            .ok();

        *self.active.lock().await = Some(ActiveSession {
            engine,
            source,
            started_at: Instant::now(),
            cancel,
            pump,
        });
        Ok(())
    }

    /// Recreates the engine for the current source, keeping the retry
    /// budget intact. Classification levels restart from their most
    /// conservative values.
    async fn reload(&self) -> Result<()> {
        let source = {
            let active = self.active.lock().await;
            active.as_ref().map(|session| session.source.clone())
        };
        let Some(source) = source else {
            return Err(SessionError::NoActiveSession);
        };

        self.quality.reset();
        self.latency.reset();
        self.start_session(source).await
    }

    async fn teardown_current(&self) {
        let previous = self.active.lock().await.take();
        let Some(session) = previous else {
            return;
        };

        // fence: anything still tagged with the old epoch is now stale
        self.epoch.fetch_add(1, Ordering::SeqCst);
        session.cancel.cancel();
        self.quality.stop();
        self.latency.stop();
        self.supervisor.halt();

        if let Err(e) = session.engine.unload().await {
            warn!(error = %e, "engine unload failed during teardown");
        }
        if let Err(e) = session.engine.detach().await {
            warn!(error = %e, "engine detach failed during teardown");
        }
        if let Err(e) = session.engine.destroy().await {
            warn!(error = %e, "engine destroy failed during teardown");
        }
        let _ = session.pump.await;
        debug!(
            lived_ms = session.started_at.elapsed().as_millis() as u64,
            "session torn down"
        );
    }

    fn spawn_command_loop(&self, mut commands: mpsc::UnboundedReceiver<SessionCommand>) {
        let weak = self.weak.clone();
        tokio::spawn(async move {
            while let Some(command) = commands.recv().await {
                let Some(coordinator) = weak.upgrade() else {
                    break;
                };
                match command {
                    SessionCommand::Retry => {
                        if let Err(e) = coordinator.reload().await {
                            warn!(error = %e, "reconnect attempt failed");
                            // feed the failure back into the retry ladder
                            coordinator.supervisor.handle_fault(&FaultInfo::new(
                                FaultKind::Other,
                                format!("reconnect failed: {}", e),
                            ));
                        }
                    }
                    SessionCommand::Teardown => {
                        coordinator.teardown_current().await;
                    }
                }
            }
        });
    }

    fn spawn_pump(
        &self,
        epoch: u64,
        mut events_rx: broadcast::Receiver<EngineEvent>,
        mut signals_rx: broadcast::Receiver<PlaybackSignal>,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let weak = self.weak.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    event = events_rx.recv() => match event {
                        Ok(event) => {
                            let Some(coordinator) = weak.upgrade() else { break };
                            coordinator.dispatch(epoch, event);
                        }
                        Err(broadcast::error::RecvError::Lagged(missed)) => {
                            warn!(missed, "engine event subscriber lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                    signal = signals_rx.recv() => match signal {
                        Ok(signal) => {
                            let Some(coordinator) = weak.upgrade() else { break };
                            match signal {
                                PlaybackSignal::Stalled => coordinator.quality.note_stall(),
                                PlaybackSignal::Resumed => coordinator.quality.note_resume(),
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(_)) => {}
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                }
            }
        })
    }
}

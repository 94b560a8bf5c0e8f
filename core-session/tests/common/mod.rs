//! Shared fixtures: in-memory fakes for every bridge collaborator.

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_traits::engine::{
    ConfigValue, EngineConfig, EngineEvent, EngineFactory, MediaSource, SessionMetadata,
    StreamingEngine, TelemetrySample,
};
use bridge_traits::error::BridgeError;
use bridge_traits::probe::{AccelerationReport, CapabilityProbe, PerformanceTier, ProbeRequest};
use bridge_traits::surface::{PlaybackSignal, RenderSurface};
use bridge_traits::time::Clock;
use chrono::{DateTime, TimeZone, Utc};
use core_runtime::events::{CoreEvent, EventBus, Receiver};
use core_session::config::SessionConfig;
use core_session::{CoordinatorDeps, SessionCoordinator};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

// ============================================================================
// Fake Engine
// ============================================================================

pub struct FakeEngine {
    events: broadcast::Sender<EngineEvent>,
    pub metadata: Mutex<Option<SessionMetadata>>,
    pub supports_live_config: AtomicBool,
    pub supports_options: AtomicBool,
    pub patches: Mutex<Vec<EngineConfig>>,
    pub options: Mutex<Vec<(String, ConfigValue)>>,
    calls: Mutex<Vec<&'static str>>,
}

impl FakeEngine {
    pub fn new() -> Arc<Self> {
        let (events, _) = broadcast::channel(64);
        Arc::new(Self {
            events,
            metadata: Mutex::new(None),
            supports_live_config: AtomicBool::new(true),
            supports_options: AtomicBool::new(true),
            patches: Mutex::new(Vec::new()),
            options: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn emit(&self, event: EngineEvent) {
        let _ = self.events.send(event);
    }

    pub fn set_metadata(&self, metadata: SessionMetadata) {
        *self.metadata.lock() = Some(metadata);
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().clone()
    }

    pub fn patch_count(&self) -> usize {
        self.patches.lock().len()
    }

    pub fn last_patch(&self) -> Option<EngineConfig> {
        self.patches.lock().last().cloned()
    }
}

#[async_trait]
impl StreamingEngine for FakeEngine {
    async fn attach(&self, _surface: Arc<dyn RenderSurface>) -> bridge_traits::Result<()> {
        self.calls.lock().push("attach");
        Ok(())
    }

    async fn load(&self) -> bridge_traits::Result<()> {
        self.calls.lock().push("load");
        Ok(())
    }

    async fn unload(&self) -> bridge_traits::Result<()> {
        self.calls.lock().push("unload");
        Ok(())
    }

    async fn detach(&self) -> bridge_traits::Result<()> {
        self.calls.lock().push("detach");
        Ok(())
    }

    async fn destroy(&self) -> bridge_traits::Result<()> {
        self.calls.lock().push("destroy");
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    fn session_info(&self) -> Option<SessionMetadata> {
        self.metadata.lock().clone()
    }

    fn configure(&self, patch: &EngineConfig) -> bridge_traits::Result<()> {
        if self.supports_live_config.load(Ordering::SeqCst) {
            self.patches.lock().push(patch.clone());
            Ok(())
        } else {
            Err(BridgeError::Unsupported("no live config surface".into()))
        }
    }

    fn set_option(&self, key: &str, value: ConfigValue) -> bridge_traits::Result<()> {
        if self.supports_options.load(Ordering::SeqCst) {
            self.options.lock().push((key.to_string(), value));
            Ok(())
        } else {
            Err(BridgeError::Unsupported("no option surface".into()))
        }
    }
}

// ============================================================================
// Fake Factory
// ============================================================================

pub struct FakeFactory {
    pub engines: Mutex<Vec<Arc<FakeEngine>>>,
    pub configs: Mutex<Vec<EngineConfig>>,
}

impl FakeFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            engines: Mutex::new(Vec::new()),
            configs: Mutex::new(Vec::new()),
        })
    }

    pub fn count(&self) -> usize {
        self.engines.lock().len()
    }

    pub fn latest(&self) -> Arc<FakeEngine> {
        self.engines.lock().last().expect("no engine created").clone()
    }

    pub fn latest_config(&self) -> EngineConfig {
        self.configs.lock().last().expect("no engine created").clone()
    }
}

impl EngineFactory for FakeFactory {
    fn create(
        &self,
        _source: &MediaSource,
        config: &EngineConfig,
    ) -> bridge_traits::Result<Arc<dyn StreamingEngine>> {
        let engine = FakeEngine::new();
        self.engines.lock().push(engine.clone());
        self.configs.lock().push(config.clone());
        Ok(engine)
    }
}

// ============================================================================
// Fake Surface
// ============================================================================

pub struct FakeSurface {
    position: Mutex<f64>,
    buffered: Mutex<Option<f64>>,
    signals: broadcast::Sender<PlaybackSignal>,
}

impl FakeSurface {
    pub fn new() -> Arc<Self> {
        let (signals, _) = broadcast::channel(16);
        Arc::new(Self {
            position: Mutex::new(0.0),
            buffered: Mutex::new(None),
            signals,
        })
    }

    pub fn set_position(&self, position: f64) {
        *self.position.lock() = position;
    }

    pub fn set_buffered(&self, buffered_end: Option<f64>) {
        *self.buffered.lock() = buffered_end;
    }

    pub fn stall(&self) {
        let _ = self.signals.send(PlaybackSignal::Stalled);
    }

    pub fn resume(&self) {
        let _ = self.signals.send(PlaybackSignal::Resumed);
    }
}

impl RenderSurface for FakeSurface {
    fn current_position(&self) -> f64 {
        *self.position.lock()
    }

    fn buffered_upper_bound(&self) -> Option<f64> {
        *self.buffered.lock()
    }

    fn signals(&self) -> broadcast::Receiver<PlaybackSignal> {
        self.signals.subscribe()
    }
}

// ============================================================================
// Fake Probe & Clock
// ============================================================================

pub struct FakeProbe {
    pub report: Mutex<AccelerationReport>,
}

impl FakeProbe {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            report: Mutex::new(AccelerationReport {
                supported: true,
                enabled: true,
                rendering_mode: "test-gpu".to_string(),
                tier: PerformanceTier::High,
                is_software: false,
            }),
        })
    }

    pub fn set_report(&self, report: AccelerationReport) {
        *self.report.lock() = report;
    }
}

impl CapabilityProbe for FakeProbe {
    fn probe(&self, _request: &ProbeRequest) -> bridge_traits::Result<AccelerationReport> {
        Ok(self.report.lock().clone())
    }
}

pub struct FakeClock {
    millis: AtomicI64,
}

impl FakeClock {
    pub fn new(millis: i64) -> Arc<Self> {
        Arc::new(Self {
            millis: AtomicI64::new(millis),
        })
    }

    pub fn set(&self, millis: i64) {
        self.millis.store(millis, Ordering::SeqCst);
    }

    pub fn advance(&self, millis: i64) {
        self.millis.fetch_add(millis, Ordering::SeqCst);
    }
}

impl Clock for FakeClock {
    fn now(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.millis.load(Ordering::SeqCst))
            .unwrap()
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub coordinator: Arc<SessionCoordinator>,
    pub factory: Arc<FakeFactory>,
    pub surface: Arc<FakeSurface>,
    pub probe: Arc<FakeProbe>,
    pub clock: Arc<FakeClock>,
    pub bus: EventBus,
}

pub fn harness(config: SessionConfig) -> Harness {
    let factory = FakeFactory::new();
    let surface = FakeSurface::new();
    let probe = FakeProbe::new();
    let clock = FakeClock::new(0);
    let bus = EventBus::new(256);

    let coordinator = SessionCoordinator::new(
        config,
        CoordinatorDeps {
            factory: factory.clone(),
            surface: surface.clone(),
            probe: probe.clone(),
            clock: clock.clone(),
        },
        bus.clone(),
    )
    .expect("valid configuration");

    Harness {
        coordinator,
        factory,
        surface,
        probe,
        clock,
        bus,
    }
}

pub fn live_source() -> MediaSource {
    MediaSource::new("ws://host/live.flv", true)
}

pub fn telemetry(timestamp_ms: u64, total_bytes: u64) -> EngineEvent {
    EngineEvent::Telemetry(TelemetrySample {
        timestamp_ms,
        total_bytes,
    })
}

/// Lets spawned tasks (pumps, command loop, timers) run to quiescence.
pub async fn settle() {
    for _ in 0..100 {
        tokio::task::yield_now().await;
    }
}

pub fn drain(receiver: &mut Receiver<CoreEvent>) -> Vec<CoreEvent> {
    let mut events = Vec::new();
    while let Ok(event) = receiver.try_recv() {
        events.push(event);
    }
    events
}

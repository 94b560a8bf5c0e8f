//! Component-level behavior of the quality monitor and latency governor
//! against fake collaborators: hysteresis, precedence and the config
//! application ladder.

mod common;

use bridge_traits::engine::SessionMetadata;
use common::*;
use core_runtime::events::{
    CoreEvent, EventBus, EventStream, LatencyEvent, LatencyLevel, QualityEvent, QualityLevel,
};
use core_session::config::{LatencyConfig, QualityConfig, SessionConfig};
use core_session::latency::LatencyGovernor;
use core_session::profiles::keys;
use core_session::quality::QualityMonitor;
use core_session::supervisor::ConnectionSupervisor;
use std::sync::atomic::Ordering;
use std::sync::Arc;

struct Rig {
    monitor: Arc<QualityMonitor>,
    governor: Arc<LatencyGovernor>,
    engine: Arc<FakeEngine>,
    surface: Arc<FakeSurface>,
    clock: Arc<FakeClock>,
    bus: EventBus,
}

/// Builds a connected supervisor + monitor + governor rig with no timers
/// armed, so every evaluation is an explicit call.
fn rig() -> Rig {
    let bus = EventBus::new(256);
    let clock = FakeClock::new(0);
    let (commands, _rx) = tokio::sync::mpsc::unbounded_channel();
    let supervisor = ConnectionSupervisor::new(&SessionConfig::default(), bus.clone(), commands);
    let governor = LatencyGovernor::new(LatencyConfig::default(), bus.clone(), clock.clone());
    let monitor = QualityMonitor::new(
        QualityConfig::default(),
        bus.clone(),
        clock.clone(),
        supervisor.clone(),
        governor.clone(),
    );

    // drive the supervisor to a connected state, then drop its timers
    supervisor.connect();
    supervisor.handle_telemetry(&bridge_traits::engine::TelemetrySample {
        timestamp_ms: 0,
        total_bytes: 1024,
    });
    supervisor.halt();

    let engine = FakeEngine::new();
    let surface = FakeSurface::new();
    Rig {
        monitor,
        governor,
        engine,
        surface,
        clock,
        bus,
    }
}

fn declared_bitrate(bps: u64) -> SessionMetadata {
    SessionMetadata {
        declared_bitrate_bps: Some(bps),
        server_timestamp_ms: None,
    }
}

fn quality_events(events: &[CoreEvent]) -> Vec<QualityLevel> {
    events
        .iter()
        .filter_map(|e| match e {
            CoreEvent::Quality(QualityEvent::NetworkQualityChanged { level, .. }) => Some(*level),
            _ => None,
        })
        .collect()
}

// ============================================================================
// Quality Monitor
// ============================================================================

#[tokio::test]
async fn quality_transition_pushes_a_profile_exactly_once() {
    let r = rig();
    let mut events = r.bus.subscribe();

    r.surface.set_position(0.0);
    r.surface.set_buffered(Some(5.0));
    r.engine.set_metadata(declared_bitrate(2_500_000));

    r.monitor.evaluate(r.engine.as_ref(), r.surface.as_ref());
    assert_eq!(r.monitor.quality_level(), QualityLevel::Excellent);
    assert_eq!(r.engine.patch_count(), 1);

    // identical conditions recompute the same level: no second push
    r.monitor.evaluate(r.engine.as_ref(), r.surface.as_ref());
    r.monitor.evaluate(r.engine.as_ref(), r.surface.as_ref());
    assert_eq!(r.engine.patch_count(), 1);

    assert_eq!(quality_events(&drain(&mut events)), vec![QualityLevel::Excellent]);
}

#[tokio::test]
async fn noisy_samples_between_ticks_do_not_act() {
    let r = rig();
    let mut events = r.bus.subscribe();

    r.surface.set_buffered(Some(5.0));
    r.engine.set_metadata(declared_bitrate(2_500_000));
    r.monitor.evaluate(r.engine.as_ref(), r.surface.as_ref());
    assert_eq!(r.engine.patch_count(), 1);

    // a noisy burst and its correction arrive between ticks; history
    // updates alone never push configuration
    r.monitor.update_history(bridge_traits::engine::TelemetrySample {
        timestamp_ms: 1000,
        total_bytes: 10,
    });
    r.monitor.update_history(bridge_traits::engine::TelemetrySample {
        timestamp_ms: 2000,
        total_bytes: 5_000_000,
    });
    assert_eq!(r.engine.patch_count(), 1);

    // the next tick still computes the same level: no push
    r.monitor.evaluate(r.engine.as_ref(), r.surface.as_ref());
    assert_eq!(r.engine.patch_count(), 1);
    assert_eq!(quality_events(&drain(&mut events)).len(), 1);
}

#[tokio::test]
async fn each_real_transition_acts_once() {
    let r = rig();
    let mut events = r.bus.subscribe();

    r.surface.set_buffered(Some(5.0));
    r.engine.set_metadata(declared_bitrate(2_500_000));
    r.monitor.evaluate(r.engine.as_ref(), r.surface.as_ref());

    r.engine.set_metadata(declared_bitrate(1_000_000));
    r.monitor.evaluate(r.engine.as_ref(), r.surface.as_ref());

    r.engine.set_metadata(declared_bitrate(2_500_000));
    r.monitor.evaluate(r.engine.as_ref(), r.surface.as_ref());

    assert_eq!(
        quality_events(&drain(&mut events)),
        vec![
            QualityLevel::Excellent,
            QualityLevel::Normal,
            QualityLevel::Excellent
        ]
    );
    assert_eq!(r.engine.patch_count(), 3);
}

#[tokio::test]
async fn ambiguous_zero_bitrate_preserves_the_level() {
    let r = rig();
    let mut events = r.bus.subscribe();

    r.surface.set_buffered(Some(5.0));
    r.engine.set_metadata(declared_bitrate(2_500_000));
    r.monitor.evaluate(r.engine.as_ref(), r.surface.as_ref());
    drain(&mut events);

    // bitrate reads zero with a healthy buffer: likely idle, not degraded
    r.engine.set_metadata(declared_bitrate(0));
    r.surface.set_position(0.0);
    r.surface.set_buffered(Some(2.7)); // health 0.9
    for _ in 0..5 {
        r.monitor.note_stall();
    }
    r.monitor.evaluate(r.engine.as_ref(), r.surface.as_ref());

    assert_eq!(r.monitor.quality_level(), QualityLevel::Excellent);
    assert!(quality_events(&drain(&mut events)).is_empty());
    assert_eq!(r.engine.patch_count(), 1);
}

#[tokio::test]
async fn disconnected_monitors_do_not_evaluate() {
    let bus = EventBus::new(64);
    let clock = FakeClock::new(0);
    let (commands, _rx) = tokio::sync::mpsc::unbounded_channel();
    let supervisor = ConnectionSupervisor::new(&SessionConfig::default(), bus.clone(), commands);
    let governor = LatencyGovernor::new(LatencyConfig::default(), bus.clone(), clock.clone());
    let monitor = QualityMonitor::new(
        QualityConfig::default(),
        bus.clone(),
        clock,
        supervisor,
        governor,
    );

    let engine = FakeEngine::new();
    let surface = FakeSurface::new();
    surface.set_buffered(Some(5.0));
    engine.set_metadata(declared_bitrate(2_500_000));

    monitor.evaluate(engine.as_ref(), surface.as_ref());
    assert_eq!(monitor.quality_level(), QualityLevel::Poor);
    assert_eq!(engine.patch_count(), 0);
}

#[tokio::test]
async fn quality_pushes_defer_latency_keys_to_an_elevated_governor() {
    let r = rig();

    // drive the governor to critical via the buffered-range fallback
    r.surface.set_position(0.0);
    r.surface.set_buffered(Some(6.0));
    r.governor.evaluate(r.engine.as_ref(), r.surface.as_ref());
    assert_eq!(r.governor.current_level(), LatencyLevel::Critical);
    let patches_after_governor = r.engine.patch_count();

    // a quality transition while the governor is elevated must not touch
    // the chase-latency keys
    r.engine.set_metadata(declared_bitrate(2_500_000));
    r.monitor.evaluate(r.engine.as_ref(), r.surface.as_ref());

    assert_eq!(r.engine.patch_count(), patches_after_governor + 1);
    let patch = r.engine.last_patch().unwrap();
    assert!(!patch.contains_key(keys::MAX_LATENCY));
    assert!(!patch.contains_key(keys::MIN_REMAIN));
    assert!(!patch.contains_key(keys::LATENCY_CHASING));
    assert!(patch.contains_key(keys::STASH_INITIAL_SIZE));
}

// ============================================================================
// Latency Governor
// ============================================================================

#[tokio::test]
async fn latency_levels_follow_the_estimate() {
    let r = rig();
    let mut latency_stream = EventStream::new(r.bus.subscribe())
        .filter(|event| matches!(event, CoreEvent::Latency(_)));

    // fallback estimate: buffered end minus position
    r.surface.set_position(0.0);
    r.surface.set_buffered(Some(2.5));
    r.governor.evaluate(r.engine.as_ref(), r.surface.as_ref());
    assert_eq!(r.governor.current_level(), LatencyLevel::Warning);

    r.surface.set_buffered(Some(11.0));
    r.governor.evaluate(r.engine.as_ref(), r.surface.as_ref());
    assert_eq!(r.governor.current_level(), LatencyLevel::Emergency);

    r.surface.set_buffered(Some(0.5));
    r.governor.evaluate(r.engine.as_ref(), r.surface.as_ref());
    assert_eq!(r.governor.current_level(), LatencyLevel::Normal);

    let warning = latency_stream.try_recv().unwrap().unwrap();
    assert!(matches!(
        warning,
        CoreEvent::Latency(LatencyEvent::Warning { .. })
    ));
    let emergency = latency_stream.try_recv().unwrap().unwrap();
    assert!(matches!(
        emergency,
        CoreEvent::Latency(LatencyEvent::Emergency { .. })
    ));
    let normal = latency_stream.try_recv().unwrap().unwrap();
    assert!(matches!(normal, CoreEvent::Latency(LatencyEvent::Normal { .. })));
}

#[tokio::test]
async fn server_timestamp_beats_the_buffer_fallback() {
    let r = rig();

    r.clock.set(20_000);
    r.engine.set_metadata(SessionMetadata {
        declared_bitrate_bps: None,
        server_timestamp_ms: Some(14_000),
    });
    // the buffer says almost nothing is queued, but the server timestamp
    // says we are 6 seconds behind the live edge
    r.surface.set_position(0.0);
    r.surface.set_buffered(Some(0.2));

    r.governor.evaluate(r.engine.as_ref(), r.surface.as_ref());
    assert_eq!(r.governor.current_level(), LatencyLevel::Critical);
    assert!((r.governor.last_latency() - 6.0).abs() < 1e-9);
}

#[tokio::test]
async fn stable_levels_do_not_reapply_profiles() {
    let r = rig();

    r.surface.set_buffered(Some(6.0));
    r.governor.evaluate(r.engine.as_ref(), r.surface.as_ref());
    assert_eq!(r.engine.patch_count(), 1);

    r.surface.set_buffered(Some(7.0)); // still critical
    r.governor.evaluate(r.engine.as_ref(), r.surface.as_ref());
    r.governor.evaluate(r.engine.as_ref(), r.surface.as_ref());
    assert_eq!(r.engine.patch_count(), 1);
}

#[tokio::test]
async fn profile_application_falls_back_to_field_assignment() {
    let r = rig();
    r.engine.supports_live_config.store(false, Ordering::SeqCst);

    r.surface.set_buffered(Some(6.0));
    r.governor.evaluate(r.engine.as_ref(), r.surface.as_ref());

    assert_eq!(r.engine.patch_count(), 0);
    // the aggressive profile's three keys were assigned individually
    assert_eq!(r.engine.options.lock().len(), 3);
}

#[tokio::test]
async fn profile_application_defers_when_the_engine_offers_nothing() {
    let r = rig();
    r.engine.supports_live_config.store(false, Ordering::SeqCst);
    r.engine.supports_options.store(false, Ordering::SeqCst);
    let mut events = r.bus.subscribe();

    r.surface.set_buffered(Some(2.5));
    r.governor.evaluate(r.engine.as_ref(), r.surface.as_ref());

    let seen = drain(&mut events);
    let deferred = seen.iter().find_map(|e| match e {
        CoreEvent::Latency(LatencyEvent::ProfileDeferred { profile, patch }) => {
            Some((profile.clone(), patch.clone()))
        }
        _ => None,
    });
    let (profile, patch) = deferred.expect("deferred notification");
    assert_eq!(profile, "balanced");
    assert!(patch.contains_key(keys::MAX_LATENCY));

    // the level notification still fires
    assert!(seen
        .iter()
        .any(|e| matches!(e, CoreEvent::Latency(LatencyEvent::Warning { .. }))));
}

//! # Network Quality Monitor
//!
//! Samples throughput, buffer health and stall pressure on a fixed cadence
//! and classifies the network into an ordered set of levels. A
//! classification only has effects (a buffering-profile push and a
//! notification) when it differs from the previously acted-upon level, so
//! a single noisy sample cannot flap the engine configuration.
//!
//! The monitor owns the stall counter (fed by render-surface signals) and a
//! bounded telemetry history evicted by timestamp, used for the sliding-
//! window throughput estimate.

use crate::config::QualityConfig;
use crate::latency::LatencyGovernor;
use crate::profiles::{apply_patch, buffer_profile, strip_latency_keys};
use crate::sched::TaskSlot;
use crate::supervisor::ConnectionSupervisor;
use bridge_traits::engine::{StreamingEngine, TelemetrySample};
use bridge_traits::surface::RenderSurface;
use bridge_traits::time::Clock;
use core_runtime::events::{CoreEvent, EventBus, LatencyLevel, QualityEvent, QualityLevel};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::{Arc, Weak};
use tracing::{debug, info};

/// Reference horizon for the buffer-health score, seconds. A buffer at or
/// beyond this depth scores 1.0.
const BUFFER_HEALTH_HORIZON_SECS: f64 = 3.0;

/// Reported bitrate above which the network may classify as excellent.
const EXCELLENT_BITRATE_BPS: u64 = 2_000_000;

/// Reported bitrate below which the network classifies as poor.
const POOR_BITRATE_BPS: u64 = 500_000;

#[derive(Debug)]
struct QualityState {
    history: VecDeque<TelemetrySample>,
    latest: Option<TelemetrySample>,
    stall_count: u32,
    acted: QualityLevel,
}

impl QualityState {
    fn new() -> Self {
        Self {
            history: VecDeque::new(),
            latest: None,
            stall_count: 0,
            // conservative until proven otherwise
            acted: QualityLevel::Poor,
        }
    }
}

/// Classifies network quality and pushes buffering profiles on change.
pub struct QualityMonitor {
    config: QualityConfig,
    events: EventBus,
    clock: Arc<dyn Clock>,
    supervisor: Arc<ConnectionSupervisor>,
    latency: Arc<LatencyGovernor>,
    state: Mutex<QualityState>,
    tick_slot: TaskSlot,
    weak: Weak<QualityMonitor>,
}

impl QualityMonitor {
    pub fn new(
        config: QualityConfig,
        events: EventBus,
        clock: Arc<dyn Clock>,
        supervisor: Arc<ConnectionSupervisor>,
        latency: Arc<LatencyGovernor>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            config,
            events,
            clock,
            supervisor,
            latency,
            state: Mutex::new(QualityState::new()),
            tick_slot: TaskSlot::new(),
            weak: weak.clone(),
        })
    }

    /// Appends one telemetry sample to the bounded history.
    ///
    /// Entries older than the retention window relative to the newest
    /// sample are evicted, so the history depth follows wall time, not
    /// sample count.
    pub fn update_history(&self, sample: TelemetrySample) {
        let retention_ms = self.config.history_retention.as_millis() as u64;
        let mut state = self.state.lock();
        let cutoff = sample.timestamp_ms.saturating_sub(retention_ms);
        state.history.push_back(sample);
        state.latest = Some(sample);
        while let Some(front) = state.history.front() {
            if front.timestamp_ms < cutoff {
                state.history.pop_front();
            } else {
                break;
            }
        }
    }

    /// Records a stall signal from the render surface.
    pub fn note_stall(&self) {
        let mut state = self.state.lock();
        state.stall_count += 1;
        debug!(stall_count = state.stall_count, "playback stalled");
    }

    /// Records a resume signal; a clean resume clears stall pressure.
    pub fn note_resume(&self) {
        self.state.lock().stall_count = 0;
    }

    /// Sliding-window throughput estimate in bits per second.
    ///
    /// Takes the oldest retained sample inside the window (or the oldest
    /// overall when none qualifies) and the newest sample; degenerate
    /// windows report zero.
    pub fn real_time_throughput(&self, now_ms: u64) -> u64 {
        let window_ms = self.config.throughput_window.as_millis() as u64;
        let state = self.state.lock();
        if state.history.len() < 2 {
            return 0;
        }

        let oldest_valid = now_ms.saturating_sub(window_ms);
        let start = state
            .history
            .iter()
            .find(|point| point.timestamp_ms >= oldest_valid)
            .or_else(|| state.history.front())
            .copied()
            .expect("history has at least two samples");
        let end = *state.history.back().expect("history has at least two samples");

        let elapsed_secs = (end.timestamp_ms.saturating_sub(start.timestamp_ms)) as f64 / 1000.0;
        if elapsed_secs <= 0.0 || end.total_bytes < start.total_bytes {
            return 0;
        }
        let bytes = (end.total_bytes - start.total_bytes) as f64;
        (bytes * 8.0 / elapsed_secs) as u64
    }

    /// Normalized buffer headroom in `0.0..=1.0`.
    pub fn buffer_health(position: f64, buffered_end: Option<f64>) -> f64 {
        match buffered_end {
            Some(end) => {
                let remaining = (end - position).clamp(0.0, BUFFER_HEALTH_HORIZON_SECS);
                remaining / BUFFER_HEALTH_HORIZON_SECS
            }
            None => 0.0,
        }
    }

    /// Classification rules, evaluated in priority order.
    ///
    /// A zero reported bitrate with healthy buffer is ambiguous (idle or
    /// paused, not degraded) and preserves the current level.
    pub fn classify(
        reported_bitrate_bps: u64,
        buffer_health: f64,
        stall_count: u32,
        current: QualityLevel,
    ) -> QualityLevel {
        if reported_bitrate_bps == 0 && buffer_health > 0.5 {
            current
        } else if reported_bitrate_bps > EXCELLENT_BITRATE_BPS
            && buffer_health > 0.8
            && stall_count == 0
        {
            QualityLevel::Excellent
        } else if reported_bitrate_bps < POOR_BITRATE_BPS
            || buffer_health < 0.3
            || stall_count > 2
        {
            QualityLevel::Poor
        } else {
            QualityLevel::Normal
        }
    }

    /// One sampling tick: a no-op unless the connection is established.
    ///
    /// On a level transition this pushes the matching buffering profile
    /// into the engine (latency-owned keys excluded while the governor
    /// holds an elevated level) and emits a change notification.
    pub fn evaluate(&self, engine: &dyn StreamingEngine, surface: &dyn RenderSurface) {
        if !self.supervisor.is_connected() {
            return;
        }

        let reported_bitrate = engine
            .session_info()
            .and_then(|info| info.declared_bitrate_bps)
            .unwrap_or(0);
        let health = Self::buffer_health(surface.current_position(), surface.buffered_upper_bound());
        let now_ms = self.clock.unix_timestamp_millis().max(0) as u64;
        let throughput = self.real_time_throughput(now_ms);

        let transition = {
            let mut state = self.state.lock();
            let computed = Self::classify(reported_bitrate, health, state.stall_count, state.acted);
            if computed != state.acted {
                state.acted = computed;
                Some((computed, state.stall_count))
            } else {
                None
            }
        };

        let Some((level, stall_count)) = transition else {
            return;
        };

        let mut patch = buffer_profile(level);
        if self.latency.current_level() != LatencyLevel::Normal {
            strip_latency_keys(&mut patch);
        }
        let outcome = apply_patch(engine, &patch);

        info!(?level, ?outcome, bitrate = reported_bitrate, "network quality changed");
        self.events
            .emit(CoreEvent::Quality(QualityEvent::NetworkQualityChanged {
                level,
                bitrate_bps: reported_bitrate,
                realtime_throughput_bps: throughput,
                buffer_health: health,
                stall_count,
            }))
            .ok();
    }

    /// Starts the sampling timer against one engine instance.
    pub fn start(
        &self,
        engine: Arc<dyn StreamingEngine>,
        surface: Arc<dyn RenderSurface>,
    ) {
        let weak = self.weak.clone();
        self.tick_slot
            .spawn_every(self.config.sample_interval, move || {
                if let Some(monitor) = weak.upgrade() {
                    monitor.evaluate(engine.as_ref(), surface.as_ref());
                }
            });
    }

    /// Stops the sampling timer.
    pub fn stop(&self) {
        self.tick_slot.cancel();
    }

    /// Clears history and stall pressure and falls back to the most
    /// conservative level.
    pub fn reset(&self) {
        *self.state.lock() = QualityState::new();
    }

    /// The last acted-upon quality level.
    pub fn quality_level(&self) -> QualityLevel {
        self.state.lock().acted
    }

    /// The most recent telemetry sample, if any.
    pub fn latest_sample(&self) -> Option<TelemetrySample> {
        self.state.lock().latest
    }

    /// Stall events observed since the last resume.
    pub fn stall_count(&self) -> u32 {
        self.state.lock().stall_count
    }
}

// ============================================================================
// Tests
// ============================================================================

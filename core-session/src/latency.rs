//! # Latency Governor
//!
//! Estimates live-edge latency on a fast cadence and classifies it against
//! three ascending thresholds. Like the quality monitor, the governor only
//! acts on level transitions: each transition applies a latency-control
//! profile through the capability ladder and emits a level-specific
//! notification.
//!
//! ## Estimation
//!
//! The preferred estimate compares the local clock against a server-side
//! timestamp embedded in the stream metadata. Without one, the governor
//! falls back to the buffered-range headroom read off the render surface
//! (zero when nothing is buffered).

use crate::config::{LatencyConfig, LatencyThresholds};
use crate::profiles::{apply_patch, latency_profile, ProfileApplication};
use crate::sched::TaskSlot;
use bridge_traits::engine::{SessionMetadata, StreamingEngine};
use bridge_traits::surface::RenderSurface;
use bridge_traits::time::Clock;
use core_runtime::events::{CoreEvent, EventBus, LatencyEvent, LatencyLevel};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use tracing::{debug, info};

#[derive(Debug)]
struct LatencyState {
    level: LatencyLevel,
    last_latency_secs: f64,
}

impl LatencyState {
    fn new() -> Self {
        Self {
            level: LatencyLevel::Normal,
            last_latency_secs: 0.0,
        }
    }
}

/// Classifies live-edge latency and applies control profiles on change.
pub struct LatencyGovernor {
    config: LatencyConfig,
    events: EventBus,
    clock: Arc<dyn Clock>,
    state: Mutex<LatencyState>,
    tick_slot: TaskSlot,
    weak: Weak<LatencyGovernor>,
}

impl LatencyGovernor {
    pub fn new(config: LatencyConfig, events: EventBus, clock: Arc<dyn Clock>) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            config,
            events,
            clock,
            state: Mutex::new(LatencyState::new()),
            tick_slot: TaskSlot::new(),
            weak: weak.clone(),
        })
    }

    /// Classifies a latency estimate. Thresholds are inclusive lower
    /// bounds: a latency exactly at a threshold belongs to that level.
    pub fn classify(latency_secs: f64, thresholds: &LatencyThresholds) -> LatencyLevel {
        if latency_secs >= thresholds.emergency_secs {
            LatencyLevel::Emergency
        } else if latency_secs >= thresholds.critical_secs {
            LatencyLevel::Critical
        } else if latency_secs >= thresholds.warning_secs {
            LatencyLevel::Warning
        } else {
            LatencyLevel::Normal
        }
    }

    /// Estimates live-edge latency in seconds.
    pub fn estimate(
        &self,
        metadata: Option<&SessionMetadata>,
        position: f64,
        buffered_end: Option<f64>,
    ) -> f64 {
        if let Some(server_ms) = metadata.and_then(|m| m.server_timestamp_ms) {
            let local_ms = self.clock.unix_timestamp_millis();
            return (local_ms - server_ms as i64) as f64 / 1000.0;
        }
        buffered_end
            .map(|end| (end - position).max(0.0))
            .unwrap_or(0.0)
    }

    /// One sampling tick.
    ///
    /// On a level transition this applies the matching control profile
    /// (falling back down the capability ladder, never failing) and emits
    /// the level's notification.
    pub fn evaluate(&self, engine: &dyn StreamingEngine, surface: &dyn RenderSurface) {
        let metadata = engine.session_info();
        let latency = self.estimate(
            metadata.as_ref(),
            surface.current_position(),
            surface.buffered_upper_bound(),
        );
        let level = Self::classify(latency, &self.config.thresholds);

        let changed = {
            let mut state = self.state.lock();
            state.last_latency_secs = latency;
            if level != state.level {
                state.level = level;
                true
            } else {
                false
            }
        };
        if !changed {
            return;
        }

        let profile = latency_profile(level);
        let outcome = apply_patch(engine, &profile.patch);
        info!(
            ?level,
            latency_secs = latency,
            profile = profile.name,
            ?outcome,
            "latency level changed"
        );
        if outcome == ProfileApplication::Deferred {
            self.events
                .emit(CoreEvent::Latency(LatencyEvent::ProfileDeferred {
                    profile: profile.name.to_string(),
                    patch: profile.patch.clone(),
                }))
                .ok();
        }

        let event = match level {
            LatencyLevel::Normal => LatencyEvent::Normal {
                latency_secs: latency,
            },
            LatencyLevel::Warning => LatencyEvent::Warning {
                latency_secs: latency,
            },
            LatencyLevel::Critical => LatencyEvent::Critical {
                latency_secs: latency,
            },
            LatencyLevel::Emergency => LatencyEvent::Emergency {
                latency_secs: latency,
            },
        };
        self.events.emit(CoreEvent::Latency(event)).ok();
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
                if let Some(governor) = weak.upgrade() {
                    governor.evaluate(engine.as_ref(), surface.as_ref());
                }
            });
        debug!(
            interval_ms = self.config.sample_interval.as_millis() as u64,
            "latency monitoring started"
        );
    }

    /// Stops the sampling timer.
    pub fn stop(&self) {
        self.tick_slot.cancel();
    }

    /// Restores the governor to the least severe level.
    pub fn reset(&self) {
        *self.state.lock() = LatencyState::new();
    }

    /// The last acted-upon latency level.
    pub fn current_level(&self) -> LatencyLevel {
        self.state.lock().level
    }

    /// The latency estimate from the most recent evaluation, seconds.
    pub fn last_latency(&self) -> f64 {
        self.state.lock().last_latency_secs
    }
}

// ============================================================================
// Tests
// ============================================================================

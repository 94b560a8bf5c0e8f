//! # Acceleration Probe Adapter
//!
//! One-shot (plus on-demand) hardware-acceleration detection. The adapter
//! caches probe facts for the process lifetime, derives engine config
//! adjustments from the performance tier, and reports through the
//! notification channel. It is not a control loop: nothing here runs on a
//! timer.
//!
//! A probe failure is a data gap, not a fault: the adapter degrades to an
//! unsupported/software report and playback proceeds without acceleration.

use crate::profiles::keys;
use bridge_traits::engine::EngineConfig;
use bridge_traits::probe::{AccelerationReport, CapabilityProbe, PerformanceTier, ProbeRequest};
use core_runtime::events::{AccelEvent, CoreEvent, EventBus};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{info, warn};

/// Detects and reports hardware acceleration capability.
pub struct AccelProbeAdapter {
    probe: Arc<dyn CapabilityProbe>,
    events: EventBus,
    cached: Mutex<Option<AccelerationReport>>,
}

impl AccelProbeAdapter {
    pub fn new(probe: Arc<dyn CapabilityProbe>, events: EventBus) -> Arc<Self> {
        Arc::new(Self {
            probe,
            events,
            cached: Mutex::new(None),
        })
    }

    /// Runs detection, caches the report and emits the facts.
    pub fn detect(&self, request: &ProbeRequest) -> AccelerationReport {
        let report = self.run_probe(request);
        info!(
            supported = report.supported,
            enabled = report.enabled,
            tier = ?report.tier,
            "hardware acceleration detected"
        );
        *self.cached.lock() = Some(report.clone());
        self.events
            .emit(CoreEvent::Accel(AccelEvent::Info {
                report: report.clone(),
            }))
            .ok();
        report
    }

    /// Re-runs detection with different forcing flags.
    ///
    /// Emits a change notification flagged `reload_required`; applying the
    /// new facts to a running session is the caller's job, typically by
    /// issuing a fresh `load()`.
    pub fn set_acceleration(&self, request: &ProbeRequest) -> AccelerationReport {
        let report = self.run_probe(request);
        *self.cached.lock() = Some(report.clone());
        self.events
            .emit(CoreEvent::Accel(AccelEvent::Changed {
                report: report.clone(),
                reload_required: true,
            }))
            .ok();
        report
    }

    /// The cached report, if detection has run.
    pub fn cached(&self) -> Option<AccelerationReport> {
        self.cached.lock().clone()
    }

    /// Engine config adjustments derived from the cached report.
    ///
    /// Worker-based parallel decoding mirrors the enabled flag; preload
    /// windows shrink with the performance tier, and the software tier
    /// additionally clamps backward cleanup to keep memory bounded.
    pub fn config_adjustments(&self) -> EngineConfig {
        let report = self
            .cached
            .lock()
            .clone()
            .unwrap_or_else(AccelerationReport::software_fallback);

        let mut config = EngineConfig::new();
        config.insert(keys::ENABLE_WORKER.into(), report.enabled.into());
        match report.tier {
            PerformanceTier::High => {
                config.insert(keys::LAZY_LOAD_MAX_DURATION.into(), 60.0f64.into());
            }
            PerformanceTier::Medium => {
                config.insert(keys::LAZY_LOAD_MAX_DURATION.into(), 30.0f64.into());
            }
            PerformanceTier::Software => {
                config.insert(keys::LAZY_LOAD_MAX_DURATION.into(), 20.0f64.into());
                config.insert(
                    keys::AUTO_CLEANUP_MAX_BACKWARD_DURATION.into(),
                    30.0f64.into(),
                );
            }
            PerformanceTier::Unknown => {}
        }
        config
    }

    fn run_probe(&self, request: &ProbeRequest) -> AccelerationReport {
        match self.probe.probe(request) {
            Ok(report) => report,
            Err(e) => {
                warn!(error = %e, "capability probe failed, assuming software path");
                AccelerationReport::software_fallback()
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

//! Hardware acceleration capability probe.
//!
//! A synchronous, idempotent fact source. Probing happens once at session
//! setup and again only when the host explicitly asks for re-detection; it
//! is never polled on a timer.

use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Inputs to a probe run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeRequest {
    /// Treat acceleration as enabled even when detection is inconclusive.
    pub force_enable: bool,
    /// Accept a software rasterizer instead of reporting unsupported.
    pub allow_software_fallback: bool,
}

/// Coarse performance classification of the decode/render path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PerformanceTier {
    /// Software rasterizer, no hardware decode.
    Software,
    /// Detection ran but the renderer was not recognized.
    Unknown,
    /// Integrated GPU class.
    Medium,
    /// Discrete GPU class.
    High,
}

/// Facts produced by one probe run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccelerationReport {
    /// Hardware decode is available on this host.
    pub supported: bool,
    /// Acceleration will actually be used (support + policy).
    pub enabled: bool,
    /// Renderer identification string, backend specific.
    pub rendering_mode: String,
    /// Coarse performance classification.
    pub tier: PerformanceTier,
    /// The renderer is a software implementation.
    pub is_software: bool,
}

impl AccelerationReport {
    /// The report used when probing fails outright: nothing is assumed
    /// beyond a software path.
    pub fn software_fallback() -> Self {
        Self {
            supported: false,
            enabled: false,
            rendering_mode: "unknown".to_string(),
            tier: PerformanceTier::Software,
            is_software: true,
        }
    }
}

/// Synchronous hardware-acceleration detection.
///
/// Implementations must be idempotent: two probes with the same request on
/// the same host return the same report.
pub trait CapabilityProbe: Send + Sync {
    fn probe(&self, request: &ProbeRequest) -> Result<AccelerationReport>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_ordering_ranks_hardware_above_software() {
        assert!(PerformanceTier::High > PerformanceTier::Medium);
        assert!(PerformanceTier::Medium > PerformanceTier::Unknown);
        assert!(PerformanceTier::Unknown > PerformanceTier::Software);
    }

    #[test]
    fn software_fallback_is_disabled() {
        let report = AccelerationReport::software_fallback();
        assert!(!report.supported);
        assert!(!report.enabled);
        assert!(report.is_software);
        assert_eq!(report.tier, PerformanceTier::Software);
    }
}

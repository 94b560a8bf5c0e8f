//! # Buffering & Latency Profiles
//!
//! Fixed lookup tables mapping classification levels to engine
//! configuration patches, plus the capability-negotiated patch
//! application ladder.
//!
//! ## Key ownership
//!
//! The engine exposes one flat config surface written by two components.
//! To keep overwrites intentional rather than accidental:
//!
//! - The quality monitor owns the stash/cleanup/preload keys
//!   ([`QUALITY_OWNED_KEYS`]).
//! - The latency governor owns the chase-latency keys
//!   ([`LATENCY_OWNED_KEYS`]).
//!
//! Quality profiles do carry chase-latency values (a poor network wants a
//! wider latency envelope), but the governor's keys take precedence: while
//! the governor holds an elevated level, quality pushes are stripped of
//! latency-owned keys before they reach the engine.

use bridge_traits::engine::{EngineConfig, MediaSource, StreamingEngine};
use bridge_traits::error::BridgeError;
use core_runtime::events::{LatencyLevel, QualityLevel};
use tracing::{debug, warn};

/// Engine configuration key names.
///
/// The names target the engine's flat key/value surface; backends map them
/// onto their own option structs.
pub mod keys {
    pub const ENABLE_STASH_BUFFER: &str = "enable_stash_buffer";
    pub const STASH_INITIAL_SIZE: &str = "stash_initial_size";
    pub const AUTO_CLEANUP_SOURCE_BUFFER: &str = "auto_cleanup_source_buffer";
    pub const AUTO_CLEANUP_MAX_BACKWARD_DURATION: &str = "auto_cleanup_max_backward_duration";
    pub const LAZY_LOAD: &str = "lazy_load";
    pub const LAZY_LOAD_MAX_DURATION: &str = "lazy_load_max_duration";
    pub const LATENCY_CHASING: &str = "latency_chasing";
    pub const MAX_LATENCY: &str = "max_latency";
    pub const MIN_REMAIN: &str = "min_remain";
    pub const LIVE_SYNC: &str = "live_sync";
    pub const FIX_AUDIO_TIMESTAMP_GAP: &str = "fix_audio_timestamp_gap";
    pub const SEEK_TYPE: &str = "seek_type";
    pub const FORCE_KEY_FRAME_ON_DISCONTINUITY: &str = "force_key_frame_on_discontinuity";
    pub const ACCURATE_SEEK: &str = "accurate_seek";
    pub const ENABLE_WORKER: &str = "enable_worker";
}

/// Keys the latency governor owns. These win on conflict.
pub const LATENCY_OWNED_KEYS: &[&str] = &[keys::LATENCY_CHASING, keys::MAX_LATENCY, keys::MIN_REMAIN];

/// Keys the quality monitor owns.
pub const QUALITY_OWNED_KEYS: &[&str] = &[
    keys::ENABLE_STASH_BUFFER,
    keys::STASH_INITIAL_SIZE,
    keys::AUTO_CLEANUP_SOURCE_BUFFER,
    keys::AUTO_CLEANUP_MAX_BACKWARD_DURATION,
    keys::LAZY_LOAD_MAX_DURATION,
];

// ============================================================================
// Base Engine Configuration
// ============================================================================

/// Initial engine configuration for a media source, applied before `load()`.
///
/// Live sources get the low-latency shape: no stash buffering, latency
/// chasing on, range seeks. On-demand sources trade latency for stability.
pub fn base_engine_config(source: &MediaSource) -> EngineConfig {
    let mut config = EngineConfig::new();
    if source.is_live {
        config.insert(keys::ENABLE_STASH_BUFFER.into(), false.into());
        config.insert(keys::STASH_INITIAL_SIZE.into(), 32u64.into());
        config.insert(keys::LATENCY_CHASING.into(), true.into());
        config.insert(keys::MAX_LATENCY.into(), 0.8f64.into());
        config.insert(keys::MIN_REMAIN.into(), 0.1f64.into());
        config.insert(keys::LIVE_SYNC.into(), true.into());
        config.insert(keys::LAZY_LOAD.into(), false.into());
        config.insert(keys::FIX_AUDIO_TIMESTAMP_GAP.into(), true.into());
        config.insert(keys::SEEK_TYPE.into(), "range".into());
        config.insert(keys::FORCE_KEY_FRAME_ON_DISCONTINUITY.into(), true.into());
        config.insert(keys::ACCURATE_SEEK.into(), false.into());
    } else {
        config.insert(keys::ENABLE_STASH_BUFFER.into(), true.into());
        config.insert(keys::STASH_INITIAL_SIZE.into(), (64u64 * 1024).into());
        config.insert(keys::LAZY_LOAD.into(), true.into());
    }
    config
}

// ============================================================================
// Quality Buffer Profiles
// ============================================================================

/// Buffering profile for a quality level.
///
/// A better network gets smaller buffers and a tighter latency envelope;
/// a poor one gets headroom against the next hiccup.
pub fn buffer_profile(level: QualityLevel) -> EngineConfig {
    let (stash, cleanup_backward, lazy_load_max, max_latency, min_remain) = match level {
        QualityLevel::Excellent => (64u64, 0.5, 0.3, 0.5, 0.1),
        QualityLevel::Normal => (128u64, 1.0, 0.5, 1.0, 0.2),
        QualityLevel::Poor => (256u64, 2.0, 1.0, 2.0, 0.5),
    };

    let mut config = EngineConfig::new();
    config.insert(keys::ENABLE_STASH_BUFFER.into(), false.into());
    config.insert(keys::STASH_INITIAL_SIZE.into(), stash.into());
    config.insert(keys::AUTO_CLEANUP_SOURCE_BUFFER.into(), true.into());
    config.insert(
        keys::AUTO_CLEANUP_MAX_BACKWARD_DURATION.into(),
        cleanup_backward.into(),
    );
    config.insert(keys::LAZY_LOAD_MAX_DURATION.into(), lazy_load_max.into());
    config.insert(keys::LATENCY_CHASING.into(), true.into());
    config.insert(keys::MAX_LATENCY.into(), max_latency.into());
    config.insert(keys::MIN_REMAIN.into(), min_remain.into());
    config
}

/// Removes latency-governed keys from a quality patch.
pub fn strip_latency_keys(patch: &mut EngineConfig) {
    for key in LATENCY_OWNED_KEYS {
        patch.remove(*key);
    }
}

// ============================================================================
// Latency Control Profiles
// ============================================================================

/// A named latency-control profile.
#[derive(Debug, Clone, PartialEq)]
pub struct LatencyProfile {
    /// Stable profile name, used in deferred-application notifications.
    pub name: &'static str,
    /// The configuration patch realizing the profile.
    pub patch: EngineConfig,
}

fn latency_patch(max_latency: f64, min_remain: f64) -> EngineConfig {
    let mut patch = EngineConfig::new();
    patch.insert(keys::LATENCY_CHASING.into(), true.into());
    patch.insert(keys::MAX_LATENCY.into(), max_latency.into());
    patch.insert(keys::MIN_REMAIN.into(), min_remain.into());
    patch
}

/// Latency-control profile for a latency level.
///
/// `conservative` favors stability, `aggressive` minimizes the live-edge
/// gap at the cost of resilience; `balanced` sits between.
pub fn latency_profile(level: LatencyLevel) -> LatencyProfile {
    match level {
        LatencyLevel::Normal => LatencyProfile {
            name: "conservative",
            patch: latency_patch(5.0, 1.0),
        },
        LatencyLevel::Warning => LatencyProfile {
            name: "balanced",
            patch: latency_patch(3.0, 0.5),
        },
        LatencyLevel::Critical | LatencyLevel::Emergency => LatencyProfile {
            name: "aggressive",
            patch: latency_patch(1.0, 0.2),
        },
    }
}

// ============================================================================
// Patch Application
// ============================================================================

/// How a configuration patch reached the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileApplication {
    /// The engine accepted the structured live update.
    AppliedViaApi,
    /// The structured call was unavailable; individual fields were assigned.
    AppliedViaField {
        /// Number of keys that were accepted.
        applied: usize,
    },
    /// The engine exposes no config surface; an external owner must apply
    /// the patch.
    Deferred,
}

/// Applies a patch through the capability ladder: structured update first,
/// per-field assignment second, deferral last. Never fails.
pub fn apply_patch(engine: &dyn StreamingEngine, patch: &EngineConfig) -> ProfileApplication {
    match engine.configure(patch) {
        Ok(()) => return ProfileApplication::AppliedViaApi,
        Err(BridgeError::Unsupported(reason)) => {
            debug!(%reason, "structured config update unavailable, assigning fields");
        }
        Err(e) => {
            warn!(error = %e, "structured config update failed, assigning fields");
        }
    }

    let mut applied = 0;
    for (key, value) in patch {
        match engine.set_option(key, value.clone()) {
            Ok(()) => applied += 1,
            Err(e) => debug!(key = %key, error = %e, "field assignment rejected"),
        }
    }

    if applied > 0 {
        ProfileApplication::AppliedViaField { applied }
    } else {
        ProfileApplication::Deferred
    }
}

// ============================================================================
// Tests
// ============================================================================

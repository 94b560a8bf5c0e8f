//! # Session Configuration
//!
//! The caller-facing configuration surface for the resilience core. All
//! values have defaults matching a low-latency live deployment; callers
//! override per stream. Configuration is validated once at coordinator
//! construction, never persisted.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry budget and backoff shape for one session.
///
/// The policy itself is immutable; the attempt counter lives in the
/// connection supervisor and survives engine recreations until data arrives
/// or a fresh `load()` resets it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of scheduled retries before the session fails
    /// terminally.
    pub max_retries: u32,
    /// Backoff base; attempt `n` waits `base * 2^n` plus jitter.
    pub base_interval: Duration,
    /// Hard cap on any single backoff delay, jitter included.
    pub max_interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_interval: Duration::from_millis(3000),
            max_interval: Duration::from_millis(5000),
        }
    }
}

impl RetryPolicy {
    /// Backoff delay for a 0-based attempt, without jitter, capped at
    /// `max_interval`.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.raw_delay_ms(attempt).min(self.max_interval.as_millis() as u64))
    }

    /// Backoff delay for a 0-based attempt with a jitter offset, capped at
    /// `max_interval`.
    pub fn delay_with_jitter(&self, attempt: u32, jitter: Duration) -> Duration {
        let total = self
            .raw_delay_ms(attempt)
            .saturating_add(jitter.as_millis() as u64);
        Duration::from_millis(total.min(self.max_interval.as_millis() as u64))
    }

    fn raw_delay_ms(&self, attempt: u32) -> u64 {
        let base = self.base_interval.as_millis() as u64;
        // 2^attempt saturates well before the cap can matter
        let factor = 1u64.checked_shl(attempt.min(32)).unwrap_or(u64::MAX);
        base.saturating_mul(factor)
    }
}

/// Quality monitor sampling parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityConfig {
    /// How often the monitor evaluates quality.
    pub sample_interval: Duration,
    /// Sliding window for the real-time throughput estimate.
    pub throughput_window: Duration,
    /// How much telemetry history is retained, evicted by timestamp.
    pub history_retention: Duration,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            sample_interval: Duration::from_millis(5000),
            throughput_window: Duration::from_millis(5000),
            history_retention: Duration::from_millis(30_000),
        }
    }
}

/// Ascending latency thresholds, in seconds. A latency exactly at a
/// threshold classifies at that threshold's level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatencyThresholds {
    pub warning_secs: f64,
    pub critical_secs: f64,
    pub emergency_secs: f64,
}

impl Default for LatencyThresholds {
    fn default() -> Self {
        Self {
            warning_secs: 2.0,
            critical_secs: 5.0,
            emergency_secs: 10.0,
        }
    }
}

/// Latency governor sampling parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatencyConfig {
    /// How often the governor estimates latency.
    pub sample_interval: Duration,
    /// Classification thresholds.
    pub thresholds: LatencyThresholds,
}

impl Default for LatencyConfig {
    fn default() -> Self {
        Self {
            sample_interval: Duration::from_millis(1000),
            thresholds: LatencyThresholds::default(),
        }
    }
}

/// Complete configuration for one session coordinator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Window for the first telemetry sample after `connect()`.
    pub connection_timeout: Duration,
    /// Window for the first positive byte delta once connected.
    pub data_timeout: Duration,
    /// Retry budget and backoff shape.
    pub retry: RetryPolicy,
    /// Quality monitor settings.
    pub quality: QualityConfig,
    /// Latency governor settings.
    pub latency: LatencyConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            connection_timeout: Duration::from_millis(5000),
            data_timeout: Duration::from_millis(5000),
            retry: RetryPolicy::default(),
            quality: QualityConfig::default(),
            latency: LatencyConfig::default(),
        }
    }
}

impl SessionConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns a human-readable description of the first violated
    /// constraint.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.connection_timeout.is_zero() {
            return Err("connection_timeout must be positive".into());
        }
        if self.data_timeout.is_zero() {
            return Err("data_timeout must be positive".into());
        }
        if self.retry.base_interval.is_zero() {
            return Err("retry.base_interval must be positive".into());
        }
        if self.retry.max_interval < self.retry.base_interval {
            return Err("retry.max_interval must be >= retry.base_interval".into());
        }
        if self.quality.sample_interval.is_zero() {
            return Err("quality.sample_interval must be positive".into());
        }
        if self.quality.throughput_window.is_zero() {
            return Err("quality.throughput_window must be positive".into());
        }
        if self.latency.sample_interval.is_zero() {
            return Err("latency.sample_interval must be positive".into());
        }
        let t = &self.latency.thresholds;
        if t.warning_secs <= 0.0 {
            return Err("latency.thresholds.warning_secs must be positive".into());
        }
        if !(t.warning_secs < t.critical_secs && t.critical_secs < t.emergency_secs) {
            return Err("latency thresholds must be strictly ascending".into());
        }
        Ok(())
    }
}

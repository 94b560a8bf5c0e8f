//! Streaming engine contract.
//!
//! The engine is the transport + demux + decode black box behind the
//! resilience core. The core never parses media; it drives the engine's
//! lifecycle, listens to its event stream and patches its buffering
//! configuration.
//!
//! ## Lifecycle
//!
//! One [`StreamingEngine`] value represents one attached lifecycle. A
//! reconnect never reuses an instance: the coordinator discards the old one
//! and asks the [`EngineFactory`] for a fresh instance bound to the same
//! [`MediaSource`].
//!
//! ## Events
//!
//! Engines publish [`EngineEvent`]s on a broadcast channel obtained through
//! [`StreamingEngine::subscribe`]. Telemetry samples are periodic and noisy;
//! consumers must tolerate gaps and late arrivals.

use crate::error::Result;
use crate::surface::RenderSurface;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::broadcast;

// ============================================================================
// Media Source
// ============================================================================

/// Descriptor of the media the engine should play.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaSource {
    /// Full URL of the stream or file.
    pub url: String,
    /// `true` for live streams, `false` for on-demand content.
    pub is_live: bool,
}

/// Transport class derived from the source URL scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    WebSocket,
    Http,
    Https,
    Local,
}

impl MediaSource {
    pub fn new(url: impl Into<String>, is_live: bool) -> Self {
        Self {
            url: url.into(),
            is_live,
        }
    }

    /// Classifies the transport from the URL scheme.
    pub fn transport(&self) -> Transport {
        if self.url.starts_with("ws://") || self.url.starts_with("wss://") {
            Transport::WebSocket
        } else if self.url.starts_with("https://") {
            Transport::Https
        } else if self.url.starts_with("http://") {
            Transport::Http
        } else {
            Transport::Local
        }
    }
}

// ============================================================================
// Engine Configuration
// ============================================================================

/// A single value in the engine's flat key/value configuration surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Bool(bool),
    U64(u64),
    F64(f64),
    Str(String),
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValue::Bool(v) => write!(f, "{}", v),
            ConfigValue::U64(v) => write!(f, "{}", v),
            ConfigValue::F64(v) => write!(f, "{}", v),
            ConfigValue::Str(v) => write!(f, "{}", v),
        }
    }
}

impl From<bool> for ConfigValue {
    fn from(v: bool) -> Self {
        ConfigValue::Bool(v)
    }
}

impl From<u64> for ConfigValue {
    fn from(v: u64) -> Self {
        ConfigValue::U64(v)
    }
}

impl From<f64> for ConfigValue {
    fn from(v: f64) -> Self {
        ConfigValue::F64(v)
    }
}

impl From<&str> for ConfigValue {
    fn from(v: &str) -> Self {
        ConfigValue::Str(v.to_string())
    }
}

/// Flat key/value configuration map applied before `load()` and, where the
/// engine supports it, live-patched afterwards. Keys are engine-defined;
/// the ordered map keeps patch logs deterministic.
pub type EngineConfig = BTreeMap<String, ConfigValue>;

// ============================================================================
// Engine Events
// ============================================================================

/// Periodic transport statistics reported by the engine.
///
/// `total_bytes` is cumulative and monotonically non-decreasing within one
/// engine instance. A new instance starts again from zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetrySample {
    /// Wall-clock timestamp of the sample, milliseconds since the Unix epoch.
    pub timestamp_ms: u64,
    /// Cumulative bytes received since this instance was loaded.
    pub total_bytes: u64,
}

/// Stream metadata the engine learned from the session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionMetadata {
    /// Declared audio + video bitrate in bits per second, if the container
    /// advertises one.
    pub declared_bitrate_bps: Option<u64>,
    /// Server-side wall-clock timestamp embedded in the stream,
    /// milliseconds since the Unix epoch.
    pub server_timestamp_ms: Option<u64>,
}

/// Broad classification of an engine fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FaultKind {
    /// Transport-level failure (socket closed, HTTP error).
    Network,
    /// Media pipeline failure (demux, source buffer).
    Media,
    /// Decoder failure.
    Decode,
    /// Synthesized by the supervisor when no qualifying telemetry arrived
    /// within the configured window.
    Timeout,
    /// Anything the engine could not classify.
    Other,
}

/// A fault reported by the engine or synthesized by the supervisor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaultInfo {
    pub kind: FaultKind,
    pub message: String,
}

impl FaultInfo {
    pub fn new(kind: FaultKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for FaultInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

/// Everything an engine instance publishes during its lifetime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum EngineEvent {
    /// The engine hit a fault. Whether it is retryable is the supervisor's
    /// call, not the engine's.
    Fault(FaultInfo),
    /// Periodic transport statistics.
    Telemetry(TelemetrySample),
    /// Stream metadata arrived or changed.
    SessionInfo(SessionMetadata),
}

// ============================================================================
// Engine Traits
// ============================================================================

/// One attached lifecycle of the external streaming engine.
///
/// Lifecycle methods are async because they may touch the network or the
/// platform media pipeline. Configuration and subscription accessors are
/// synchronous and must not block.
///
/// ## Live configuration
///
/// [`configure`](StreamingEngine::configure) applies a structured patch to a
/// running instance. Engines without live patching return
/// [`BridgeError::Unsupported`](crate::error::BridgeError::Unsupported);
/// callers then fall back to
/// [`set_option`](StreamingEngine::set_option) per key, or defer the change
/// to an external owner.
#[async_trait]
pub trait StreamingEngine: Send + Sync {
    /// Binds the engine's output to a render surface.
    async fn attach(&self, surface: Arc<dyn RenderSurface>) -> Result<()>;

    /// Starts transport and decode for the configured source.
    async fn load(&self) -> Result<()>;

    /// Stops transport and decode, keeping the surface attached.
    async fn unload(&self) -> Result<()>;

    /// Unbinds the render surface.
    async fn detach(&self) -> Result<()>;

    /// Releases every resource held by this instance. The instance must not
    /// emit events after this resolves.
    async fn destroy(&self) -> Result<()>;

    /// Subscribes to this instance's event stream.
    ///
    /// Each call returns an independent receiver; past events are not
    /// replayed.
    fn subscribe(&self) -> broadcast::Receiver<EngineEvent>;

    /// Latest stream metadata, if any has arrived yet.
    fn session_info(&self) -> Option<SessionMetadata>;

    /// Applies a structured configuration patch to the running instance.
    fn configure(&self, patch: &EngineConfig) -> Result<()>;

    /// Best-effort assignment of a single configuration field.
    fn set_option(&self, key: &str, value: ConfigValue) -> Result<()>;
}

/// Creates engine instances.
///
/// The coordinator calls this once per connection attempt; the factory must
/// return a fresh, unloaded instance every time.
pub trait EngineFactory: Send + Sync {
    fn create(&self, source: &MediaSource, config: &EngineConfig) -> Result<Arc<dyn StreamingEngine>>;
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_classification() {
        assert_eq!(
            MediaSource::new("ws://host/live.flv", true).transport(),
            Transport::WebSocket
        );
        assert_eq!(
            MediaSource::new("wss://host/live.flv", true).transport(),
            Transport::WebSocket
        );
        assert_eq!(
            MediaSource::new("http://host/a.flv", true).transport(),
            Transport::Http
        );
        assert_eq!(
            MediaSource::new("https://host/a.flv", false).transport(),
            Transport::Https
        );
        assert_eq!(
            MediaSource::new("/tmp/a.flv", false).transport(),
            Transport::Local
        );
    }

    #[test]
    fn config_value_conversions() {
        let mut config = EngineConfig::new();
        config.insert("enable_stash_buffer".into(), false.into());
        config.insert("stash_initial_size".into(), 64u64.into());
        config.insert("max_latency".into(), 0.5f64.into());

        assert_eq!(
            config.get("enable_stash_buffer"),
            Some(&ConfigValue::Bool(false))
        );
        assert_eq!(config.get("stash_initial_size").unwrap().to_string(), "64");
    }

    #[test]
    fn engine_event_serialization() {
        let event = EngineEvent::Telemetry(TelemetrySample {
            timestamp_ms: 1000,
            total_bytes: 12500,
        });

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("12500"));

        let back: EngineEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn fault_display() {
        let fault = FaultInfo::new(FaultKind::Timeout, "no data within 5000ms");
        assert_eq!(fault.to_string(), "Timeout: no data within 5000ms");
    }
}

//! # Notification Channel
//!
//! Event-driven notification fan-out for the resilience core, built on
//! `tokio::sync::broadcast`. Every observable decision the control
//! components make (retry scheduling, quality transitions, latency
//! transitions, acceleration facts) is published here as a typed event.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐    emit      ┌───────────┐
//! │ Conn. Supervisor ├─────────────>│           │
//! └──────────────────┘              │           │
//! ┌──────────────────┐    emit      │ EventBus  │   subscribe   ┌────────────┐
//! │ Quality Monitor  ├─────────────>│ (broadcast├──────────────>│ Host / UI  │
//! └──────────────────┘              │  channel) │               └────────────┘
//! ┌──────────────────┐    emit      │           │   subscribe   ┌────────────┐
//! │ Latency Governor ├─────────────>│           ├──────────────>│ Tests      │
//! └──────────────────┘              └───────────┘               └────────────┘
//! ```
//!
//! The bus is a value, not a module-level singleton: components hold a clone
//! handed to them at construction, which is what makes isolated testing with
//! a private bus possible.
//!
//! ## Error Handling
//!
//! `tokio::sync::broadcast` reports two receive errors:
//!
//! - **`RecvError::Lagged(n)`**: the subscriber missed `n` events. Non-fatal;
//!   the subscriber keeps receiving newer events.
//! - **`RecvError::Closed`**: every sender is gone. Treat as shutdown.
//!
//! Emitting to a bus with no subscribers is an error at the channel level;
//! control components deliberately ignore it, since notification delivery is
//! observability, not control flow.

use bridge_traits::engine::{EngineConfig, FaultKind};
use bridge_traits::probe::AccelerationReport;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

// Re-export commonly used types
pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
///
/// Subscribers that fall behind by more than this receive
/// `RecvError::Lagged`.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Classification Levels
// ============================================================================

/// Network quality classification, ordered worst to best.
///
/// The ordering is load-bearing: `Poor` is the most conservative level and
/// the one every new session starts from.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum QualityLevel {
    Poor,
    Normal,
    Excellent,
}

/// Live-edge latency classification, ordered least to most severe.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum LatencyLevel {
    Normal,
    Warning,
    Critical,
    Emergency,
}

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum encompassing all notification categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Session lifecycle and connection supervision events
    Session(SessionEvent),
    /// Network quality classification events
    Quality(QualityEvent),
    /// Live-edge latency classification events
    Latency(LatencyEvent),
    /// Hardware acceleration events
    Accel(AccelEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Session(e) => e.description(),
            CoreEvent::Quality(e) => e.description(),
            CoreEvent::Latency(e) => e.description(),
            CoreEvent::Accel(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Session(SessionEvent::ReconnectFailed) => EventSeverity::Error,
            CoreEvent::Session(SessionEvent::Fault { .. }) => EventSeverity::Warning,
            CoreEvent::Session(SessionEvent::Reconnecting { .. }) => EventSeverity::Warning,
            CoreEvent::Latency(LatencyEvent::Emergency { .. }) => EventSeverity::Error,
            CoreEvent::Latency(LatencyEvent::Critical { .. }) => EventSeverity::Warning,
            CoreEvent::Quality(QualityEvent::NetworkQualityChanged {
                level: QualityLevel::Poor,
                ..
            }) => EventSeverity::Warning,
            CoreEvent::Session(SessionEvent::Loaded { .. }) => EventSeverity::Info,
            CoreEvent::Accel(_) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    /// Debug-level events (verbose)
    Debug,
    /// Informational events
    Info,
    /// Warning events
    Warning,
    /// Error events
    Error,
}

// ============================================================================
// Session Events
// ============================================================================

/// Events related to session lifecycle and connection supervision.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event")]
pub enum SessionEvent {
    /// A new engine instance was created and told to load.
    Loaded {
        /// The media source URL.
        url: String,
    },
    /// A retry was scheduled after a fault.
    Reconnecting {
        /// 1-based ordinal of the upcoming attempt.
        attempt: u32,
        /// The configured retry ceiling.
        max_retries: u32,
        /// Backoff delay before the attempt fires, milliseconds.
        delay_ms: u64,
    },
    /// The retry budget is exhausted; the session is terminally failed.
    ReconnectFailed,
    /// A fault was observed (engine-reported or synthesized timeout).
    Fault {
        /// Broad fault classification.
        kind: FaultKind,
        /// Human-readable detail.
        message: String,
    },
    /// The session and its engine instance were torn down.
    Destroyed,
}

impl SessionEvent {
    fn description(&self) -> &str {
        match self {
            SessionEvent::Loaded { .. } => "Engine instance loaded",
            SessionEvent::Reconnecting { .. } => "Reconnect scheduled",
            SessionEvent::ReconnectFailed => "Retry budget exhausted",
            SessionEvent::Fault { .. } => "Session fault",
            SessionEvent::Destroyed => "Session destroyed",
        }
    }
}

// ============================================================================
// Quality Events
// ============================================================================

/// Events related to network quality classification.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event")]
pub enum QualityEvent {
    /// The acted-upon quality level changed.
    NetworkQualityChanged {
        /// The newly acted-upon level.
        level: QualityLevel,
        /// Engine-declared stream bitrate, bits per second.
        bitrate_bps: u64,
        /// Sliding-window throughput estimate, bits per second.
        realtime_throughput_bps: u64,
        /// Normalized buffer headroom in `0.0..=1.0`.
        buffer_health: f64,
        /// Stall events observed since the last resume.
        stall_count: u32,
    },
}

impl QualityEvent {
    fn description(&self) -> &str {
        match self {
            QualityEvent::NetworkQualityChanged { .. } => "Network quality changed",
        }
    }
}

// ============================================================================
// Latency Events
// ============================================================================

/// Events related to live-edge latency classification.
///
/// One variant per severity level so subscribers can match on exactly the
/// transitions they care about.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event")]
pub enum LatencyEvent {
    /// Latency dropped back below the warning threshold.
    Normal {
        /// Estimated live-edge latency, seconds.
        latency_secs: f64,
    },
    /// Latency reached the warning threshold.
    Warning {
        /// Estimated live-edge latency, seconds.
        latency_secs: f64,
    },
    /// Latency reached the critical threshold.
    Critical {
        /// Estimated live-edge latency, seconds.
        latency_secs: f64,
    },
    /// Latency reached the emergency threshold.
    Emergency {
        /// Estimated live-edge latency, seconds.
        latency_secs: f64,
    },
    /// The engine exposes no config surface; an external owner must apply
    /// the profile.
    ProfileDeferred {
        /// Name of the control profile that should be applied.
        profile: String,
        /// The configuration patch that could not be applied directly.
        patch: EngineConfig,
    },
}

impl LatencyEvent {
    fn description(&self) -> &str {
        match self {
            LatencyEvent::Normal { .. } => "Latency back to normal",
            LatencyEvent::Warning { .. } => "Latency warning",
            LatencyEvent::Critical { .. } => "Latency critical",
            LatencyEvent::Emergency { .. } => "Latency emergency",
            LatencyEvent::ProfileDeferred { .. } => "Latency profile deferred to host",
        }
    }
}

// ============================================================================
// Acceleration Events
// ============================================================================

/// Events related to hardware acceleration detection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event")]
pub enum AccelEvent {
    /// Initial (or cached) detection facts.
    Info {
        /// The probe report.
        report: AccelerationReport,
    },
    /// Detection was re-run with different forcing flags.
    Changed {
        /// The new probe report.
        report: AccelerationReport,
        /// The active session must be reloaded for the change to take effect.
        reload_required: bool,
    },
}

impl AccelEvent {
    fn description(&self) -> &str {
        match self {
            AccelEvent::Info { .. } => "Hardware acceleration detected",
            AccelEvent::Changed { .. } => "Hardware acceleration changed",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to notifications.
///
/// Uses `tokio::sync::broadcast` internally, which provides:
/// - Multiple producers (clone the `EventBus`)
/// - Multiple consumers (each `subscribe()` creates a new receiver)
/// - Non-blocking sends (events are cloned for each subscriber)
/// - Lagging detection (slow subscribers get `RecvError::Lagged`)
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an
    /// error when there are none.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber to receive events.
    ///
    /// Each call creates an independent receiver that will receive all
    /// future events. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

/// Type alias for event filter functions.
type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A wrapper around `broadcast::Receiver` with filtering.
///
/// # Example
///
/// ```rust
/// use core_runtime::events::{EventBus, EventStream, CoreEvent};
///
/// let event_bus = EventBus::new(100);
/// let stream = EventStream::new(event_bus.subscribe())
///     .filter(|event| matches!(event, CoreEvent::Latency(_)));
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    /// Creates a new event stream from a receiver.
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Adds a filter predicate; only matching events are returned by `recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    /// Receives the next event that passes the filter.
    ///
    /// # Errors
    ///
    /// Returns `RecvError::Lagged(n)` if the subscriber fell behind by `n`
    /// events, `RecvError::Closed` if all senders were dropped.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;

            let Some(filter) = &self.filter else {
                return Ok(event);
            };

            if filter(&event) {
                return Ok(event);
            }
        }
    }

    /// Attempts to receive an event without blocking.
    ///
    /// Returns `None` if no matching events are currently available.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    let Some(filter) = &self.filter else {
                        return Some(Ok(event));
                    };

                    if filter(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

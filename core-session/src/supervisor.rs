//! # Connection Supervisor
//!
//! Tracks connect and data-arrival progress against two independent
//! timeout windows and decides, on every fault, between a backed-off
//! retry and terminal session failure.
//!
//! ## State machine
//!
//! ```text
//! Idle ──connect()──> Connecting ──telemetry──> Connected ──positive byte delta──> DataReceived
//!                         │                        │                                   │
//!                         └── timeout/fault ───────┴─────────── fault ─────────────────┘
//!                                        │
//!                          attempt < max ┤ attempt >= max
//!                                retry ──┘── Failed (terminal)
//! ```
//!
//! A positive byte delta forgives all prior failures (the attempt counter
//! resets to zero). Exhausting the budget is terminal: the supervisor never
//! self-heals past its ceiling, a fresh `load()` is the only way back.
//!
//! ## Backoff
//!
//! `delay = min(base * 2^attempt + uniform(0..1000ms), max)`. The attempt
//! counter increments when the retry is scheduled, so the next fault
//! computes a strictly larger base delay and the `attempt <= max_retries`
//! invariant holds at all times.

use crate::config::{RetryPolicy, SessionConfig};
use crate::sched::TaskSlot;
use bridge_traits::engine::{FaultInfo, FaultKind, TelemetrySample};
use core_runtime::events::{CoreEvent, EventBus, SessionEvent};
use parking_lot::Mutex;
use rand::Rng;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Upper bound of the random jitter added to every retry delay.
const RETRY_JITTER_MS: u64 = 1000;

/// Connection progress for the current engine instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPhase {
    /// No connection attempt in flight.
    Idle,
    /// Waiting for the first telemetry sample.
    Connecting,
    /// Transport-level telemetry arrived, no media bytes yet.
    Connected,
    /// At least one positive byte delta observed.
    DataReceived,
    /// Retry budget exhausted; terminal until a fresh `load()`.
    Failed,
}

/// Requests the supervisor sends back to the session coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCommand {
    /// Discard the current engine instance and create a new one from the
    /// same media source.
    Retry,
    /// The session failed terminally; release the engine instance.
    Teardown,
}

#[derive(Debug)]
struct SupervisorState {
    phase: ConnectionPhase,
    attempt: u32,
    connect_started: Option<Instant>,
    last_total_bytes: Option<u64>,
}

impl SupervisorState {
    fn new() -> Self {
        Self {
            phase: ConnectionPhase::Idle,
            attempt: 0,
            connect_started: None,
            last_total_bytes: None,
        }
    }
}

/// Supervises one connection at a time across engine recreations.
///
/// The supervisor owns two task slots: one shared by the two timeout
/// phases (only one phase is ever armed) and one for the pending retry.
pub struct ConnectionSupervisor {
    connection_timeout: Duration,
    data_timeout: Duration,
    retry: RetryPolicy,
    events: EventBus,
    commands: mpsc::UnboundedSender<SessionCommand>,
    state: Mutex<SupervisorState>,
    timeout_slot: TaskSlot,
    retry_slot: TaskSlot,
    weak: Weak<ConnectionSupervisor>,
}

impl ConnectionSupervisor {
    pub fn new(
        config: &SessionConfig,
        events: EventBus,
        commands: mpsc::UnboundedSender<SessionCommand>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            connection_timeout: config.connection_timeout,
            data_timeout: config.data_timeout,
            retry: config.retry.clone(),
            events,
            commands,
            state: Mutex::new(SupervisorState::new()),
            timeout_slot: TaskSlot::new(),
            retry_slot: TaskSlot::new(),
            weak: weak.clone(),
        })
    }

    /// Starts a connection attempt: records the start time, clears prior
    /// timers and arms the connect-phase timeout.
    pub fn connect(&self) {
        {
            let mut state = self.state.lock();
            state.phase = ConnectionPhase::Connecting;
            state.connect_started = Some(Instant::now());
            state.last_total_bytes = None;
        }
        self.retry_slot.cancel();
        self.arm_timeout(self.connection_timeout);
        debug!(timeout_ms = self.connection_timeout.as_millis() as u64, "connection attempt started");
    }

    /// Feeds one telemetry sample into the connection state machine.
    ///
    /// The first sample marks the connection `Connected` and re-arms the
    /// timeout for the data phase; the first positive byte delta marks it
    /// `DataReceived`, cancels all timeout timers and resets the attempt
    /// counter.
    pub fn handle_telemetry(&self, sample: &TelemetrySample) {
        let mut became_connected = false;
        let mut became_live = false;
        let elapsed;
        {
            let mut state = self.state.lock();
            if matches!(state.phase, ConnectionPhase::Idle | ConnectionPhase::Failed) {
                return;
            }

            let delta = sample
                .total_bytes
                .saturating_sub(state.last_total_bytes.unwrap_or(0));
            state.last_total_bytes = Some(sample.total_bytes);

            if state.phase == ConnectionPhase::Connecting {
                state.phase = ConnectionPhase::Connected;
                became_connected = true;
            }
            if delta > 0 && state.phase != ConnectionPhase::DataReceived {
                state.phase = ConnectionPhase::DataReceived;
                state.attempt = 0;
                became_live = true;
            }
            elapsed = state
                .connect_started
                .map(|t| t.elapsed())
                .unwrap_or_default();
        }

        if became_live {
            self.timeout_slot.cancel();
            info!(elapsed_ms = elapsed.as_millis() as u64, "first media data received");
        } else if became_connected {
            self.arm_timeout(self.data_timeout);
            info!(elapsed_ms = elapsed.as_millis() as u64, "transport connected");
        }
    }

    /// Routes a fault through the retry budget.
    ///
    /// Clears all pending timers, surfaces the fault, then either schedules
    /// a retry or declares the session terminally failed.
    pub fn handle_fault(&self, fault: &FaultInfo) {
        self.timeout_slot.cancel();
        self.retry_slot.cancel();

        self.events
            .emit(CoreEvent::Session(SessionEvent::Fault {
                kind: fault.kind,
                message: fault.message.clone(),
            }))
            .ok();

        let attempt = {
            let state = self.state.lock();
            if state.phase == ConnectionPhase::Failed {
                return;
            }
            state.attempt
        };

        if attempt < self.retry.max_retries {
            self.schedule_retry(attempt);
        } else {
            self.state.lock().phase = ConnectionPhase::Failed;
            warn!(
                attempts = attempt,
                "retry budget exhausted, giving up on this session"
            );
            self.events
                .emit(CoreEvent::Session(SessionEvent::ReconnectFailed))
                .ok();
            let _ = self.commands.send(SessionCommand::Teardown);
        }
    }

    /// Clears timers and counters without destroying the owning session.
    pub fn reset(&self) {
        self.halt();
        *self.state.lock() = SupervisorState::new();
    }

    /// Cancels all pending timers, leaving counters and phase untouched.
    pub fn halt(&self) {
        self.timeout_slot.cancel();
        self.retry_slot.cancel();
    }

    /// Current connection phase.
    pub fn phase(&self) -> ConnectionPhase {
        self.state.lock().phase
    }

    /// Retries scheduled so far for this connection (0-based, reset when
    /// data arrives).
    pub fn attempt(&self) -> u32 {
        self.state.lock().attempt
    }

    /// `true` once a transport-level telemetry sample has arrived.
    pub fn is_connected(&self) -> bool {
        matches!(
            self.phase(),
            ConnectionPhase::Connected | ConnectionPhase::DataReceived
        )
    }

    /// `true` while a retry timer is pending.
    pub fn has_pending_retry(&self) -> bool {
        self.retry_slot.is_armed()
    }

    fn arm_timeout(&self, window: Duration) {
        let weak = self.weak.clone();
        self.timeout_slot.spawn_after(window, move || {
            if let Some(supervisor) = weak.upgrade() {
                supervisor.on_timeout_elapsed(window);
            }
        });
    }

    fn on_timeout_elapsed(&self, window: Duration) {
        let message = {
            let state = self.state.lock();
            match state.phase {
                ConnectionPhase::Connecting => {
                    format!("no telemetry within {}ms", window.as_millis())
                }
                ConnectionPhase::Connected => {
                    format!("no media data within {}ms", window.as_millis())
                }
                _ => return,
            }
        };
        warn!(%message, "connection window elapsed");
        self.handle_fault(&FaultInfo::new(FaultKind::Timeout, message));
    }

    fn schedule_retry(&self, attempt: u32) {
        let jitter = Duration::from_millis(rand::thread_rng().gen_range(0..RETRY_JITTER_MS));
        let delay = self.retry.delay_with_jitter(attempt, jitter);

        info!(
            attempt = attempt + 1,
            max_retries = self.retry.max_retries,
            delay_ms = delay.as_millis() as u64,
            "scheduling reconnect"
        );
        self.events
            .emit(CoreEvent::Session(SessionEvent::Reconnecting {
                attempt: attempt + 1,
                max_retries: self.retry.max_retries,
                delay_ms: delay.as_millis() as u64,
            }))
            .ok();

        self.state.lock().attempt = attempt + 1;

        let weak = self.weak.clone();
        self.retry_slot.spawn_after(delay, move || {
            let Some(supervisor) = weak.upgrade() else {
                return;
            };
            {
                let mut state = supervisor.state.lock();
                state.phase = ConnectionPhase::Connecting;
                state.last_total_bytes = None;
            }
            let _ = supervisor.commands.send(SessionCommand::Retry);
        });
    }
}

// ============================================================================
// Tests
// ============================================================================

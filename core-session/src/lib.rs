//! # Session Resilience Module
//!
//! Keeps one long-lived live-media session alive and perceptually smooth on
//! top of a black-box streaming engine.
//!
//! ## Overview
//!
//! This crate contains the control components that sit between the engine
//! and the rest of the player:
//! - Connection supervision with timeout synthesis and capped
//!   exponential-backoff retry
//! - Network quality classification over a sliding telemetry window
//! - Live-edge latency governance with threshold hysteresis
//! - Hardware-acceleration detection and config tuning
//! - A session coordinator that owns the engine lifecycle and guarantees no
//!   timer or subscription survives a reload or teardown
//!
//! Components never share mutable state; they communicate through the
//! coordinator's wiring and the [`EventBus`](core_runtime::events::EventBus).

pub mod accel;
pub mod config;
pub mod error;
pub mod latency;
pub mod profiles;
pub mod quality;
pub mod sched;
pub mod session;
pub mod supervisor;

pub use error::{Result, SessionError};
pub use session::{CoordinatorDeps, SessionCoordinator};

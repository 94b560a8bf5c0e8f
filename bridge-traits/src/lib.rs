//! # Host Bridge Traits
//!
//! Contracts for the external collaborators the resilience core consumes.
//!
//! ## Overview
//!
//! This crate defines the seam between the session-control logic and the
//! components it supervises but does not implement. Each trait represents a
//! capability provided by the host player, with a different concrete
//! implementation per streaming backend or test harness.
//!
//! ## Traits
//!
//! ### Playback engine
//! - [`StreamingEngine`](engine::StreamingEngine) - Transport + decode black box: lifecycle, events, mutable config
//! - [`EngineFactory`](engine::EngineFactory) - Creates a fresh engine instance for every (re)connect
//!
//! ### Presentation
//! - [`RenderSurface`](surface::RenderSurface) - Read-only playback position, buffered range, stall signals
//!
//! ### Capability detection
//! - [`CapabilityProbe`](probe::CapabilityProbe) - Synchronous hardware-acceleration facts
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//!
//! ## Error Handling
//!
//! All fallible bridge operations return [`BridgeError`](error::BridgeError).
//! An engine that lacks a capability reports
//! [`BridgeError::Unsupported`](error::BridgeError::Unsupported) instead of
//! panicking, so callers can degrade per their own policy.

pub mod engine;
pub mod error;
pub mod probe;
pub mod surface;
pub mod time;

pub use error::{BridgeError, Result};

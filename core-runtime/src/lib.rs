//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the playback resilience
//! core:
//! - Logging and tracing infrastructure
//! - Notification channel (event bus) and its event vocabulary
//!
//! ## Overview
//!
//! This crate contains the runtime utilities the session-control components
//! depend on. It establishes the logging conventions and the event
//! broadcasting mechanism used throughout the system. The event bus is a
//! value the host constructs and injects; nothing here is a process-wide
//! singleton, so tests can observe a component through a private bus.

pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};

//! # Session Error Types

use bridge_traits::BridgeError;
use thiserror::Error;

/// Errors that can occur while coordinating a playback session.
#[derive(Error, Debug)]
pub enum SessionError {
    /// The session configuration failed validation.
    #[error("Invalid session configuration: {0}")]
    InvalidConfig(String),

    /// An operation required an active session but none exists.
    #[error("No active session")]
    NoActiveSession,

    /// A bridge collaborator (engine, probe) failed.
    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),
}

impl SessionError {
    /// Returns `true` if the operation may succeed when repeated.
    pub fn is_transient(&self) -> bool {
        match self {
            SessionError::Bridge(e) => e.is_transient(),
            _ => false,
        }
    }
}

/// Result type for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;

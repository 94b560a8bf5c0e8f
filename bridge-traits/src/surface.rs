//! Render surface contract.
//!
//! The surface is where decoded media lands. The resilience core only ever
//! reads two numbers from it (playback position and buffered upper bound)
//! and listens for stall/resume transitions; rendering itself is out of
//! scope.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Playback continuity transitions reported by the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackSignal {
    /// Playback halted waiting for data.
    Stalled,
    /// Playback resumed after a stall.
    Resumed,
}

/// Read-only view of the playback position and buffer state.
///
/// Implementations wrap whatever the host uses to present media (a video
/// element, a platform player view). All methods are cheap reads; none may
/// block.
pub trait RenderSurface: Send + Sync {
    /// Current playback position in seconds.
    fn current_position(&self) -> f64;

    /// Upper bound of the buffered range in seconds, or `None` when nothing
    /// is buffered.
    fn buffered_upper_bound(&self) -> Option<f64>;

    /// Subscribes to stall/resume transitions.
    fn signals(&self) -> broadcast::Receiver<PlaybackSignal>;
}

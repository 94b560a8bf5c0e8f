use thiserror::Error;

/// Errors surfaced across the host bridge boundary.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// The engine rejected or failed a lifecycle operation.
    #[error("Engine operation failed: {0}")]
    Engine(String),

    /// The engine does not expose the requested capability.
    #[error("Capability not supported: {0}")]
    Unsupported(String),

    /// The capability probe could not produce a report.
    #[error("Probe failed: {0}")]
    Probe(String),
}

impl BridgeError {
    /// Returns `true` if the operation may be retried against the same instance.
    pub fn is_transient(&self) -> bool {
        matches!(self, BridgeError::Engine(_))
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;

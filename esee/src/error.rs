//! High-level error types

use std::time::Duration;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The listening endpoint could not be bound
    #[error("Listener failed to start: {0}")]
    Startup(#[source] esee_transport::Error),

    /// No connection or no data before the deadline
    #[error("No response from device within {0:?}")]
    Timeout(Duration),

    /// Caller gave up while waiting
    #[error("Exchange cancelled")]
    Cancelled,

    /// I/O failure on an accepted connection
    #[error("Transport error: {0}")]
    Transport(#[from] esee_transport::Error),

    #[error("Core error: {0}")]
    Core(#[from] esee_core::Error),

    #[error("Invalid request: {0}")]
    Types(#[from] esee_types::Error),
}

impl Error {
    /// No result was obtained from the device (timeout, cancellation or I/O)
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_) | Self::Cancelled | Self::Transport(_)
        )
    }

    /// The bridge itself could not start listening
    pub fn is_startup_failure(&self) -> bool {
        matches!(self, Self::Startup(_))
    }
}

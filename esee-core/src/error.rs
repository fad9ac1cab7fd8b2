//! Error types for esee-core

/// Result type alias for esee-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Listener lifecycle transition not allowed from the current state
    #[error("Invalid listener state: {0}")]
    InvalidSessionState(String),

    /// Configuration value out of range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

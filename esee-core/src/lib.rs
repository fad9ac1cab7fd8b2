//! # esee-core
//!
//! Core pieces of the E-SEE bridge that involve no I/O:
//! - Device report parsing
//! - Listener lifecycle state
//! - Exchange timing configuration
//! - Protocol constants

pub mod config;
pub mod constants;
pub mod error;
pub mod report;
pub mod session;

pub use config::BridgeConfig;
pub use error::{Error, Result};
pub use report::parse_report;
pub use session::{ListenerState, SessionState};

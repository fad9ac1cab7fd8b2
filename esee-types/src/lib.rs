//! Type definitions for the E-SEE bridge

pub mod bridge_info;
pub mod error;
pub mod patient;

pub use bridge_info::BridgeInfo;
pub use error::{Error, Result};
pub use patient::{PatientRequest, PatientResult, TestResult};

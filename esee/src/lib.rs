//! # esee
//!
//! Session manager for E-SEE refraction devices reached over a serial
//! (RFCOMM) link.
//!
//! The device dials in to the bridge. For every patient the bridge accepts a
//! connection, writes the patient id, accepts the connection carrying the
//! report, reads it and parses it into a [`PatientResult`]. Exchanges are
//! serialized: only one patient is in flight at a time.
//!
//! ## Quick Start
//!
//! ```no_run
//! use esee::{Bridge, CancellationToken, PatientRequest, TcpSerialListener};
//!
//! #[tokio::main]
//! async fn main() -> esee::Result<()> {
//!     let bridge = Bridge::new(TcpSerialListener::new("0.0.0.0:0"));
//!
//!     let info = bridge.info().await?;
//!     println!("{}", info);
//!
//!     let cancel = CancellationToken::new();
//!     let result = bridge
//!         .send_and_receive(&PatientRequest::new("10123456"), &cancel)
//!         .await?;
//!     println!("{}", result);
//!
//!     bridge.shutdown().await
//! }
//! ```

pub mod bridge;
pub mod error;
mod exchange;
pub mod host;

// Re-exports
pub use bridge::Bridge;
pub use error::{Error, Result};
pub use tokio_util::sync::CancellationToken;

// Re-export types
pub use esee_core::{parse_report, BridgeConfig, SessionState};
pub use esee_transport::{
    Connection, Listener, MemoryDevice, MemoryListener, MemoryPeer, PeerOptions, TcpSerialListener,
};
pub use esee_types::{BridgeInfo, PatientRequest, PatientResult, TestResult};

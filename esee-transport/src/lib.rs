//! Transport layer for the E-SEE bridge
//!
//! The device dials in over a serial (RFCOMM) link. The bridge only needs a
//! listening endpoint it can poll for inbound connections and a byte stream
//! per connection; these traits describe that surface.

pub mod error;
pub mod memory;
pub mod tcp;

pub use error::{Error, Result};
pub use memory::{MemoryConnection, MemoryDevice, MemoryListener, MemoryPeer, PeerOptions};
pub use tcp::{TcpConnection, TcpSerialListener};

use async_trait::async_trait;

/// Listening endpoint the device connects to
#[async_trait]
pub trait Listener: Send + Sync {
    /// Bind the endpoint and return the assigned channel number
    async fn bind(&mut self) -> Result<u16>;

    /// Check for a pending inbound connection without blocking
    async fn pending(&mut self) -> Result<bool>;

    /// Accept the next inbound connection
    async fn accept(&mut self) -> Result<Box<dyn Connection>>;

    /// Stop listening and release the endpoint
    async fn shutdown(&mut self) -> Result<()>;
}

/// Accepted byte stream to the device
#[async_trait]
pub trait Connection: Send + Sync {
    fn can_read(&self) -> bool;

    fn can_write(&self) -> bool;

    /// Check for readable bytes without blocking
    ///
    /// Also returns `true` when the peer has closed, in which case the next
    /// `read` returns 0.
    async fn data_available(&mut self) -> Result<bool>;

    /// Write all bytes and flush
    async fn write_all(&mut self, data: &[u8]) -> Result<()>;

    /// Read into `buf`, returning the number of bytes read (0 on EOF)
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Close the stream
    async fn close(&mut self) -> Result<()>;

    /// Get remote address
    fn peer_addr(&self) -> String;
}

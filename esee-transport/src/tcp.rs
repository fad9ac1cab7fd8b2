//! TCP transport
//!
//! Serial gateways (an `rfcomm` relay, `socat`, a USB-serial server) expose
//! the device's RFCOMM stream as a TCP socket. The listener binds a TCP port
//! and reports it as the channel number.

use std::future::poll_fn;
use std::net::SocketAddr;
use std::task::Poll;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, trace, warn};

use crate::{error::*, Connection, Listener};

/// TCP listener standing in for the RFCOMM service endpoint
pub struct TcpSerialListener {
    addr: String,
    listener: Option<TcpListener>,
    ready: Option<(TcpStream, SocketAddr)>,
}

impl TcpSerialListener {
    /// Create new listener; `"0.0.0.0:0"` lets the OS assign the port
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            listener: None,
            ready: None,
        }
    }

    pub fn is_bound(&self) -> bool {
        self.listener.is_some()
    }
}

#[async_trait]
impl Listener for TcpSerialListener {
    async fn bind(&mut self) -> Result<u16> {
        if self.is_bound() {
            return Err(Error::AlreadyBound);
        }

        let listener = TcpListener::bind(&self.addr).await.map_err(|e| {
            warn!("Failed to bind {}: {}", self.addr, e);
            Error::Io(e)
        })?;
        let local = listener.local_addr()?;

        info!("Serial gateway listening on {}", local);

        self.listener = Some(listener);
        Ok(local.port())
    }

    async fn pending(&mut self) -> Result<bool> {
        if self.ready.is_some() {
            return Ok(true);
        }

        let listener = self.listener.as_ref().ok_or(Error::NotBound)?;

        // Poll accept once; a ready socket is kept for the next accept()
        match poll_fn(|cx| Poll::Ready(listener.poll_accept(cx))).await {
            Poll::Ready(Ok(accepted)) => {
                trace!("Inbound connection pending from {}", accepted.1);
                self.ready = Some(accepted);
                Ok(true)
            }
            Poll::Ready(Err(e)) => Err(Error::Io(e)),
            Poll::Pending => Ok(false),
        }
    }

    async fn accept(&mut self) -> Result<Box<dyn Connection>> {
        let (stream, peer) = match self.ready.take() {
            Some(accepted) => accepted,
            None => {
                let listener = self.listener.as_ref().ok_or(Error::NotBound)?;
                listener.accept().await?
            }
        };

        debug!("Accepted connection from {}", peer);

        Ok(Box::new(TcpConnection::new(stream, peer)))
    }

    async fn shutdown(&mut self) -> Result<()> {
        self.ready = None;
        if let Some(listener) = self.listener.take() {
            debug!("Closing serial gateway on {:?}", listener.local_addr().ok());
        }
        Ok(())
    }
}

/// Accepted TCP stream
pub struct TcpConnection {
    stream: Option<TcpStream>,
    peer: SocketAddr,
}

impl TcpConnection {
    pub fn new(stream: TcpStream, peer: SocketAddr) -> Self {
        Self {
            stream: Some(stream),
            peer,
        }
    }
}

#[async_trait]
impl Connection for TcpConnection {
    fn can_read(&self) -> bool {
        self.stream.is_some()
    }

    fn can_write(&self) -> bool {
        self.stream.is_some()
    }

    async fn data_available(&mut self) -> Result<bool> {
        let stream = self.stream.as_ref().ok_or(Error::ConnectionClosed)?;

        match poll_fn(|cx| Poll::Ready(stream.poll_read_ready(cx))).await {
            Poll::Ready(Ok(())) => Ok(true),
            Poll::Ready(Err(e)) => Err(Error::Io(e)),
            Poll::Pending => Ok(false),
        }
    }

    async fn write_all(&mut self, data: &[u8]) -> Result<()> {
        let stream = self.stream.as_mut().ok_or(Error::ConnectionClosed)?;

        trace!("Sending {} bytes to {}", data.len(), self.peer);

        stream.write_all(data).await?;
        stream.flush().await?;

        Ok(())
    }

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let stream = self.stream.as_mut().ok_or(Error::ConnectionClosed)?;

        let n = stream.read(buf).await?;

        trace!("Received {} bytes from {}", n, self.peer);

        Ok(n)
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(mut stream) = self.stream.take() {
            debug!("Closing connection to {}", self.peer);

            // Graceful shutdown
            let _ = stream.shutdown().await;
        }
        Ok(())
    }

    fn peer_addr(&self) -> String {
        self.peer.to_string()
    }
}

impl Drop for TcpConnection {
    fn drop(&mut self) {
        if self.stream.is_some() {
            warn!("TCP connection to {} dropped without close", self.peer);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn bound_listener() -> (TcpSerialListener, u16) {
        let mut listener = TcpSerialListener::new("127.0.0.1:0");
        let port = listener.bind().await.unwrap();
        (listener, port)
    }

    #[tokio::test]
    async fn test_tcp_listener_create() {
        let listener = TcpSerialListener::new("127.0.0.1:0");
        assert!(!listener.is_bound());
    }

    #[tokio::test]
    async fn test_tcp_listener_bind_assigns_port() {
        let (listener, port) = bound_listener().await;
        assert!(port > 0);
        assert!(listener.is_bound());
    }

    #[tokio::test]
    async fn test_tcp_listener_bind_twice() {
        let (mut listener, _) = bound_listener().await;
        assert!(matches!(listener.bind().await, Err(Error::AlreadyBound)));
    }

    #[tokio::test]
    async fn test_tcp_listener_invalid_address() {
        let mut listener = TcpSerialListener::new("invalid..address");
        assert!(listener.bind().await.is_err());
    }

    #[tokio::test]
    async fn test_tcp_pending_requires_bind() {
        let mut listener = TcpSerialListener::new("127.0.0.1:0");
        assert!(matches!(listener.pending().await, Err(Error::NotBound)));
    }

    #[tokio::test]
    async fn test_tcp_pending_and_exchange() {
        let (mut listener, port) = bound_listener().await;
        assert!(!listener.pending().await.unwrap());

        let mut device = TcpStream::connect(("127.0.0.1", port)).await.unwrap();

        let mut pending = false;
        for _ in 0..50 {
            if listener.pending().await.unwrap() {
                pending = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(pending);

        let mut conn = listener.accept().await.unwrap();
        assert!(conn.can_write());
        conn.write_all(b"10123456").await.unwrap();

        let mut received = [0u8; 8];
        device.read_exact(&mut received).await.unwrap();
        assert_eq!(&received, b"10123456");

        device.write_all(b"ID: 10123456\n").await.unwrap();

        let mut available = false;
        for _ in 0..50 {
            if conn.data_available().await.unwrap() {
                available = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(available);

        let mut buf = [0u8; 64];
        let n = conn.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"ID: 10123456\n");

        conn.close().await.unwrap();
        assert!(!conn.can_read());
        listener.shutdown().await.unwrap();
        assert!(!listener.is_bound());
    }
}

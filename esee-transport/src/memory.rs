//! In-memory transport
//!
//! `MemoryListener` is bound by the bridge; the paired `MemoryDevice` plays
//! the instrument side: it opens connections, sends report text and sees the
//! bytes the bridge writes. Used by tests and for running without hardware.

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use parking_lot::Mutex;
use tokio::sync::{mpsc, Notify};
use tracing::{debug, trace};

use crate::{error::*, Connection, Listener};

/// Shared state between the listener and the device handle
#[derive(Debug, Default)]
struct Hub {
    queue: Mutex<VecDeque<MemoryConnection>>,
    arrived: Notify,
    binds: AtomicUsize,
    fail_binds: AtomicBool,
    next_id: AtomicU64,
}

/// In-memory listening endpoint
#[derive(Debug)]
pub struct MemoryListener {
    channel: u16,
    bound: bool,
    hub: Arc<Hub>,
}

impl MemoryListener {
    /// Create a listener that reports `channel` once bound, plus its device
    pub fn new(channel: u16) -> (Self, MemoryDevice) {
        let hub = Arc::new(Hub::default());
        let listener = Self {
            channel,
            bound: false,
            hub: Arc::clone(&hub),
        };
        (listener, MemoryDevice { hub })
    }
}

#[async_trait]
impl Listener for MemoryListener {
    async fn bind(&mut self) -> Result<u16> {
        self.hub.binds.fetch_add(1, Ordering::AcqRel);

        if self.hub.fail_binds.load(Ordering::Acquire) {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                "no serial adapter available",
            )));
        }
        if self.bound {
            return Err(Error::AlreadyBound);
        }

        self.bound = true;
        debug!("Memory listener bound on channel {}", self.channel);
        Ok(self.channel)
    }

    async fn pending(&mut self) -> Result<bool> {
        if !self.bound {
            return Err(Error::NotBound);
        }
        Ok(!self.hub.queue.lock().is_empty())
    }

    async fn accept(&mut self) -> Result<Box<dyn Connection>> {
        if !self.bound {
            return Err(Error::NotBound);
        }

        loop {
            let next = self.hub.queue.lock().pop_front();
            if let Some(conn) = next {
                trace!("Accepted {}", conn.peer_addr());
                return Ok(Box::new(conn));
            }
            self.hub.arrived.notified().await;
        }
    }

    async fn shutdown(&mut self) -> Result<()> {
        self.bound = false;
        self.hub.queue.lock().clear();
        Ok(())
    }
}

/// Capabilities of a simulated connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerOptions {
    pub readable: bool,
    pub writable: bool,
    /// Fail every write with a broken pipe
    pub fail_writes: bool,
}

impl Default for PeerOptions {
    fn default() -> Self {
        Self {
            readable: true,
            writable: true,
            fail_writes: false,
        }
    }
}

/// Device side of the in-memory transport
#[derive(Debug, Clone)]
pub struct MemoryDevice {
    hub: Arc<Hub>,
}

impl MemoryDevice {
    /// Open a readable, writable connection to the listener
    pub fn connect(&self) -> MemoryPeer {
        self.connect_with(PeerOptions::default())
    }

    pub fn connect_with(&self, options: PeerOptions) -> MemoryPeer {
        let (to_bridge, incoming) = mpsc::unbounded_channel();
        let (outgoing, from_bridge) = mpsc::unbounded_channel();
        let id = self.hub.next_id.fetch_add(1, Ordering::AcqRel);

        let conn = MemoryConnection {
            id,
            incoming,
            outgoing: Some(outgoing),
            stash: BytesMut::new(),
            options,
        };

        self.hub.queue.lock().push_back(conn);
        self.hub.arrived.notify_one();

        MemoryPeer {
            id,
            to_bridge,
            from_bridge,
        }
    }

    /// Number of bind attempts seen by the listener
    pub fn bind_count(&self) -> usize {
        self.hub.binds.load(Ordering::Acquire)
    }

    /// Connections waiting to be accepted
    pub fn pending_count(&self) -> usize {
        self.hub.queue.lock().len()
    }

    /// Make subsequent binds fail
    pub fn fail_binds(&self, fail: bool) {
        self.hub.fail_binds.store(fail, Ordering::Release);
    }
}

/// Device end of one connection
#[derive(Debug)]
pub struct MemoryPeer {
    id: u64,
    to_bridge: mpsc::UnboundedSender<Bytes>,
    from_bridge: mpsc::UnboundedReceiver<Bytes>,
}

impl MemoryPeer {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Send bytes to the bridge; false once the bridge closed its end
    pub fn send(&self, data: impl Into<Bytes>) -> bool {
        self.to_bridge.send(data.into()).is_ok()
    }

    /// Wait for the next chunk written by the bridge
    pub async fn recv(&mut self) -> Option<Bytes> {
        self.from_bridge.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Bytes> {
        self.from_bridge.try_recv().ok()
    }
}

/// Bridge end of one connection
#[derive(Debug)]
pub struct MemoryConnection {
    id: u64,
    incoming: mpsc::UnboundedReceiver<Bytes>,
    outgoing: Option<mpsc::UnboundedSender<Bytes>>,
    stash: BytesMut,
    options: PeerOptions,
}

impl MemoryConnection {
    /// Move queued chunks into the stash; true if the peer hung up
    fn drain_incoming(&mut self) -> bool {
        loop {
            match self.incoming.try_recv() {
                Ok(chunk) => self.stash.extend_from_slice(&chunk),
                Err(mpsc::error::TryRecvError::Empty) => return false,
                Err(mpsc::error::TryRecvError::Disconnected) => return true,
            }
        }
    }
}

#[async_trait]
impl Connection for MemoryConnection {
    fn can_read(&self) -> bool {
        self.options.readable && self.outgoing.is_some()
    }

    fn can_write(&self) -> bool {
        self.options.writable && self.outgoing.is_some()
    }

    async fn data_available(&mut self) -> Result<bool> {
        let hung_up = self.drain_incoming();
        Ok(!self.stash.is_empty() || hung_up)
    }

    async fn write_all(&mut self, data: &[u8]) -> Result<()> {
        if self.options.fail_writes {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "simulated write failure",
            )));
        }

        let outgoing = self.outgoing.as_ref().ok_or(Error::ConnectionClosed)?;
        outgoing
            .send(Bytes::copy_from_slice(data))
            .map_err(|_| Error::ConnectionClosed)
    }

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.outgoing.is_none() {
            return Err(Error::ConnectionClosed);
        }

        if self.stash.is_empty() {
            match self.incoming.recv().await {
                Some(chunk) => self.stash.extend_from_slice(&chunk),
                None => return Ok(0),
            }
        }

        let n = self.stash.len().min(buf.len());
        buf[..n].copy_from_slice(&self.stash.split_to(n));
        Ok(n)
    }

    async fn close(&mut self) -> Result<()> {
        self.outgoing = None;
        self.incoming.close();
        Ok(())
    }

    fn peer_addr(&self) -> String {
        format!("memory:{}", self.id)
    }
}

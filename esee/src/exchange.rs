//! One write-then-read cycle against the device
//!
//! Both phases accept their own connection: the device may reconnect between
//! receiving the patient id and sending the report. Every wait is a poll loop
//! bounded by the exchange deadline and interrupted by the caller's
//! cancellation token; I/O already started is never cut short.

use std::fmt;

use bytes::BytesMut;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use esee_core::constants::MAX_EXCHANGE_TIMEOUT;
use esee_core::BridgeConfig;
use esee_transport::{Connection, Listener};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    Send,
    Receive,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Send => f.write_str("send"),
            Phase::Receive => f.write_str("receive"),
        }
    }
}

pub(crate) struct Exchange<'a> {
    listener: &'a mut dyn Listener,
    config: &'a BridgeConfig,
    cancel: &'a CancellationToken,
    deadline: Instant,
}

impl<'a> Exchange<'a> {
    /// Start the deadline clock
    pub(crate) fn new(
        listener: &'a mut dyn Listener,
        config: &'a BridgeConfig,
        cancel: &'a CancellationToken,
    ) -> Self {
        let now = Instant::now();
        let deadline = now
            .checked_add(config.exchange_timeout)
            .unwrap_or(now + MAX_EXCHANGE_TIMEOUT);

        Self {
            listener,
            config,
            cancel,
            deadline,
        }
    }

    /// Send `id`, then wait for the report text
    pub(crate) async fn run(mut self, id: &[u8]) -> Result<String> {
        self.send_id(id).await?;
        self.receive_report().await
    }

    async fn send_id(&mut self, id: &[u8]) -> Result<()> {
        loop {
            let mut conn = self.accept(Phase::Send).await?;
            let peer = conn.peer_addr();

            if !conn.can_write() {
                debug!("Connection from {} is not writable, waiting for another", peer);
                release(conn).await;
                continue;
            }

            let outcome = conn.write_all(id).await;
            release(conn).await;

            if let Err(e) = outcome {
                warn!("Failed to send patient id to {}: {}", peer, e);
                return Err(Error::Transport(e));
            }

            info!("Sent patient id ({} bytes) to {}", id.len(), peer);
            return Ok(());
        }
    }

    async fn receive_report(&mut self) -> Result<String> {
        loop {
            let mut conn = self.accept(Phase::Receive).await?;
            let peer = conn.peer_addr();

            if !conn.can_read() {
                debug!("Connection from {} is not readable, waiting for another", peer);
                release(conn).await;
                continue;
            }

            let outcome = self.read_chunk(&mut *conn).await;
            release(conn).await;

            match outcome? {
                Some(report) => {
                    info!("Received report ({} chars) from {}", report.len(), peer);
                    return Ok(report);
                }
                None => debug!("{} closed without sending data, waiting for another", peer),
            }
        }
    }

    /// Poll for a pending connection and accept it
    async fn accept(&mut self, phase: Phase) -> Result<Box<dyn Connection>> {
        debug!("Waiting for device connection ({} phase)", phase);

        loop {
            self.check()?;

            if self.listener.pending().await? {
                let conn = self.listener.accept().await?;
                debug!("Accepted {} for {} phase", conn.peer_addr(), phase);
                return Ok(conn);
            }

            self.tick().await?;
        }
    }

    /// Wait for bytes, then read a single chunk
    ///
    /// The device sends no terminator, so the first chunk is the report.
    /// `None` means the peer closed before sending anything.
    async fn read_chunk(&self, conn: &mut dyn Connection) -> Result<Option<String>> {
        loop {
            self.check()?;

            if conn.data_available().await? {
                break;
            }

            self.tick().await?;
        }

        let mut buf = BytesMut::zeroed(self.config.read_chunk_size);
        let n = conn.read(&mut buf).await?;
        if n == 0 {
            return Ok(None);
        }
        buf.truncate(n);

        trace!("Read {} bytes", n);

        Ok(Some(String::from_utf8_lossy(&buf).trim().to_string()))
    }

    fn check(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        if Instant::now() >= self.deadline {
            return Err(Error::Timeout(self.config.exchange_timeout));
        }
        Ok(())
    }

    /// Sleep one poll interval, never past the deadline
    async fn tick(&self) -> Result<()> {
        let wake = Instant::now()
            .checked_add(self.config.poll_interval)
            .map_or(self.deadline, |wake| wake.min(self.deadline));

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Error::Cancelled),
            _ = sleep_until(wake) => Ok(()),
        }
    }
}

async fn release(mut conn: Box<dyn Connection>) {
    if let Err(e) = conn.close().await {
        warn!("Failed to close connection to {}: {}", conn.peer_addr(), e);
    }
}

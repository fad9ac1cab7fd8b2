//! Exchange timing configuration

use std::time::Duration;

use crate::constants::{
    BRIDGE_SERVICE_PORT, EXCHANGE_TIMEOUT, MAX_EXCHANGE_TIMEOUT, POLL_INTERVAL, READ_CHUNK_SIZE,
    SERVICE_NAME,
};
use crate::error::{Error, Result};

/// Bridge configuration
///
/// Defaults reproduce the device protocol timings: a readiness check every
/// 500 ms and at most 10 minutes per exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Interval between pending-connection and data-available checks
    pub poll_interval: Duration,

    /// Deadline for one whole exchange (send phase and receive phase)
    pub exchange_timeout: Duration,

    /// Capacity of the single read that captures the report
    pub read_chunk_size: usize,

    /// HTTP port reported in `BridgeInfo`
    pub service_port: u16,

    /// Name advertised by the listening endpoint
    pub service_name: String,
}

impl BridgeConfig {
    pub fn new() -> Self {
        Self {
            poll_interval: POLL_INTERVAL,
            exchange_timeout: EXCHANGE_TIMEOUT,
            read_chunk_size: READ_CHUNK_SIZE,
            service_port: BRIDGE_SERVICE_PORT,
            service_name: SERVICE_NAME.to_string(),
        }
    }

    /// Set poll interval
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set exchange deadline
    pub fn with_exchange_timeout(mut self, timeout: Duration) -> Self {
        self.exchange_timeout = timeout;
        self
    }

    /// Set read chunk size
    pub fn with_read_chunk_size(mut self, size: usize) -> Self {
        self.read_chunk_size = size;
        self
    }

    /// Set the HTTP port reported to callers
    pub fn with_service_port(mut self, port: u16) -> Self {
        self.service_port = port;
        self
    }

    /// Reject values that would make the poll loops spin or never finish
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval.is_zero() {
            return Err(Error::InvalidConfig("poll interval must be non-zero".into()));
        }
        if self.exchange_timeout < self.poll_interval {
            return Err(Error::InvalidConfig(format!(
                "exchange timeout ({:?}) shorter than poll interval ({:?})",
                self.exchange_timeout, self.poll_interval
            )));
        }
        if self.exchange_timeout > MAX_EXCHANGE_TIMEOUT {
            return Err(Error::InvalidConfig(format!(
                "exchange timeout ({:?}) exceeds maximum ({:?})",
                self.exchange_timeout, MAX_EXCHANGE_TIMEOUT
            )));
        }
        if self.read_chunk_size == 0 {
            return Err(Error::InvalidConfig("read chunk size must be non-zero".into()));
        }
        Ok(())
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self::new()
    }
}

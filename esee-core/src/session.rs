//! Listener lifecycle state
//!
//! The listening endpoint moves `Stopped -> Starting -> Listening` and only
//! returns to `Stopped` on explicit shutdown or a failed bind. The state also
//! records the serial channel assigned when the bind succeeded.

use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;

use crate::error::{Error, Result};

/// Listener state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No endpoint bound
    Stopped,

    /// Bind in progress
    Starting,

    /// Endpoint bound and advertising its channel
    Listening,
}

/// Shared listener state
///
/// Thread-safe and can be cloned cheaply (Arc internally). Reads never block
/// behind an in-flight exchange.
#[derive(Debug, Clone)]
pub struct ListenerState {
    inner: Arc<ListenerStateInner>,
}

#[derive(Debug)]
struct ListenerStateInner {
    /// Assigned channel (0 when not listening)
    channel: AtomicU16,

    state: parking_lot::RwLock<SessionState>,
}

impl ListenerState {
    /// Create a stopped listener state
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ListenerStateInner {
                channel: AtomicU16::new(0),
                state: parking_lot::RwLock::new(SessionState::Stopped),
            }),
        }
    }

    pub fn state(&self) -> SessionState {
        *self.inner.state.read()
    }

    pub fn is_listening(&self) -> bool {
        matches!(self.state(), SessionState::Listening)
    }

    /// Channel number while listening
    pub fn channel(&self) -> Option<u16> {
        if self.is_listening() {
            Some(self.inner.channel.load(Ordering::Acquire))
        } else {
            None
        }
    }

    /// Claim the start transition
    pub fn begin_start(&self) -> Result<()> {
        let mut state = self.inner.state.write();

        if *state != SessionState::Stopped {
            return Err(Error::InvalidSessionState(format!(
                "Cannot start from state: {:?}",
                *state
            )));
        }

        *state = SessionState::Starting;
        Ok(())
    }

    /// Record a successful bind
    pub fn mark_listening(&self, channel: u16) -> Result<()> {
        let mut state = self.inner.state.write();

        if *state != SessionState::Starting {
            return Err(Error::InvalidSessionState(format!(
                "Cannot mark listening from state: {:?}",
                *state
            )));
        }

        self.inner.channel.store(channel, Ordering::Release);
        *state = SessionState::Listening;
        Ok(())
    }

    /// Roll back a failed bind
    pub fn abort_start(&self) {
        let mut state = self.inner.state.write();
        if *state == SessionState::Starting {
            *state = SessionState::Stopped;
        }
    }

    /// Return to `Stopped`
    pub fn stop(&self) {
        self.inner.channel.store(0, Ordering::Release);
        *self.inner.state.write() = SessionState::Stopped;
    }
}

impl Default for ListenerState {
    fn default() -> Self {
        Self::new()
    }
}

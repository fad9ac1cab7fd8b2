//! Bridge session manager

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use esee_core::{parse_report, BridgeConfig, ListenerState, SessionState};
use esee_transport::Listener;
use esee_types::{BridgeInfo, PatientRequest, PatientResult};

use crate::error::{Error, Result};
use crate::exchange::Exchange;
use crate::host;

/// E-SEE bridge
///
/// Owns the listening endpoint the device dials in to and runs one exchange
/// at a time against it. Share it behind an `Arc`; concurrent
/// [`send_and_receive`](Bridge::send_and_receive) calls queue in arrival
/// order.
///
/// # Examples
///
/// ```no_run
/// use esee::{Bridge, CancellationToken, PatientRequest, TcpSerialListener};
///
/// #[tokio::main]
/// async fn main() -> esee::Result<()> {
///     let bridge = Bridge::new(TcpSerialListener::new("0.0.0.0:0"));
///
///     let channel = bridge.start().await?;
///     println!("Device should dial channel {}", channel);
///
///     let cancel = CancellationToken::new();
///     let result = bridge
///         .send_and_receive(&PatientRequest::new("10123456"), &cancel)
///         .await?;
///     println!("OD: {:?}", result.right_eye_results);
///     Ok(())
/// }
/// ```
pub struct Bridge {
    /// Held for the whole of an exchange and for start/stop
    listener: Mutex<Box<dyn Listener>>,
    state: ListenerState,
    config: BridgeConfig,
}

impl Bridge {
    /// Create a bridge over `listener` with default timings
    pub fn new(listener: impl Listener + 'static) -> Self {
        Self::with_boxed(Box::new(listener))
    }

    pub fn with_boxed(listener: Box<dyn Listener>) -> Self {
        Self {
            listener: Mutex::new(listener),
            state: ListenerState::new(),
            config: BridgeConfig::default(),
        }
    }

    /// Set timing configuration
    pub fn with_config(mut self, config: BridgeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        self.state.state()
    }

    pub fn is_listening(&self) -> bool {
        self.state.is_listening()
    }

    /// Channel the device should dial, once listening
    pub fn channel(&self) -> Option<u16> {
        self.state.channel()
    }

    /// Ensure the endpoint is listening and return its channel
    ///
    /// Idempotent; concurrent first callers bind exactly once.
    pub async fn start(&self) -> Result<u16> {
        if let Some(channel) = self.state.channel() {
            return Ok(channel);
        }

        let mut listener = self.listener.lock().await;
        self.ensure_started(&mut **listener).await
    }

    /// Bridge identity and the channel the device should dial
    pub async fn info(&self) -> Result<BridgeInfo> {
        let channel = self.start().await?;

        info!("Listener is using channel {}", channel);

        let machine_name = host::machine_name();
        let ip_address = host::ipv4_address(&machine_name)
            .await
            .map(|ip| ip.to_string());

        Ok(BridgeInfo {
            machine_name,
            ip_address,
            bridge_service_port: self.config.service_port,
            listener_port: channel,
        })
    }

    /// Send the patient id to the device and wait for its report
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The request id cannot be transmitted
    /// - The listener cannot start (`Error::Startup`)
    /// - No connection or data arrives before the deadline (`Error::Timeout`)
    /// - `cancel` fires while waiting (`Error::Cancelled`)
    /// - A connection fails during write or read (`Error::Transport`)
    pub async fn send_and_receive(
        &self,
        request: &PatientRequest,
        cancel: &CancellationToken,
    ) -> Result<PatientResult> {
        request.validate()?;

        debug!("Exchange for patient {} queued", request.id);

        let mut listener = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            guard = self.listener.lock() => guard,
        };

        self.ensure_started(&mut **listener).await?;

        info!("Waiting for device to collect patient {}", request.id);

        let exchange = Exchange::new(&mut **listener, &self.config, cancel);
        let report = match exchange.run(request.wire_id()).await {
            Ok(report) => report,
            Err(e) => {
                warn!("Exchange for patient {} failed: {}", request.id, e);
                return Err(e);
            }
        };

        debug!("Report text: {:?}", report);

        let result = parse_report(&report);

        info!("Parsed {}", result);

        Ok(result)
    }

    /// Stop listening
    ///
    /// Waits for an in-flight exchange to finish. A later `start()` binds again.
    pub async fn shutdown(&self) -> Result<()> {
        let mut listener = self.listener.lock().await;

        if self.state.state() == SessionState::Stopped {
            return Ok(());
        }

        listener.shutdown().await?;
        self.state.stop();

        info!("Listener stopped");
        Ok(())
    }

    // Helper methods

    async fn ensure_started(&self, listener: &mut dyn Listener) -> Result<u16> {
        if let Some(channel) = self.state.channel() {
            return Ok(channel);
        }

        self.config.validate()?;
        self.state.begin_start()?;

        match listener.bind().await {
            Ok(channel) => {
                self.state.mark_listening(channel)?;
                info!(
                    "Listener '{}' started on channel {}",
                    self.config.service_name, channel
                );
                Ok(channel)
            }
            Err(e) => {
                self.state.abort_start();
                warn!("Listener failed to start: {}", e);
                Err(Error::Startup(e))
            }
        }
    }
}

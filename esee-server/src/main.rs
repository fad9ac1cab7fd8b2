//! E-SEE bridge HTTP service
//!
//! ```text
//! esee-server [OPTIONS]
//!
//! Options:
//!   --http-addr        <ADDR>  HTTP listen address      [default: 0.0.0.0:5200]
//!   --listen-addr      <ADDR>  Device listener address  [default: 0.0.0.0:0]
//!   --poll-interval-ms <MS>    Connection poll interval [default: 500]
//!   --timeout-secs     <SECS>  Exchange deadline        [default: 600]
//! ```
//!
//! Every option can also be set through the environment (`ESEE_HTTP_ADDR`,
//! `ESEE_LISTEN_ADDR`, `ESEE_POLL_INTERVAL_MS`, `ESEE_TIMEOUT_SECS`). Log
//! verbosity follows `RUST_LOG`.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use esee::{Bridge, BridgeConfig, TcpSerialListener};
use esee_server::{build_router, AppState};

#[derive(Debug, Parser)]
#[command(
    name = "esee-server",
    about = "HTTP bridge to E-SEE refraction devices",
    version
)]
struct Cli {
    /// Address the HTTP API listens on
    #[arg(long, default_value = "0.0.0.0:5200", env = "ESEE_HTTP_ADDR")]
    http_addr: SocketAddr,

    /// Address the device listener binds; port 0 picks a free one
    #[arg(long, default_value = "0.0.0.0:0", env = "ESEE_LISTEN_ADDR")]
    listen_addr: String,

    /// Connection and data poll interval in milliseconds
    #[arg(long, default_value_t = 500, env = "ESEE_POLL_INTERVAL_MS")]
    poll_interval_ms: u64,

    /// Deadline for one exchange in seconds
    #[arg(long, default_value_t = 600, env = "ESEE_TIMEOUT_SECS")]
    timeout_secs: u64,
}

impl Cli {
    fn bridge_config(&self) -> anyhow::Result<BridgeConfig> {
        let config = BridgeConfig::new()
            .with_poll_interval(Duration::from_millis(self.poll_interval_ms))
            .with_exchange_timeout(Duration::from_secs(self.timeout_secs))
            .with_service_port(self.http_addr.port());

        config.validate().context("invalid bridge timings")?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.bridge_config()?;

    info!(
        "Starting E-SEE bridge (poll {:?}, timeout {:?})",
        config.poll_interval, config.exchange_timeout
    );

    let bridge = Arc::new(
        Bridge::new(TcpSerialListener::new(cli.listen_addr.clone())).with_config(config),
    );

    // A failed start is retried by the first request that needs the listener
    match bridge.start().await {
        Ok(channel) => info!("Device listener ready on channel {}", channel),
        Err(e) => warn!("Device listener not started: {}", e),
    }

    let router = build_router(AppState::new(Arc::clone(&bridge)));
    let listener = tokio::net::TcpListener::bind(cli.http_addr)
        .await
        .with_context(|| format!("failed to bind HTTP address {}", cli.http_addr))?;

    info!("HTTP API listening on {}", listener.local_addr()?);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    bridge.shutdown().await?;
    info!("Bridge stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}

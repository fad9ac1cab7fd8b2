//! Host network identity

use std::net::{IpAddr, Ipv4Addr};

use tracing::debug;

/// Returns the machine's host name.
///
/// Tries `COMPUTERNAME` (Windows) first, then `HOSTNAME`, then
/// `/etc/hostname`, and falls back to `"localhost"`.
pub fn machine_name() -> String {
    std::env::var("COMPUTERNAME")
        .or_else(|_| std::env::var("HOSTNAME"))
        .ok()
        .or_else(|| {
            std::fs::read_to_string("/etc/hostname")
                .ok()
                .map(|name| name.trim().to_string())
        })
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}

/// Resolve `host` and pick an IPv4 address, preferring non-loopback ones
pub async fn ipv4_address(host: &str) -> Option<Ipv4Addr> {
    let addrs = match tokio::net::lookup_host((host, 0)).await {
        Ok(addrs) => addrs,
        Err(e) => {
            debug!("Could not resolve {}: {}", host, e);
            return None;
        }
    };

    pick_ipv4(addrs.map(|addr| addr.ip()))
}

fn pick_ipv4(addrs: impl Iterator<Item = IpAddr>) -> Option<Ipv4Addr> {
    let v4: Vec<Ipv4Addr> = addrs
        .filter_map(|ip| match ip {
            IpAddr::V4(v4) => Some(v4),
            IpAddr::V6(_) => None,
        })
        .collect();

    v4.iter()
        .find(|ip| !ip.is_loopback())
        .or_else(|| v4.first())
        .copied()
}

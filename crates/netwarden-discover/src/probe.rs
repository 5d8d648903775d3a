//! Host liveness probing.
//!
//! Liveness is one bounded ICMP echo via the system `ping` utility,
//! executed under `tokio::process::Command`. On a live host the local
//! neighbor table is read for a hardware address; the two steps stay in
//! this order because ARP entries only populate reliably after a
//! successful reachability exchange.

use std::net::Ipv4Addr;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use netwarden_core::types::normalize_mac;

use crate::error::{DiscoverError, Result};

/// Outcome of probing a single address. Ordinary unreachability is
/// `alive = false`, never an error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub alive: bool,
    pub mac: Option<String>,
}

/// Reachability check plus neighbor-table lookup, injected so tests can
/// simulate arbitrary up/down patterns without network access.
#[async_trait]
pub trait HostProbe: Send + Sync {
    async fn probe(&self, ip: Ipv4Addr) -> Result<ProbeOutcome>;
}

/// Production probe backed by the host `ping` and `ip`/`arp` utilities.
pub struct PingProbe {
    ping_path: String,
    timeout: Duration,
}

impl PingProbe {
    pub fn new(timeout: Duration) -> Self {
        Self {
            ping_path: "ping".to_string(),
            timeout,
        }
    }

    pub fn with_ping_path(mut self, path: impl Into<String>) -> Self {
        self.ping_path = path.into();
        self
    }

    /// Read the neighbor table for a hardware address. Absence of an entry
    /// is a normal outcome; utility failures degrade to `None`.
    async fn neighbor_mac(&self, ip: Ipv4Addr) -> Option<String> {
        let target = ip.to_string();

        if let Ok(output) = Command::new("ip")
            .args(["neigh", "show", target.as_str()])
            .output()
            .await
        {
            if output.status.success() {
                let stdout = String::from_utf8_lossy(&output.stdout);
                if let Some(mac) = parse_ip_neigh(&stdout) {
                    return Some(mac);
                }
            }
        }

        // Older hosts without iproute2 still carry net-tools arp.
        match Command::new("arp").args(["-an", target.as_str()]).output().await {
            Ok(output) if output.status.success() => {
                parse_arp(&String::from_utf8_lossy(&output.stdout))
            }
            Ok(_) => None,
            Err(e) => {
                tracing::debug!(ip = %ip, error = %e, "Neighbor table lookup unavailable");
                None
            }
        }
    }
}

#[async_trait]
impl HostProbe for PingProbe {
    async fn probe(&self, ip: Ipv4Addr) -> Result<ProbeOutcome> {
        let wait_secs = self.timeout.as_secs().max(1).to_string();

        let output = Command::new(&self.ping_path)
            .args(["-c", "1", "-W", wait_secs.as_str()])
            .arg(ip.to_string())
            .output()
            .await
            .map_err(|e| {
                DiscoverError::ProbeInfrastructure(format!(
                    "{} invocation failed: {e}",
                    self.ping_path
                ))
            })?;

        let alive = output.status.success();
        let mac = if alive { self.neighbor_mac(ip).await } else { None };

        tracing::trace!(ip = %ip, alive, mac = ?mac, "Probe complete");
        Ok(ProbeOutcome { alive, mac })
    }
}

/// Parse `ip neigh show <ip>` output:
/// `192.168.1.7 dev eth0 lladdr aa:bb:cc:dd:ee:ff REACHABLE`
fn parse_ip_neigh(stdout: &str) -> Option<String> {
    let mut tokens = stdout.split_whitespace();
    while let Some(token) = tokens.next() {
        if token == "lladdr" {
            return tokens.next().and_then(normalize_mac);
        }
    }
    None
}

/// Parse `arp -an <ip>` output:
/// `? (192.168.1.7) at aa:bb:cc:dd:ee:ff [ether] on en0`
fn parse_arp(stdout: &str) -> Option<String> {
    let mut tokens = stdout.split_whitespace();
    while let Some(token) = tokens.next() {
        if token == "at" {
            return tokens.next().and_then(normalize_mac);
        }
    }
    None
}

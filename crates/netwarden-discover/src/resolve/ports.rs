//! Well-known-port probing and device-type inference.
//!
//! Port probing is the dominant latency cost of identification, so the
//! per-host sweep runs under an overall budget; a slow host yields
//! whatever was confirmed before the budget elapsed.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use netwarden_core::types::{DeviceType, PortService};

/// The fixed probe list. A port is "open" only on a successful connect.
pub const WELL_KNOWN_PORTS: &[(u16, &str)] = &[
    (21, "ftp"),
    (22, "ssh"),
    (23, "telnet"),
    (25, "smtp"),
    (53, "dns"),
    (80, "http"),
    (443, "https"),
    (445, "smb"),
    (3389, "rdp"),
    (8080, "http-alt"),
];

/// Probe every well-known port concurrently, bounded per connect and by an
/// overall budget.
pub async fn scan_well_known(
    ip: Ipv4Addr,
    per_port: Duration,
    budget: Duration,
) -> Vec<PortService> {
    let probes: Vec<(u16, String)> = WELL_KNOWN_PORTS
        .iter()
        .map(|&(port, service)| (port, service.to_string()))
        .collect();

    let sweep = async {
        let mut open: Vec<PortService> = stream::iter(probes)
            .map(|(port, service)| async move {
                let addr = SocketAddr::new(IpAddr::V4(ip), port);
                match timeout(per_port, TcpStream::connect(addr)).await {
                    Ok(Ok(_)) => Some(PortService { port, service }),
                    Ok(Err(_)) | Err(_) => None,
                }
            })
            .buffer_unordered(WELL_KNOWN_PORTS.len())
            .filter_map(|result| async move { result })
            .collect()
            .await;
        open.sort_by_key(|p| p.port);
        open
    };

    match timeout(budget, sweep).await {
        Ok(open) => open,
        Err(_) => {
            tracing::debug!(ip = %ip, "Port sweep exceeded budget");
            Vec::new()
        }
    }
}

/// Infer a coarse device type from the open-port signature.
pub fn classify(open_ports: &[PortService]) -> DeviceType {
    let has = |p: u16| open_ports.iter().any(|s| s.port == p);
    let web = has(80) || has(443) || has(8080);

    if has(53) {
        // DNS service on a LAN host is almost always the gateway.
        DeviceType::Router
    } else if has(25) {
        DeviceType::Server
    } else if has(3389) {
        DeviceType::Workstation
    } else if has(445) && web {
        DeviceType::NasStorage
    } else if has(445) {
        DeviceType::Workstation
    } else if has(22) && web {
        DeviceType::Server
    } else {
        DeviceType::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ports(list: &[u16]) -> Vec<PortService> {
        list.iter()
            .map(|&port| PortService {
                port,
                service: String::new(),
            })
            .collect()
    }

    #[test]
    fn dns_host_classifies_as_router() {
        assert_eq!(classify(&ports(&[53, 80])), DeviceType::Router);
        assert_eq!(classify(&ports(&[53])), DeviceType::Router);
    }

    #[test]
    fn rdp_host_classifies_as_workstation() {
        assert_eq!(classify(&ports(&[445, 3389])), DeviceType::Workstation);
    }

    #[test]
    fn smb_with_web_classifies_as_nas() {
        assert_eq!(classify(&ports(&[80, 443, 445])), DeviceType::NasStorage);
    }

    #[test]
    fn ssh_with_web_classifies_as_server() {
        assert_eq!(classify(&ports(&[22, 80, 443])), DeviceType::Server);
        assert_eq!(classify(&ports(&[25])), DeviceType::Server);
    }

    #[test]
    fn no_signature_stays_unknown() {
        assert_eq!(classify(&ports(&[])), DeviceType::Unknown);
        assert_eq!(classify(&ports(&[21])), DeviceType::Unknown);
    }
}

//! Name resolution: reverse DNS, then NetBIOS, then mDNS.
//!
//! Each attempt is independently bounded and failures are swallowed;
//! absence of a name is a normal outcome. The NetBIOS node-status query
//! follows RFC 1002; the mDNS path is a reverse PTR query on the
//! well-known multicast group.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::time::timeout;

const NETBIOS_PORT: u16 = 137;
const MDNS_GROUP: &str = "224.0.0.251:5353";

/// Try resolution strategies in order until one yields a name.
pub async fn resolve_name(ip: Ipv4Addr, per_attempt: Duration) -> Option<String> {
    if let Some(name) = reverse_dns(ip, per_attempt).await {
        return Some(name);
    }
    if let Some(name) = netbios_name(ip, per_attempt).await {
        return Some(name);
    }
    mdns_name(ip, per_attempt).await
}

/// Reverse-DNS PTR lookup. The resolver call is blocking, so it runs on
/// the blocking pool under a timeout.
async fn reverse_dns(ip: Ipv4Addr, bound: Duration) -> Option<String> {
    let addr = IpAddr::V4(ip);
    let task = tokio::task::spawn_blocking(move || dns_lookup::lookup_addr(&addr).ok());

    match timeout(bound, task).await {
        Ok(Ok(Some(name))) if name != addr.to_string() => Some(name),
        Ok(_) => None,
        Err(_) => {
            tracing::debug!(ip = %ip, "Reverse DNS lookup timed out");
            None
        }
    }
}

/// NetBIOS node-status query (NBSTAT, UDP 137).
async fn netbios_name(ip: Ipv4Addr, bound: Duration) -> Option<String> {
    let attempt = async {
        let socket = UdpSocket::bind("0.0.0.0:0").await.ok()?;
        let dest = SocketAddr::new(IpAddr::V4(ip), NETBIOS_PORT);
        socket.send_to(&netbios_status_query(), dest).await.ok()?;

        let mut response = [0u8; 512];
        let (len, _) = socket.recv_from(&mut response).await.ok()?;
        parse_netbios_status(&response[..len])
    };

    match timeout(bound, attempt).await {
        Ok(name) => name,
        Err(_) => None,
    }
}

/// mDNS reverse PTR query on the multicast group.
async fn mdns_name(ip: Ipv4Addr, bound: Duration) -> Option<String> {
    let attempt = async {
        let socket = UdpSocket::bind("0.0.0.0:0").await.ok()?;
        let query = dns_ptr_query(ip);
        socket.send_to(&query, MDNS_GROUP).await.ok()?;

        let mut response = [0u8; 1024];
        let (len, _) = socket.recv_from(&mut response).await.ok()?;
        parse_ptr_response(&response[..len])
    };

    match timeout(bound, attempt).await {
        Ok(name) => name,
        Err(_) => None,
    }
}

/// Build an RFC 1002 node-status request for the wildcard name `*`.
fn netbios_status_query() -> Vec<u8> {
    let mut query = Vec::with_capacity(50);
    query.extend_from_slice(&0x0001u16.to_be_bytes()); // transaction ID
    query.extend_from_slice(&[0x00, 0x00]); // flags: query
    query.extend_from_slice(&[0x00, 0x01]); // questions: 1
    query.extend_from_slice(&[0x00, 0x00, 0x00, 0x00, 0x00, 0x00]); // an/ns rrs

    // First-level encoding of "*" padded to 16 bytes: each byte becomes
    // two nibble characters offset from 'A'.
    query.push(32);
    let name = b"*               ";
    for &b in name {
        query.push(((b >> 4) & 0x0F) + b'A');
        query.push((b & 0x0F) + b'A');
    }
    query.push(0x00);
    query.extend_from_slice(&[0x00, 0x21]); // type: NBSTAT
    query.extend_from_slice(&[0x00, 0x01]); // class: IN
    query
}

/// Parse the first name entry out of a node-status response.
fn parse_netbios_status(response: &[u8]) -> Option<String> {
    // Header (12) + question (38) + RR preamble puts the name count at 56
    // and the first 18-byte entry (15-byte name, suffix, flags) at 57.
    if response.len() < 57 {
        return None;
    }
    let num_names = response[56] as usize;
    if num_names == 0 || response.len() < 57 + 18 {
        return None;
    }

    let name_bytes = &response[57..57 + 15];
    let name = String::from_utf8_lossy(name_bytes).trim().to_string();
    (!name.is_empty()).then_some(name)
}

/// Build a DNS PTR query for `d.c.b.a.in-addr.arpa` with the mDNS
/// unicast-response bit set.
fn dns_ptr_query(ip: Ipv4Addr) -> Vec<u8> {
    let o = ip.octets();
    let qname = format!("{}.{}.{}.{}.in-addr.arpa", o[3], o[2], o[1], o[0]);

    let mut query = Vec::with_capacity(12 + qname.len() + 6);
    query.extend_from_slice(&[0x00, 0x00]); // transaction ID 0 per mDNS
    query.extend_from_slice(&[0x00, 0x00]); // flags: standard query
    query.extend_from_slice(&[0x00, 0x01]); // questions: 1
    query.extend_from_slice(&[0x00, 0x00, 0x00, 0x00, 0x00, 0x00]); // an/ns rrs

    for label in qname.split('.') {
        query.push(label.len() as u8);
        query.extend_from_slice(label.as_bytes());
    }
    query.push(0x00);
    query.extend_from_slice(&[0x00, 0x0C]); // type: PTR
    query.extend_from_slice(&[0x80, 0x01]); // class: IN, unicast response
    query
}

/// Pull the PTR target out of the first answer record and strip the
/// `.local` suffix.
fn parse_ptr_response(response: &[u8]) -> Option<String> {
    if response.len() < 12 {
        return None;
    }
    let questions = u16::from_be_bytes([response[4], response[5]]) as usize;
    let answers = u16::from_be_bytes([response[6], response[7]]) as usize;
    if answers == 0 {
        return None;
    }

    let mut pos = 12;
    for _ in 0..questions {
        let (_, next) = read_dns_name(response, pos)?;
        pos = next + 4; // qtype + qclass
    }

    let (_, next) = read_dns_name(response, pos)?;
    pos = next;
    if response.len() < pos + 10 {
        return None;
    }
    let rtype = u16::from_be_bytes([response[pos], response[pos + 1]]);
    pos += 10; // type + class + ttl + rdlength
    if rtype != 0x000C {
        return None;
    }

    let (target, _) = read_dns_name(response, pos)?;
    let name = target
        .strip_suffix(".local")
        .unwrap_or(&target)
        .to_string();
    (!name.is_empty()).then_some(name)
}

/// Decode a DNS name at `pos`, following compression pointers. Returns
/// the name and the offset just past it in the original stream.
fn read_dns_name(buf: &[u8], start: usize) -> Option<(String, usize)> {
    let mut labels = Vec::new();
    let mut pos = start;
    let mut next = start;
    let mut jumped = false;
    let mut hops = 0;

    loop {
        let len = *buf.get(pos)? as usize;
        if len == 0 {
            if !jumped {
                next = pos + 1;
            }
            break;
        }
        if len & 0xC0 == 0xC0 {
            let ptr = ((len & 0x3F) << 8) | *buf.get(pos + 1)? as usize;
            if !jumped {
                next = pos + 2;
            }
            jumped = true;
            pos = ptr;
            hops += 1;
            if hops > 8 {
                return None;
            }
            continue;
        }
        let label = buf.get(pos + 1..pos + 1 + len)?;
        labels.push(String::from_utf8_lossy(label).to_string());
        pos += len + 1;
    }

    Some((labels.join("."), next))
}

//! # Probe Target Model
//!
//! A probe target is an IPv4 address plus the TCP port a peer listens on.
//!
//! Targets reach the scanner as `"ip:port"` strings. The monitor derives them
//! from the multiaddresses a beacon node reports for its connected peers,
//! e.g. `/ip4/188.166.75.68/tcp/13000/p2p/16Uiu2...` becomes `188.166.75.68:13000`.

use std::fmt;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TargetError {
    #[error("'{0}' is not a valid ip:port address")]
    Malformed(String),
    #[error("'{0}' is an IPv6 address, only IPv4 peers can be probed")]
    Ipv6Unsupported(String),
    #[error("'{0}' is not an /ip4/<addr>/tcp/<port> multiaddress")]
    Multiaddr(String),
}

/// A single peer to probe.
///
/// The `label` is the string the caller handed in and is what results are
/// keyed by, so callers can look their own input up in the latency map.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TargetHost {
    label: String,
    addr: SocketAddrV4,
}

impl TargetHost {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn addr(&self) -> SocketAddrV4 {
        self.addr
    }

    pub fn ip(&self) -> Ipv4Addr {
        *self.addr.ip()
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }
}

impl FromStr for TargetHost {
    type Err = TargetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed: &str = s.trim();
        match trimmed.parse::<SocketAddr>() {
            Ok(SocketAddr::V4(addr)) => Ok(Self {
                label: trimmed.to_string(),
                addr,
            }),
            Ok(SocketAddr::V6(_)) => Err(TargetError::Ipv6Unsupported(trimmed.to_string())),
            Err(_) => Err(TargetError::Malformed(trimmed.to_string())),
        }
    }
}

impl fmt::Display for TargetHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

/// Turns `/ip4/<addr>/tcp/<port>/...` into `"<addr>:<port>"`.
///
/// Only the 3rd and 5th slash-delimited components are used, anything after
/// the port (peer id, transport suffixes) is ignored.
pub fn multiaddr_to_host(multiaddr: &str) -> Result<String, TargetError> {
    let invalid = || TargetError::Multiaddr(multiaddr.to_string());
    let parts: Vec<&str> = multiaddr.trim().split('/').collect();

    match parts.as_slice() {
        ["", "ip4", addr, "tcp", port, ..] => {
            let ip: Ipv4Addr = addr.parse().map_err(|_| invalid())?;
            let port: u16 = port.parse().map_err(|_| invalid())?;
            Ok(SocketAddrV4::new(ip, port).to_string())
        }
        _ => Err(invalid()),
    }
}

/// Accepts either a multiaddress or a plain `ip:port` and returns `ip:port`
/// in canonical form, so both notations of one peer yield the same host.
pub fn peer_to_host(peer: &str) -> Result<String, TargetError> {
    let peer: &str = peer.trim();
    if peer.starts_with('/') {
        return multiaddr_to_host(peer);
    }
    TargetHost::from_str(peer).map(|target| target.addr.to_string())
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝

//! Hand-built frames for the latency scanner.
//!
//! Everything here is pure: functions take addressing data and return bytes
//! (or parse bytes into owned values). Putting frames on the wire is the
//! job of `e7mon-core`.

use std::net::Ipv4Addr;

use pnet::util::MacAddr;
use thiserror::Error;

pub mod arp;
pub mod ethernet;
pub mod ipv4;
pub mod tcp;

pub const ETH_HDR_LEN: usize = 14;
pub const IPV4_HDR_LEN: usize = 20;
pub const TCP_HDR_LEN: usize = 20;
pub const ARP_LEN: usize = 28;
pub const MIN_ETH_FRAME_NO_FCS: usize = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PacketError {
    #[error("buffer too small for the {0} layer")]
    Buffer(&'static str),
    #[error("could not read back the {0} layer to compute its checksum")]
    Checksum(&'static str),
}

/// Addressing shared by every frame the scanner emits.
///
/// Frames always leave through the default gateway, so the link-layer
/// destination is fixed for the lifetime of a scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SenderContext {
    pub src_mac: MacAddr,
    pub gateway_mac: MacAddr,
    pub src_addr: Ipv4Addr,
}

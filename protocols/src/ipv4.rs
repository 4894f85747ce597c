use std::net::Ipv4Addr;

use pnet::packet::ip::IpNextHeaderProtocol;
use pnet::packet::ipv4::{Ipv4Flags, MutableIpv4Packet, checksum};

use crate::{IPV4_HDR_LEN, PacketError};

pub const DEFAULT_TTL: u8 = 64;

/// First pass: every header field except the checksum.
///
/// `buf` must start at the IPv4 header and extend over the payload, the
/// checksum pass reads the header back from the same slice.
pub fn write_header(
    buf: &mut [u8],
    payload_len: usize,
    nxt_ptc: IpNextHeaderProtocol,
    src_addr: Ipv4Addr,
    dst_addr: Ipv4Addr,
) -> Result<(), PacketError> {
    let total_length: u16 =
        u16::try_from(IPV4_HDR_LEN + payload_len).map_err(|_| PacketError::Buffer("IPv4"))?;
    let mut ipv4 = MutableIpv4Packet::new(buf).ok_or(PacketError::Buffer("IPv4"))?;
    ipv4.set_version(4);
    ipv4.set_header_length(5);
    ipv4.set_dscp(0);
    ipv4.set_ecn(0);
    ipv4.set_total_length(total_length);
    ipv4.set_identification(rand::random());
    ipv4.set_flags(Ipv4Flags::DontFragment);
    ipv4.set_fragment_offset(0);
    ipv4.set_ttl(DEFAULT_TTL);
    ipv4.set_next_level_protocol(nxt_ptc);
    ipv4.set_source(src_addr);
    ipv4.set_destination(dst_addr);
    ipv4.set_checksum(0);
    Ok(())
}

/// Second pass: header checksum over the finished header.
pub fn fill_checksum(buf: &mut [u8]) -> Result<(), PacketError> {
    let mut ipv4 = MutableIpv4Packet::new(buf).ok_or(PacketError::Checksum("IPv4"))?;
    ipv4.set_checksum(0);
    let csm: u16 = checksum(&ipv4.to_immutable());
    ipv4.set_checksum(csm);
    Ok(())
}

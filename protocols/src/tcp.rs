//! TCP probe frames.
//!
//! A probe is a bare SYN sent through the gateway. Peers that listen answer
//! with a SYN-ACK, which we tear down again with an RST so they do not keep a
//! half-open connection around.
//!
//! Frames are serialized in two passes. The first writes headers innermost
//! layer first, so every length field is known before the layer that carries
//! it is written. The second computes the TCP checksum over the IPv4
//! pseudo-header read back from the finished IPv4 layer, then the IPv4
//! header checksum.

use std::net::{Ipv4Addr, SocketAddrV4};

use pnet::packet::Packet;
use pnet::packet::ethernet::EtherTypes;
use pnet::packet::ip::IpNextHeaderProtocols;
use pnet::packet::ipv4::Ipv4Packet;
use pnet::packet::tcp::{self, MutableTcpPacket, TcpFlags, TcpPacket};

use crate::{ETH_HDR_LEN, IPV4_HDR_LEN, PacketError, SenderContext, TCP_HDR_LEN, ethernet, ipv4};

pub const SYN_WINDOW: u16 = 65535;
/// Value of the TCP flags byte for a segment with exactly SYN and ACK set.
pub const SYN_ACK: u8 = 0x12;
const TCP_FLAGS_OFFSET: usize = 13;
const FRAME_LEN: usize = ETH_HDR_LEN + IPV4_HDR_LEN + TCP_HDR_LEN;

/// Addressing and sequence data of the RST that closes a probed connection.
///
/// Ports are from our point of view: `src_port` is the probe's ephemeral port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RstSettings {
    pub dst_addr: Ipv4Addr,
    pub src_port: u16,
    pub dst_port: u16,
    pub sequence: u32,
}

impl RstSettings {
    /// Mirrors a SYN-ACK: ports swapped, sequence is the peer's ack plus one.
    pub fn from_reply(reply: &TcpReply) -> Self {
        Self {
            dst_addr: reply.src_addr,
            src_port: reply.dst_port,
            dst_port: reply.src_port,
            sequence: reply.acknowledgement.wrapping_add(1),
        }
    }
}

/// The parts of an inbound Ethernet/IPv4/TCP frame the correlator needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TcpReply {
    pub src_addr: Ipv4Addr,
    pub dst_addr: Ipv4Addr,
    pub src_port: u16,
    pub dst_port: u16,
    pub sequence: u32,
    pub acknowledgement: u32,
    pub flags: u8,
}

impl TcpReply {
    pub fn is_syn_ack(&self) -> bool {
        self.flags & SYN_ACK == SYN_ACK
    }
}

pub fn build_syn(
    ctx: &SenderContext,
    src_port: u16,
    dst: SocketAddrV4,
) -> Result<Vec<u8>, PacketError> {
    let segment = Segment {
        dst_addr: *dst.ip(),
        src_port,
        dst_port: dst.port(),
        sequence: rand::random(),
        flags: TcpFlags::SYN,
        window: SYN_WINDOW,
    };
    build_frame(ctx, segment)
}

pub fn build_rst(ctx: &SenderContext, rst: &RstSettings) -> Result<Vec<u8>, PacketError> {
    let segment = Segment {
        dst_addr: rst.dst_addr,
        src_port: rst.src_port,
        dst_port: rst.dst_port,
        sequence: rst.sequence,
        flags: TcpFlags::RST,
        window: 0,
    };
    build_frame(ctx, segment)
}

/// Decodes Ethernet -> IPv4 -> TCP. `None` for anything else.
pub fn decode(frame: &[u8]) -> Option<TcpReply> {
    let eth = ethernet::get_packet_from_u8(frame)?;
    if eth.get_ethertype() != EtherTypes::Ipv4 {
        return None;
    }
    let ip = Ipv4Packet::new(eth.payload())?;
    if ip.get_next_level_protocol() != IpNextHeaderProtocols::Tcp {
        return None;
    }
    let tcp = TcpPacket::new(ip.payload())?;

    Some(TcpReply {
        src_addr: ip.get_source(),
        dst_addr: ip.get_destination(),
        src_port: tcp.get_source(),
        dst_port: tcp.get_destination(),
        sequence: tcp.get_sequence(),
        acknowledgement: tcp.get_acknowledgement(),
        flags: tcp.get_flags(),
    })
}

/// Frame-level equivalent of the capture filter `tcp[13] = 18`.
///
/// Only IPv4 TCP segments whose flags byte is exactly SYN|ACK pass.
pub fn is_syn_ack_frame(frame: &[u8]) -> bool {
    let Some(eth) = ethernet::get_packet_from_u8(frame) else {
        return false;
    };
    if eth.get_ethertype() != EtherTypes::Ipv4 {
        return false;
    }
    let Some(ip) = Ipv4Packet::new(eth.payload()) else {
        return false;
    };
    if ip.get_next_level_protocol() != IpNextHeaderProtocols::Tcp {
        return false;
    }
    let ihl: usize = ip.get_header_length() as usize * 4;
    eth.payload().get(ihl + TCP_FLAGS_OFFSET) == Some(&SYN_ACK)
}

struct Segment {
    dst_addr: Ipv4Addr,
    src_port: u16,
    dst_port: u16,
    sequence: u32,
    flags: u8,
    window: u16,
}

fn build_frame(ctx: &SenderContext, segment: Segment) -> Result<Vec<u8>, PacketError> {
    let mut buffer: Vec<u8> = vec![0u8; FRAME_LEN];

    {
        let mut tcp = MutableTcpPacket::new(&mut buffer[ETH_HDR_LEN + IPV4_HDR_LEN..])
            .ok_or(PacketError::Buffer("TCP"))?;
        tcp.set_source(segment.src_port);
        tcp.set_destination(segment.dst_port);
        tcp.set_sequence(segment.sequence);
        tcp.set_acknowledgement(0);
        tcp.set_data_offset(5);
        tcp.set_reserved(0);
        tcp.set_flags(segment.flags);
        tcp.set_window(segment.window);
        tcp.set_urgent_ptr(0);
        tcp.set_checksum(0);
    }
    ipv4::write_header(
        &mut buffer[ETH_HDR_LEN..],
        TCP_HDR_LEN,
        IpNextHeaderProtocols::Tcp,
        ctx.src_addr,
        segment.dst_addr,
    )?;
    ethernet::make_header(
        &mut buffer[..ETH_HDR_LEN],
        ctx.src_mac,
        ctx.gateway_mac,
        EtherTypes::Ipv4,
    )?;

    fill_tcp_checksum(&mut buffer)?;
    ipv4::fill_checksum(&mut buffer[ETH_HDR_LEN..])?;

    Ok(buffer)
}

fn fill_tcp_checksum(frame: &mut [u8]) -> Result<(), PacketError> {
    let (src_addr, dst_addr) = {
        let ip = Ipv4Packet::new(&frame[ETH_HDR_LEN..]).ok_or(PacketError::Checksum("TCP"))?;
        (ip.get_source(), ip.get_destination())
    };
    let mut segment = MutableTcpPacket::new(&mut frame[ETH_HDR_LEN + IPV4_HDR_LEN..])
        .ok_or(PacketError::Checksum("TCP"))?;
    let csm: u16 = tcp::ipv4_checksum(&segment.to_immutable(), &src_addr, &dst_addr);
    segment.set_checksum(csm);
    Ok(())
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝

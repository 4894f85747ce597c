#![cfg(test)]
//! A fake network behind pnet's dummy datalink.
//!
//! Frames the scanner sends are read back from the dummy channel. SYNs to a
//! configured peer are answered with a SYN-ACK, optionally after a delay,
//! which is injected into the same channel the capture thread reads from.

use std::collections::HashMap;
use std::io;
use std::net::SocketAddrV4;
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use e7mon_common::config::Config;
use e7mon_core::network::channel::{self, EthernetHandle};
use e7mon_core::network::interface::InterfaceDescriptor;
use e7mon_core::Scanner;
use e7mon_protocols::tcp::{self, TcpReply, SYN_ACK};
use pnet::datalink::dummy;
use pnet::packet::ethernet::{EtherTypes, MutableEthernetPacket};
use pnet::packet::ip::IpNextHeaderProtocols;
use pnet::packet::ipv4::MutableIpv4Packet;
use pnet::packet::tcp::{MutableTcpPacket, TcpFlags};
use pnet::util::MacAddr;

pub const LOCAL_MAC: MacAddr = MacAddr(0x02, 0x00, 0x00, 0x00, 0x00, 0x01);
pub const GATEWAY_MAC: MacAddr = MacAddr(0x02, 0x00, 0x00, 0x00, 0x00, 0xfe);

type Injector = Sender<io::Result<Box<[u8]>>>;

/// How a simulated peer answers a SYN.
#[derive(Debug, Clone, Copy)]
pub struct Peer {
    pub delay: Duration,
}

impl Peer {
    pub fn answering() -> Self {
        Self {
            delay: Duration::ZERO,
        }
    }

    pub fn answering_after(delay: Duration) -> Self {
        Self { delay }
    }
}

/// Segments seen on the wire, in send order.
#[derive(Clone, Default)]
pub struct Wire {
    pub syns: Arc<Mutex<Vec<TcpReply>>>,
    pub rsts: Arc<Mutex<Vec<TcpReply>>>,
}

impl Wire {
    pub fn syns(&self) -> Vec<TcpReply> {
        self.syns.lock().unwrap().clone()
    }

    pub fn rsts(&self) -> Vec<TcpReply> {
        self.rsts.lock().unwrap().clone()
    }

    /// Waits until `count` RSTs went out or `timeout` passes.
    pub async fn wait_for_rsts(&self, count: usize, timeout: Duration) -> Vec<TcpReply> {
        let deadline = tokio::time::Instant::now() + timeout;
        while self.rsts.lock().unwrap().len() < count && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.rsts()
    }
}

pub fn descriptor() -> InterfaceDescriptor {
    InterfaceDescriptor {
        name: "eth0".to_string(),
        ipv4: "192.168.1.10/24".parse().unwrap(),
        mac: LOCAL_MAC,
        gateway_mac: GATEWAY_MAC,
    }
}

/// A scanner whose datalink is the simulated network.
pub fn scanner(peers: &[(&str, Peer)], deadline: Duration) -> (Scanner, Wire) {
    let peers: HashMap<SocketAddrV4, Peer> = peers
        .iter()
        .map(|(addr, peer)| (addr.parse().unwrap(), *peer))
        .collect();

    let mut dummy_cfg = dummy::Config::default();
    let inject: Injector = dummy_cfg.inject_handle().unwrap();
    let read = dummy_cfg.read_handle().unwrap();

    let intf = dummy::dummy_interface(0);
    let handle: EthernetHandle =
        channel::start_capture(&intf, move |i, _| dummy::channel(i, dummy_cfg)).unwrap();

    let wire = Wire::default();
    let recorder = wire.clone();
    thread::spawn(move || {
        while let Ok(frame) = read.recv() {
            let Some(segment) = tcp::decode(&frame) else {
                continue;
            };
            if segment.flags == TcpFlags::RST {
                recorder.rsts.lock().unwrap().push(segment);
                continue;
            }
            if segment.flags != TcpFlags::SYN {
                continue;
            }
            recorder.syns.lock().unwrap().push(segment);

            let target = SocketAddrV4::new(segment.dst_addr, segment.dst_port);
            if let Some(peer) = peers.get(&target) {
                answer(&inject, &segment, *peer);
            }
        }
    });

    let config = Config {
        deadline,
        ..Config::default()
    };
    (Scanner::from_parts(descriptor(), handle, &config), wire)
}

fn answer(inject: &Injector, syn: &TcpReply, peer: Peer) {
    let reply: Box<[u8]> = syn_ack_for(syn).into_boxed_slice();
    if peer.delay.is_zero() {
        let _ = inject.send(Ok(reply));
        return;
    }
    let inject = inject.clone();
    thread::spawn(move || {
        thread::sleep(peer.delay);
        let _ = inject.send(Ok(reply));
    });
}

/// The SYN-ACK a listening peer would send back for `syn`.
pub fn syn_ack_for(syn: &TcpReply) -> Vec<u8> {
    let mut buf = vec![0u8; 54];
    {
        let mut eth = MutableEthernetPacket::new(&mut buf).unwrap();
        eth.set_source(GATEWAY_MAC);
        eth.set_destination(LOCAL_MAC);
        eth.set_ethertype(EtherTypes::Ipv4);
    }
    {
        let mut ip = MutableIpv4Packet::new(&mut buf[14..]).unwrap();
        ip.set_version(4);
        ip.set_header_length(5);
        ip.set_total_length(40);
        ip.set_ttl(57);
        ip.set_next_level_protocol(IpNextHeaderProtocols::Tcp);
        ip.set_source(syn.dst_addr);
        ip.set_destination(syn.src_addr);
    }
    let mut segment = MutableTcpPacket::new(&mut buf[34..]).unwrap();
    segment.set_source(syn.dst_port);
    segment.set_destination(syn.src_port);
    segment.set_sequence(0x5eed);
    segment.set_acknowledgement(syn.sequence.wrapping_add(1));
    segment.set_data_offset(5);
    segment.set_flags(SYN_ACK);
    segment.set_window(64240);
    buf
}

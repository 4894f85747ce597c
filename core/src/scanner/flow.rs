//! Outstanding probes, keyed by their ephemeral source port.

use std::collections::{HashMap, HashSet};
use std::ops::Range;
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use e7mon_common::network::target::TargetHost;
use e7mon_protocols::tcp::{RstSettings, TcpReply};

use crate::error::ScanError;

/// Source ports probes are sent from.
pub const EPHEMERAL_PORTS: Range<u16> = 32768..61000;

/// Hands out distinct source ports for one batch.
#[derive(Debug)]
pub struct PortAllocator {
    range: Range<u16>,
    issued: HashSet<u16>,
}

impl Default for PortAllocator {
    fn default() -> Self {
        Self::new(EPHEMERAL_PORTS)
    }
}

impl PortAllocator {
    pub fn new(range: Range<u16>) -> Self {
        Self {
            range,
            issued: HashSet::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.range.len()
    }

    /// Draws a random port from the range, redrawing on collision.
    pub fn allocate(&mut self) -> Result<u16, ScanError> {
        if self.issued.len() >= self.capacity() {
            return Err(ScanError::PortsExhausted {
                requested: self.issued.len() + 1,
                available: self.capacity(),
            });
        }
        loop {
            let port: u16 = rand::random_range(self.range.clone());
            if self.issued.insert(port) {
                return Ok(port);
            }
        }
    }
}

#[derive(Debug)]
pub struct Flow {
    target: TargetHost,
    sent_at: OnceLock<Instant>,
}

impl Flow {
    pub fn target(&self) -> &TargetHost {
        &self.target
    }

    pub fn sent_at(&self) -> Option<Instant> {
        self.sent_at.get().copied()
    }
}

/// A SYN-ACK that answered one of our probes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowMatch {
    pub port: u16,
    pub label: String,
    pub latency: Duration,
    pub rst: RstSettings,
}

/// Every probe of one batch.
///
/// The table is complete before the listener sees it. Afterwards the only
/// write is the one-time send stamp of each flow.
#[derive(Debug, Default)]
pub struct FlowTable {
    flows: HashMap<u16, Flow>,
    order: Vec<u16>,
}

impl FlowTable {
    /// Assigns each target a distinct source port, in the order given.
    pub fn build(targets: Vec<TargetHost>, ports: &mut PortAllocator) -> Result<Self, ScanError> {
        if targets.len() > ports.capacity() {
            return Err(ScanError::PortsExhausted {
                requested: targets.len(),
                available: ports.capacity(),
            });
        }

        let mut table = Self::default();
        for target in targets {
            let port: u16 = ports.allocate()?;
            table.order.push(port);
            table.flows.insert(
                port,
                Flow {
                    target,
                    sent_at: OnceLock::new(),
                },
            );
        }
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn get(&self, port: u16) -> Option<&Flow> {
        self.flows.get(&port)
    }

    /// Flows in dispatch order.
    pub fn iter(&self) -> impl Iterator<Item = (u16, &Flow)> {
        self.order
            .iter()
            .filter_map(|port| self.flows.get(port).map(|flow| (*port, flow)))
    }

    /// Records the send time of `port`. Only the first call has an effect.
    pub fn mark_sent(&self, port: u16, at: Instant) -> bool {
        self.flows
            .get(&port)
            .is_some_and(|flow| flow.sent_at.set(at).is_ok())
    }

    /// Matches `reply` against the table.
    ///
    /// The reply must be addressed to a flow's source port and come from that
    /// flow's target, and the flow must already be on the wire.
    pub fn correlate(&self, reply: &TcpReply, arrived_at: Instant) -> Option<FlowMatch> {
        if !reply.is_syn_ack() {
            return None;
        }
        let flow: &Flow = self.flows.get(&reply.dst_port)?;
        if flow.target.ip() != reply.src_addr || flow.target.port() != reply.src_port {
            return None;
        }
        let sent_at: Instant = flow.sent_at()?;

        Some(FlowMatch {
            port: reply.dst_port,
            label: flow.target.label().to_string(),
            latency: arrived_at.saturating_duration_since(sent_at),
            rst: RstSettings::from_reply(reply),
        })
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝

//! The SYN latency scanner.
//!
//! A [`Scanner`] is built once per interface and reused for every scan. Each
//! call to [`Scanner::start_latency_scan`] runs one batch:
//!
//! 1. targets are validated and assigned distinct ephemeral source ports,
//! 2. every SYN frame is built before anything is sent,
//! 3. the capture queue is locked, drained and handed to a listener task,
//! 4. SYNs go out in caller order, each stamped right before transmission,
//! 5. replies are answered with an RST until every host is accounted for or
//!    the batch deadline passes.
//!
//! Nothing but the capture handle outlives a call. The listener holds the
//! capture lock until it stops, so the capture is released even when the
//! call is dropped halfway and the next scan simply waits for it.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use e7mon_common::config::Config;
use e7mon_common::latency::LatencyMap;
use e7mon_common::network::target::TargetHost;
use e7mon_protocols::SenderContext;
use e7mon_protocols::tcp::{self, RstSettings};
use pnet::datalink::{self, DataLinkSender, NetworkInterface};
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::sync::{Mutex as AsyncMutex, oneshot};
use tracing::{debug, info, warn};

use crate::error::ScanError;
use crate::network::channel::{self, CaptureGuard, CapturedFrame, EthernetHandle};
use crate::network::interface::{self, InterfaceDescriptor, SelectedInterface};
use crate::network::arp;

pub mod flow;
pub mod session;

use flow::{FlowTable, PortAllocator};
use session::{ScanEvent, ScanSession};

/// Anything that can measure peer latency, so the monitor does not need raw
/// sockets to be tested.
#[async_trait]
pub trait LatencyProbe: Send {
    async fn start_latency_scan(&mut self, hosts: &[String]) -> Result<LatencyMap, ScanError>;
}

pub struct Scanner {
    descriptor: InterfaceDescriptor,
    ctx: SenderContext,
    tx: Box<dyn DataLinkSender>,
    capture: Arc<AsyncMutex<UnboundedReceiver<CapturedFrame>>>,
    deadline: Duration,
}

impl Scanner {
    /// Resolves the interface and gateway and opens the capture.
    ///
    /// Blocks for up to `config.arp_timeout` while the gateway is resolved.
    pub fn new(config: &Config) -> Result<Self, ScanError> {
        let interfaces: Vec<NetworkInterface> = datalink::interfaces();
        let selected: SelectedInterface =
            interface::select_interface(&interfaces, config.interface.as_deref())?;
        info!(
            interface = %selected.interface.name,
            ipv4 = %selected.ipv4,
            "using interface"
        );

        let gateway_mac = arp::resolve_gateway_mac(&selected, config.arp_timeout, datalink::channel)?;
        let handle: EthernetHandle = channel::open_live(&selected.interface)?;

        Ok(Self::from_parts(selected.into_descriptor(gateway_mac), handle, config))
    }

    /// Assembles a scanner from an already opened capture.
    pub fn from_parts(descriptor: InterfaceDescriptor, handle: EthernetHandle, config: &Config) -> Self {
        let ctx = SenderContext {
            src_mac: descriptor.mac,
            gateway_mac: descriptor.gateway_mac,
            src_addr: descriptor.ipv4.ip(),
        };
        Self {
            descriptor,
            ctx,
            tx: handle.tx,
            capture: Arc::new(AsyncMutex::new(handle.rx)),
            deadline: config.deadline,
        }
    }

    pub fn descriptor(&self) -> &InterfaceDescriptor {
        &self.descriptor
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Probes `hosts` and returns the latency of every host that answered
    /// before the deadline, keyed by the host string as given (trimmed).
    pub async fn start_latency_scan(&mut self, hosts: &[String]) -> Result<LatencyMap, ScanError> {
        let targets: Vec<TargetHost> = parse_targets(hosts)?;
        let flows = FlowTable::build(targets, &mut PortAllocator::default())?;
        if flows.is_empty() {
            return Ok(LatencyMap::new());
        }
        let frames: Vec<(u16, Vec<u8>)> = flows
            .iter()
            .map(|(port, flow)| -> Result<(u16, Vec<u8>), ScanError> {
                Ok((port, tcp::build_syn(&self.ctx, port, flow.target().addr())?))
            })
            .collect::<Result<_, _>>()?;

        let mut capture: CaptureGuard = Arc::clone(&self.capture).lock_owned().await;
        if !channel::drain(&mut capture) {
            return Err(ScanError::capture(&self.descriptor.name, "capture thread stopped"));
        }

        let session = ScanSession::new(flows, self.deadline);
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let (stop_tx, stop_rx) = oneshot::channel();
        let listener = tokio::spawn(session.listener(capture, events_tx.clone()).run(stop_rx));
        let timer = session.start_deadline(events_tx);

        let outcome = self.dispatch(&session, frames, &mut events_rx).await;

        timer.abort();
        let _ = stop_tx.send(());
        if let Err(e) = listener.await {
            warn!(error = %e, "capture listener failed");
        }
        // replies the listener flushed after dispatch stopped reading
        while let Ok(event) = events_rx.try_recv() {
            if let ScanEvent::Reply(rst) = event {
                self.send_rst(&rst);
            }
        }

        outcome?;
        let results: LatencyMap = session.into_results();
        debug!(probed = hosts.len(), replied = results.len(), "latency scan finished");
        Ok(results)
    }

    async fn dispatch(
        &mut self,
        session: &ScanSession,
        frames: Vec<(u16, Vec<u8>)>,
        events: &mut UnboundedReceiver<ScanEvent>,
    ) -> Result<(), ScanError> {
        let mut sent: usize = 0;
        let mut last_error: Option<String> = None;

        for (port, frame) in frames {
            session.flows().mark_sent(port, Instant::now());
            match send_frame(&mut *self.tx, &frame) {
                Ok(()) => sent += 1,
                Err(e) => {
                    let host = session.flows().get(port).map(|f| f.target().label().to_string());
                    warn!(host = host.as_deref().unwrap_or("?"), error = %e, "SYN not sent");
                    last_error = Some(e);
                }
            }
        }

        if sent == 0 {
            return Err(ScanError::SendFailed(
                last_error.unwrap_or_else(|| "no frame sent".to_string()),
            ));
        }

        let mut answered: usize = 0;
        while answered < sent {
            match events.recv().await {
                Some(ScanEvent::Reply(rst)) => {
                    answered += 1;
                    self.send_rst(&rst);
                }
                Some(ScanEvent::Deadline) | None => {
                    debug!(unanswered = sent - answered, "deadline reached");
                    break;
                }
            }
        }
        Ok(())
    }

    fn send_rst(&mut self, rst: &RstSettings) {
        let result = tcp::build_rst(&self.ctx, rst)
            .map_err(|e| e.to_string())
            .and_then(|frame| send_frame(&mut *self.tx, &frame));
        if let Err(e) = result {
            warn!(peer = %rst.dst_addr, port = rst.dst_port, error = %e, "RST not sent");
        }
    }
}

#[async_trait]
impl LatencyProbe for Scanner {
    async fn start_latency_scan(&mut self, hosts: &[String]) -> Result<LatencyMap, ScanError> {
        Scanner::start_latency_scan(self, hosts).await
    }
}

/// Parses host strings, dropping repeats but keeping first-seen order.
pub fn parse_targets(hosts: &[String]) -> Result<Vec<TargetHost>, ScanError> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut targets: Vec<TargetHost> = Vec::with_capacity(hosts.len());
    for host in hosts {
        let target: TargetHost = host.parse()?;
        if seen.insert(target.label().to_string()) {
            targets.push(target);
        }
    }
    Ok(targets)
}

fn send_frame(tx: &mut dyn DataLinkSender, frame: &[u8]) -> Result<(), String> {
    match tx.send_to(frame, None) {
        Some(Ok(())) => Ok(()),
        Some(Err(e)) => Err(e.to_string()),
        None => Err("datalink sender unavailable".to_string()),
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

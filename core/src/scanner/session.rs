//! Per-call scan state and the task that correlates captured replies.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use e7mon_common::latency::LatencyMap;
use e7mon_protocols::tcp::{self, RstSettings};
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, trace};

use super::flow::{FlowMatch, FlowTable};
use crate::network::channel::{CaptureGuard, CapturedFrame};

/// Notifications the orchestrator waits on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEvent {
    /// A probe was answered and its latency recorded; the peer needs an RST.
    Reply(RstSettings),
    /// The batch deadline passed. Every host still outstanding timed out.
    Deadline,
}

/// State owned by exactly one `start_latency_scan` call.
pub struct ScanSession {
    flows: Arc<FlowTable>,
    results: Arc<Mutex<LatencyMap>>,
    deadline: Instant,
}

impl ScanSession {
    pub fn new(flows: FlowTable, timeout: Duration) -> Self {
        Self {
            flows: Arc::new(flows),
            results: Arc::new(Mutex::new(LatencyMap::new())),
            deadline: Instant::now() + timeout,
        }
    }

    pub fn flows(&self) -> &FlowTable {
        &self.flows
    }

    /// Spawns the timer that reports [`ScanEvent::Deadline`].
    pub fn start_deadline(&self, events: UnboundedSender<ScanEvent>) -> tokio::task::JoinHandle<()> {
        let deadline: Instant = self.deadline;
        tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            let _ = events.send(ScanEvent::Deadline);
        })
    }

    pub fn listener(&self, capture: CaptureGuard, events: UnboundedSender<ScanEvent>) -> FlowListener {
        FlowListener {
            capture,
            flows: Arc::clone(&self.flows),
            results: Arc::clone(&self.results),
            events,
            answered: HashSet::new(),
            cutoff: self.deadline.into_std(),
        }
    }

    pub fn into_results(self) -> LatencyMap {
        let mut results = self.results.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut *results)
    }
}

/// Consumes the capture queue for one session.
///
/// The listener holds the capture lock while it runs. Dropping it, whether
/// it stopped normally or its scan was abandoned, releases the capture for
/// the next session.
pub struct FlowListener {
    capture: CaptureGuard,
    flows: Arc<FlowTable>,
    results: Arc<Mutex<LatencyMap>>,
    events: UnboundedSender<ScanEvent>,
    answered: HashSet<u16>,
    /// Frames captured after this instant missed the deadline.
    cutoff: std::time::Instant,
}

impl FlowListener {
    /// Runs until `stop` resolves or its sender is dropped.
    pub async fn run(mut self, mut stop: oneshot::Receiver<()>) {
        loop {
            tokio::select! {
                frame = self.capture.recv() => {
                    match frame {
                        Some(frame) => self.process_frame(&frame),
                        None => {
                            debug!("capture queue closed");
                            break;
                        }
                    }
                }
                _ = &mut stop => {
                    self.flush();
                    break;
                }
            }
        }
    }

    /// Handles what was queued before the stop signal won the race.
    fn flush(&mut self) {
        while let Ok(frame) = self.capture.try_recv() {
            self.process_frame(&frame);
        }
    }

    fn process_frame(&mut self, frame: &CapturedFrame) {
        if frame.timestamp > self.cutoff {
            trace!("frame captured after the deadline");
            return;
        }
        let Some(reply) = tcp::decode(&frame.data) else {
            return;
        };
        let Some(found) = self.flows.correlate(&reply, frame.timestamp) else {
            trace!(src = %reply.src_addr, port = reply.dst_port, "unmatched SYN-ACK");
            return;
        };
        if !self.answered.insert(found.port) {
            return;
        }
        self.record(found);
    }

    fn record(&self, found: FlowMatch) {
        debug!(
            host = %found.label,
            latency_ms = found.latency.as_secs_f64() * 1000.0,
            "peer answered"
        );
        self.results
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(found.label, found.latency);
        let _ = self.events.send(ScanEvent::Reply(found.rst));
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

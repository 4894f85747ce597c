//! Live capture on the scan interface.
//!
//! A datalink channel is opened once per scanner. Its sending half is used
//! directly for injection, its receiving half is drained by a dedicated
//! reader thread that only forwards SYN-ACK segments into a tokio queue.

use std::io;
use std::time::{Duration, Instant};

use e7mon_protocols::tcp;
use pnet::datalink::{self, Channel, Config, DataLinkReceiver, DataLinkSender, NetworkInterface};
use tokio::sync::OwnedMutexGuard;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender, error::TryRecvError};
use tracing::{debug, trace};

use crate::error::ScanError;

/// Large enough for any frame on a standard MTU link.
pub const SNAPLEN: usize = 65535;
/// How often the reader thread wakes up to notice that nobody listens anymore.
const READ_TIMEOUT: Duration = Duration::from_millis(50);

/// A frame admitted by the capture filter, stamped on arrival.
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    pub data: Vec<u8>,
    pub timestamp: Instant,
}

pub struct EthernetHandle {
    pub tx: Box<dyn DataLinkSender>,
    pub rx: UnboundedReceiver<CapturedFrame>,
}

pub type FrameFilter = fn(&[u8]) -> bool;

/// Exclusive access to a scanner's capture queue for the length of one scan.
pub type CaptureGuard = OwnedMutexGuard<UnboundedReceiver<CapturedFrame>>;

pub fn capture_config() -> Config {
    Config {
        read_buffer_size: SNAPLEN,
        read_timeout: Some(READ_TIMEOUT),
        promiscuous: false,
        ..Default::default()
    }
}

/// Opens `intf` and starts the SYN-ACK reader thread.
///
/// The returned queue only ever carries frames passing
/// [`tcp::is_syn_ack_frame`], so it must exist before the first probe is sent.
pub fn start_capture<F>(intf: &NetworkInterface, channel_opener: F) -> Result<EthernetHandle, ScanError>
where
    F: FnOnce(&NetworkInterface, Config) -> io::Result<Channel>,
{
    let (tx, rx) = open_eth_channel(intf, &capture_config(), channel_opener)?;
    let (queue_tx, queue_rx) = mpsc::unbounded_channel();

    std::thread::Builder::new()
        .name(format!("capture-{}", intf.name))
        .spawn(move || read_frames(rx, queue_tx, tcp::is_syn_ack_frame))
        .map_err(|e| ScanError::capture(&intf.name, e))?;

    debug!(interface = %intf.name, "capture started");
    Ok(EthernetHandle { tx, rx: queue_rx })
}

pub fn open_eth_channel<F>(
    intf: &NetworkInterface,
    cfg: &Config,
    channel_opener: F,
) -> Result<(Box<dyn DataLinkSender>, Box<dyn DataLinkReceiver>), ScanError>
where
    F: FnOnce(&NetworkInterface, Config) -> io::Result<Channel>,
{
    let ch: Channel = channel_opener(intf, *cfg).map_err(|e| ScanError::capture(&intf.name, e))?;
    match ch {
        Channel::Ethernet(tx, rx) => Ok((tx, rx)),
        _ => Err(ScanError::capture(&intf.name, "not an ethernet channel")),
    }
}

/// Opens a real channel on `intf` with the capture settings.
pub fn open_live(intf: &NetworkInterface) -> Result<EthernetHandle, ScanError> {
    start_capture(intf, datalink::channel)
}

/// Discards everything queued so far.
///
/// Returns `false` when the reader thread is gone and nothing will ever
/// arrive again.
pub fn drain(rx: &mut UnboundedReceiver<CapturedFrame>) -> bool {
    let mut dropped: usize = 0;
    loop {
        match rx.try_recv() {
            Ok(_) => dropped += 1,
            Err(TryRecvError::Empty) => break,
            Err(TryRecvError::Disconnected) => return false,
        }
    }
    if dropped > 0 {
        trace!(dropped, "discarded stale frames");
    }
    true
}

fn read_frames(
    mut rx: Box<dyn DataLinkReceiver>,
    queue_tx: UnboundedSender<CapturedFrame>,
    filter: FrameFilter,
) {
    while !queue_tx.is_closed() {
        match rx.next() {
            Ok(frame) if filter(frame) => {
                let captured = CapturedFrame {
                    data: frame.to_vec(),
                    timestamp: Instant::now(),
                };
                if queue_tx.send(captured).is_err() {
                    break;
                }
            }
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::TimedOut => {}
            Err(e) => trace!(error = %e, "capture read failed"),
        }
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

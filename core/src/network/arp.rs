use std::io;
use std::net::Ipv4Addr;
use std::time::{Duration, Instant};

use e7mon_protocols::arp;
use pnet::datalink::{Channel, Config, NetworkInterface};
use pnet::util::MacAddr;
use tracing::{debug, trace};

use super::channel::open_eth_channel;
use super::interface::SelectedInterface;
use crate::error::ScanError;

const ARP_READ_TIMEOUT: Duration = Duration::from_millis(50);

/// Asks the gateway of `selected` for its hardware address.
///
/// Opens a short-lived channel of its own, sends one broadcast request and
/// waits at most `timeout` for the matching reply.
pub fn resolve_gateway_mac<F>(
    selected: &SelectedInterface,
    timeout: Duration,
    channel_opener: F,
) -> Result<MacAddr, ScanError>
where
    F: FnOnce(&NetworkInterface, Config) -> io::Result<Channel>,
{
    let gateway: Ipv4Addr = selected.gateway_addr();
    let cfg = Config {
        read_timeout: Some(ARP_READ_TIMEOUT),
        ..Default::default()
    };
    let (mut tx, mut rx) = open_eth_channel(&selected.interface, &cfg, channel_opener)?;

    let request: Vec<u8> = arp::create_request(selected.mac, selected.ipv4.ip(), gateway)?;
    match tx.send_to(&request, None) {
        Some(Ok(())) => {}
        Some(Err(e)) => return Err(ScanError::SendFailed(e.to_string())),
        None => return Err(ScanError::SendFailed("ARP request not sent".to_string())),
    }
    debug!(%gateway, interface = %selected.interface.name, "sent ARP request");

    let deadline: Instant = Instant::now() + timeout;
    while Instant::now() < deadline {
        match rx.next() {
            Ok(frame) => {
                if let Some(mac) = arp::parse_reply(frame, gateway) {
                    debug!(%gateway, %mac, "gateway resolved");
                    return Ok(mac);
                }
            }
            Err(e) if e.kind() == io::ErrorKind::TimedOut => {}
            Err(e) => trace!(error = %e, "ARP read failed"),
        }
    }

    Err(ScanError::GatewayResolutionFailed { gateway, timeout })
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝

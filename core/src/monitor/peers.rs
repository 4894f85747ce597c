//! Periodic peer latency measurement.
//!
//! A cycle asks a [`PeerSource`] who we are connected to, turns the peers'
//! multiaddresses into probe targets, scans them and logs the summary.

use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use e7mon_common::latency::{LatencyMap, LatencySummary};
use e7mon_common::network::target;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::scanner::LatencyProbe;

/// Provides the addresses of the peers a node is currently connected to.
///
/// Entries are multiaddresses (`/ip4/<addr>/tcp/<port>/...`) or plain
/// `ip:port` strings.
#[async_trait]
pub trait PeerSource: Send + Sync {
    async fn connected_peers(&self) -> anyhow::Result<Vec<String>>;
}

/// A fixed peer list.
#[derive(Debug, Clone, Default)]
pub struct StaticPeers {
    peers: Vec<String>,
}

impl StaticPeers {
    pub fn new(peers: Vec<String>) -> Self {
        Self { peers }
    }
}

#[async_trait]
impl PeerSource for StaticPeers {
    async fn connected_peers(&self) -> anyhow::Result<Vec<String>> {
        Ok(self.peers.clone())
    }
}

/// Turns peer addresses into scan hosts, in first-seen order.
///
/// Unparseable entries are skipped. A peer reported twice (or once per
/// notation) is one host, so the summary counts it as probed once.
pub fn peers_to_hosts(peers: &[String]) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    peers
        .iter()
        .filter_map(|peer| match target::peer_to_host(peer) {
            Ok(host) => Some(host),
            Err(e) => {
                debug!(peer = %peer, error = %e, "skipping peer");
                None
            }
        })
        .filter(|host| seen.insert(host.clone()))
        .collect()
}

/// Runs one fetch, scan and report round.
pub async fn latency_cycle(
    source: &dyn PeerSource,
    probe: &mut dyn LatencyProbe,
) -> anyhow::Result<LatencySummary> {
    let peers: Vec<String> = source
        .connected_peers()
        .await
        .context("fetching connected peers")?;
    let hosts: Vec<String> = peers_to_hosts(&peers);

    let results: LatencyMap = probe
        .start_latency_scan(&hosts)
        .await
        .context("latency scan failed")?;

    for (host, latency) in &results {
        debug!(host = %host, latency_ms = latency.as_millis() as u64, "[P2P] peer latency");
    }

    let summary = LatencySummary::from_results(&results, hosts.len());
    log_summary(&summary);
    Ok(summary)
}

/// Repeats [`latency_cycle`] every `period` until `shutdown` resolves.
///
/// A failed cycle is logged and the next one runs on schedule.
pub async fn run_monitor<S>(
    source: &dyn PeerSource,
    probe: &mut dyn LatencyProbe,
    period: Duration,
    shutdown: S,
) where
    S: Future<Output = ()>,
{
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = ticker.tick() => {
                if let Err(e) = latency_cycle(source, probe).await {
                    error!("[P2P] {e:#}");
                }
            }
        }
    }
}

fn log_summary(summary: &LatencySummary) {
    if !summary.has_replies() {
        warn!(probed = summary.hosts_probed, "[P2P] no peer answered the latency probe");
        return;
    }
    info!(
        high = ?summary.high,
        low = ?summary.low,
        avg = ?summary.average,
        probed = summary.hosts_probed,
        replied = summary.hosts_replied,
        response_rate = %format!("{:.1}%", summary.response_rate() * 100.0),
        "[P2P] Peer latency"
    );
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝

use std::time::Duration;

use anyhow::{Context, bail};
use e7mon_common::config::Config;
use e7mon_core::Scanner;
use e7mon_core::monitor::peers::{self, StaticPeers};
use is_root::is_root;
use tracing::info;

use super::P2pstatArgs;

impl From<&P2pstatArgs> for Config {
    fn from(args: &P2pstatArgs) -> Self {
        Self {
            interface: args.interface.clone(),
            deadline: Duration::from_millis(args.deadline_ms),
            arp_timeout: Duration::from_millis(args.arp_timeout_ms),
            interval: args.interval.map(Duration::from_secs),
        }
    }
}

pub async fn p2pstat(args: P2pstatArgs) -> anyhow::Result<()> {
    if !is_root() {
        bail!("p2pstat crafts raw frames and needs root privileges");
    }

    let cfg = Config::from(&args);
    let scanner_cfg = cfg.clone();
    let mut scanner: Scanner = tokio::task::spawn_blocking(move || Scanner::new(&scanner_cfg))
        .await
        .context("scanner setup panicked")?
        .context("could not set up the latency scanner")?;

    let descriptor = scanner.descriptor();
    info!(
        interface = %descriptor.name,
        gateway_mac = %descriptor.gateway_mac,
        deadline = ?scanner.deadline(),
        "[P2P] scanner ready"
    );

    let source = StaticPeers::new(args.peers);
    match cfg.interval {
        None => {
            peers::latency_cycle(&source, &mut scanner).await?;
        }
        Some(period) => {
            let shutdown = async {
                let _ = tokio::signal::ctrl_c().await;
                info!("interrupted, stopping");
            };
            peers::run_monitor(&source, &mut scanner, period, shutdown).await;
        }
    }
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

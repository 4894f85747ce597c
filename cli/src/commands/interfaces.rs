use colored::*;
use e7mon_common::utils::interface::NetworkInterfaceExtension;
use e7mon_core::network::interface::{self, ViabilityError};
use pnet::datalink::{self, NetworkInterface};
use tracing::{info, warn};

pub fn interfaces() -> anyhow::Result<()> {
    let all: Vec<NetworkInterface> = datalink::interfaces();
    let chosen: Option<String> = interface::select_interface(&all, None)
        .ok()
        .map(|selected| selected.interface.name);

    for intf in &all {
        let marker: ColoredString = if chosen.as_deref() == Some(intf.name.as_str()) {
            "*".green().bold()
        } else {
            " ".normal()
        };
        let ipv4: String = intf
            .get_ipv4_net()
            .map(|net| net.to_string())
            .unwrap_or_else(|| "-".to_string());
        let mac: String = intf.mac.map(|m| m.to_string()).unwrap_or_else(|| "-".to_string());
        let status: ColoredString = match interface::check_viability(intf) {
            Ok(()) => "usable".green(),
            Err(reason) => describe(reason).dimmed(),
        };

        info!("{marker} {:<12} {:<20} {:<18} {status}", intf.name, ipv4, mac);
    }

    if chosen.is_none() {
        warn!("no interface is usable for scanning");
    }
    Ok(())
}

fn describe(reason: ViabilityError) -> &'static str {
    match reason {
        ViabilityError::NotRunning => "not running",
        ViabilityError::IsLoopback => "loopback",
        ViabilityError::NoMacAddress => "no hardware address",
        ViabilityError::NoIpv4Address => "no IPv4 address",
    }
}

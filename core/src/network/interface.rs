//! Picks the device the scanner injects from and works out where the
//! default gateway sits on it.

use std::net::Ipv4Addr;

use e7mon_common::utils::interface::NetworkInterfaceExtension;
use pnet::datalink::NetworkInterface;
use pnet::ipnetwork::Ipv4Network;
use pnet::util::MacAddr;
use tracing::{debug, warn};

use crate::error::ScanError;

/// Why an interface cannot carry probe frames.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ViabilityError {
    /// Not flagged both up and running.
    NotRunning,
    IsLoopback,
    NoMacAddress,
    NoIpv4Address,
}

/// The resolved device, fixed for the lifetime of a scanner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceDescriptor {
    pub name: String,
    pub ipv4: Ipv4Network,
    pub mac: MacAddr,
    pub gateway_mac: MacAddr,
}

/// An interface that passed selection but whose gateway is not resolved yet.
#[derive(Debug, Clone)]
pub struct SelectedInterface {
    pub interface: NetworkInterface,
    pub ipv4: Ipv4Network,
    pub mac: MacAddr,
}

impl SelectedInterface {
    pub fn gateway_addr(&self) -> Ipv4Addr {
        gateway_addr(&self.ipv4)
    }

    pub fn into_descriptor(self, gateway_mac: MacAddr) -> InterfaceDescriptor {
        InterfaceDescriptor {
            name: self.interface.name,
            ipv4: self.ipv4,
            mac: self.mac,
            gateway_mac,
        }
    }
}

pub fn check_viability(interface: &NetworkInterface) -> Result<(), ViabilityError> {
    if !interface.is_up_and_running() {
        return Err(ViabilityError::NotRunning);
    }
    if interface.is_loopback() {
        return Err(ViabilityError::IsLoopback);
    }
    if interface.mac.is_none() {
        return Err(ViabilityError::NoMacAddress);
    }
    if interface.get_ipv4_net().is_none() {
        return Err(ViabilityError::NoIpv4Address);
    }
    Ok(())
}

/// Chooses the scan interface out of `interfaces`.
///
/// A hint selects by exact name. When it names nothing, selection falls back
/// to the first viable interface, same as when no hint is given.
pub fn select_interface(
    interfaces: &[NetworkInterface],
    hint: Option<&str>,
) -> Result<SelectedInterface, ScanError> {
    if let Some(name) = hint {
        match interfaces.iter().find(|intf| intf.name == name) {
            Some(intf) => return describe(intf),
            None => warn!(interface = name, "interface not found, selecting automatically"),
        }
    }

    interfaces
        .iter()
        .find(|intf| match check_viability(intf) {
            Ok(()) => true,
            Err(reason) => {
                debug!(interface = %intf.name, ?reason, "skipping interface");
                false
            }
        })
        .ok_or_else(|| {
            let reason = match hint {
                Some(name) => format!("'{name}' does not exist and no interface is up and running"),
                None => "no interface is up and running".to_string(),
            };
            ScanError::NoInterfaceFound(reason)
        })
        .and_then(describe)
}

/// Assumes the gateway is the first host of the subnet.
pub fn gateway_addr(net: &Ipv4Network) -> Ipv4Addr {
    Ipv4Addr::from(u32::from(net.network()).wrapping_add(1))
}

fn describe(interface: &NetworkInterface) -> Result<SelectedInterface, ScanError> {
    let ipv4: Ipv4Network = interface.get_ipv4_net().ok_or_else(|| {
        ScanError::NoInterfaceFound(format!("{} has no IPv4 address", interface.name))
    })?;
    let mac: MacAddr = interface.mac.ok_or_else(|| {
        ScanError::NoInterfaceFound(format!("{} has no hardware address", interface.name))
    })?;

    Ok(SelectedInterface {
        interface: interface.clone(),
        ipv4,
        mac,
    })
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝

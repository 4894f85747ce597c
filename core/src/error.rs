use std::net::Ipv4Addr;
use std::time::Duration;

use e7mon_common::network::target::TargetError;
use e7mon_protocols::PacketError;
use thiserror::Error;

/// Everything that can go wrong while building a [`Scanner`](crate::scanner::Scanner)
/// or running a latency scan.
///
/// Construction errors (`NoInterfaceFound`, `GatewayResolutionFailed`,
/// `CaptureOpenFailed`) are fatal to that scanner. The others fail a single
/// call, callers are expected to log them and carry on with the next cycle.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("no usable network interface found ({0})")]
    NoInterfaceFound(String),

    #[error("gateway {gateway} did not answer ARP within {timeout:?}")]
    GatewayResolutionFailed { gateway: Ipv4Addr, timeout: Duration },

    #[error("could not open capture on {interface}: {reason}")]
    CaptureOpenFailed { interface: String, reason: String },

    #[error("failed to build frame: {0}")]
    PacketBuildFailed(#[from] PacketError),

    #[error("failed to send: {0}")]
    SendFailed(String),

    #[error("invalid target: {0}")]
    InvalidTarget(#[from] TargetError),

    #[error("{requested} probes requested but only {available} ephemeral ports are available")]
    PortsExhausted { requested: usize, available: usize },
}

impl ScanError {
    pub(crate) fn capture(interface: &str, reason: impl ToString) -> Self {
        Self::CaptureOpenFailed {
            interface: interface.to_string(),
            reason: reason.to_string(),
        }
    }
}

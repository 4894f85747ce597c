//! Raw-packet peer latency scanning for e7mon.
//!
//! Requires the privileges needed to open a datalink channel.

pub mod error;
pub mod monitor;
pub mod network;
pub mod scanner;

pub use error::ScanError;
pub use scanner::{LatencyProbe, Scanner};

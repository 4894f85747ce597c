//! The consumers of the scanner inside a node monitor.
//!
//! Polling a node over HTTP is not done here. [`peers::PeerSource`] is the
//! seam a poller plugs into.

pub mod events;
pub mod peers;
pub mod watchdog;

//! Shared models for the e7mon workspace.
//!
//! Nothing in here touches the wire: these are the types the scanner and the
//! monitor agree on (targets, latency results, configuration).

pub mod config;
pub mod latency;
pub mod network;
pub mod utils;
